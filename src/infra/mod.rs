//! 基础设施模块
//!
//! 封装外部依赖（SSH 会话、文件传输）

pub mod ssh;

pub use ssh::{Connector, ExecOutput, FileTransfer, RemoteShell, SshConnector, SshError, SshSession};
