//! 测试用 mock 会话与连接器

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::config::RemoteEndpoint;
use crate::infra::{Connector, ExecOutput, FileTransfer, RemoteShell, SshError};

type Responder = Box<dyn Fn(&str, usize) -> ExecOutput + Send + Sync>;

/// 记录调用的 mock 会话
///
/// `responder` 根据命令和该命令的第几次调用（从 1 开始）返回输出
pub struct MockShell {
    pub commands: Mutex<Vec<String>>,
    pub transfers: Mutex<Vec<FileTransfer>>,
    pub closed: Mutex<bool>,
    responder: Responder,
}

impl MockShell {
    pub fn new(responder: impl Fn(&str, usize) -> ExecOutput + Send + Sync + 'static) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
            responder: Box::new(responder),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// 包含 `needle` 的已执行命令数
    pub fn count(&self, needle: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(needle)).count()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl RemoteShell for MockShell {
    async fn exec(&self, command: &str) -> Result<ExecOutput, SshError> {
        let nth = {
            let mut commands = self.commands.lock().unwrap();
            commands.push(command.to_string());
            commands.iter().filter(|c| c.as_str() == command).count()
        };
        Ok((self.responder)(command, nth))
    }

    async fn put_files(&self, transfers: &[FileTransfer]) -> Result<(), SshError> {
        self.transfers.lock().unwrap().extend_from_slice(transfers);
        Ok(())
    }

    async fn close(&self) -> Result<(), SshError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

pub fn stdout(lines: &[&str]) -> ExecOutput {
    ExecOutput {
        stdout: lines.iter().map(|s| s.to_string()).collect(),
        stderr: Vec::new(),
        exit_status: Some(0),
    }
}

/// mock 连接器，按端点名称返回预先准备的会话
pub struct MockConnector {
    pub host: Arc<MockShell>,
    pub rp: Arc<MockShell>,
    /// 为 Some 时 RP 连接等待通知后再返回
    pub rp_gate: Option<Arc<Notify>>,
    pub fail_rp: bool,
    pub connects: Mutex<Vec<&'static str>>,
}

impl MockConnector {
    pub fn new(host: Arc<MockShell>, rp: Arc<MockShell>) -> Self {
        Self {
            host,
            rp,
            rp_gate: None,
            fail_rp: false,
            connects: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn RemoteShell>, SshError> {
        self.connects.lock().unwrap().push(endpoint.name);

        if endpoint.name == "host" {
            return Ok(self.host.clone());
        }

        if let Some(gate) = &self.rp_gate {
            gate.notified().await;
        }
        if self.fail_rp {
            return Err(SshError::Timeout(format!("{}:{}", endpoint.address, endpoint.port)));
        }
        Ok(self.rp.clone())
    }
}

pub fn endpoint(name: &'static str) -> RemoteEndpoint {
    RemoteEndpoint {
        name,
        address: "10.0.0.1".to_string(),
        port: 22,
        username: "root".to_string(),
        password: "rootroot".to_string(),
    }
}

/// 指向临时目录的测试配置，RP 凭据为 root/rootroot
pub fn console_config(dir: &std::path::Path) -> crate::config::ConsoleConfig {
    use crate::config::{CommandTemplates, ConsoleConfig, UploadConfig};

    ConsoleConfig {
        port: 0,
        rp: endpoint("rp"),
        host: endpoint("host"),
        apply_ip: "10.0.0.1".to_string(),
        commands: CommandTemplates::default(),
        upload: UploadConfig {
            allowed_extensions: vec!["wzd".to_string(), "cfg".to_string(), "conf".to_string()],
            max_content_length: 1024 * 1024,
            config_file_path: dir.join("config.com"),
        },
        template_dir: None,
        temp_dir: dir.to_path_buf(),
        session_idle_secs: 3600,
        connect_timeout_secs: 1,
    }
}
