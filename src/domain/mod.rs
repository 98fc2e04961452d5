//! 领域模型模块
//!
//! 纯数据结构，不依赖 axum/russh

pub mod console;
pub mod deploy;
pub mod software;

// Re-exports for convenience
pub use console::ConsoleTranscript;
pub use deploy::{CommitOutcome, DeployStage, LoadApplyReport, StageStatus};
pub use software::{SoftwareInfo, SoftwareRecord};
