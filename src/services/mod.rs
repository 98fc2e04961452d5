//! 服务层模块
//!
//! 包含核心业务逻辑

pub mod format;
pub mod helper;
pub mod template;
pub mod warmup;

pub use helper::{CommandHelper, HelperError, Target};
pub use template::TemplateRenderer;
pub use warmup::{WarmupHandle, WarmupStatus};
