//! 运行时状态模块
//!
//! 管理应用状态和用户会话

pub mod app_state;
pub mod session_store;

pub use app_state::AppState;
pub use session_store::{SessionStore, UserSession};
