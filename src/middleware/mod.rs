//! 中间件模块
//!
//! 登录会话认证

pub mod auth;

pub use auth::{session_id_from_headers, RequireLogin, SESSION_COOKIE};
