//! 统一错误处理
//!
//! 提供 `WebError` 枚举实现 `IntoResponse`，以 HTML 错误页面和对应状态码响应

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::api::pages;
use crate::infra::SshError;
use crate::services::HelperError;

/// 统一页面错误类型
#[derive(Debug)]
pub enum WebError {
    /// 401 - 未登录或会话已过期
    Unauthorized,
    /// 400 - 请求无效
    BadRequest(String),
    /// 500 - 内部错误
    Internal(String),
    /// 503 - 远端会话不可用
    ServiceUnavailable(String),
}

impl WebError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            WebError::Unauthorized => StatusCode::UNAUTHORIZED,
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            WebError::Unauthorized => pages::unauthorized_page(),
            WebError::BadRequest(msg) => pages::error_page("Bad Request", msg),
            WebError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                pages::error_page("Internal Error", msg)
            }
            WebError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Remote session unavailable");
                pages::error_page("Service Unavailable", msg)
            }
        };

        (status, Html(body)).into_response()
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::Unauthorized => write!(f, "Unauthorized"),
            WebError::BadRequest(m) => write!(f, "Bad request: {}", m),
            WebError::Internal(m) => write!(f, "Internal error: {}", m),
            WebError::ServiceUnavailable(m) => write!(f, "Service unavailable: {}", m),
        }
    }
}

impl std::error::Error for WebError {}

impl From<SshError> for WebError {
    fn from(e: SshError) -> Self {
        match e {
            SshError::Io(e) => Self::Internal(e.to_string()),
            other => Self::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<HelperError> for WebError {
    fn from(e: HelperError) -> Self {
        match e {
            HelperError::Ssh(e) => e.into(),
            HelperError::Template(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<std::io::Error> for WebError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

/// 便捷类型别名
pub type WebResult<T> = Result<T, WebError>;
