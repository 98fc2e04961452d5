//! 登录会话认证
//!
//! 提供 `RequireLogin` extractor，从 `sasn_session` cookie 查找用户会话，
//! 替代每个 handler 中重复的登录校验逻辑

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, header::HeaderMap, request::Parts},
};
use std::sync::Arc;

use crate::error::WebError;
use crate::state::{AppState, UserSession};

/// 会话 cookie 名称
pub const SESSION_COOKIE: &str = "sasn_session";

/// 登录认证 Extractor
///
/// # Example
///
/// ```ignore
/// async fn protected_handler(
///     RequireLogin(session): RequireLogin,
/// ) -> impl IntoResponse {
///     // 通过 session.helper 执行命令...
/// }
/// ```
#[derive(Clone)]
pub struct RequireLogin(pub Arc<UserSession>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireLogin {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(id) = session_id_from_headers(&parts.headers) else {
            tracing::debug!(path = %parts.uri.path(), "Missing session cookie");
            return Err(WebError::unauthorized());
        };

        match state.sessions.get(&id).await {
            Some(session) => Ok(RequireLogin(session)),
            None => {
                tracing::warn!(path = %parts.uri.path(), "Unknown or expired session");
                Err(WebError::unauthorized())
            }
        }
    }
}

/// 从 Cookie header 中解析会话 ID
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// 登录成功后下发的 Set-Cookie 值
pub fn session_cookie(id: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

/// 登出时清除 cookie 的 Set-Cookie 值
pub fn expired_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_id_from_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sasn_session=abc-123; lang=en"),
        );
        assert_eq!(session_id_from_headers(&headers), Some("abc-123".to_string()));
    }

    #[test]
    fn test_session_id_across_cookie_headers() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("sasn_session=xyz"));
        assert_eq!(session_id_from_headers(&headers), Some("xyz".to_string()));
    }

    #[test]
    fn test_session_id_missing_or_empty() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_id_from_headers(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("sasn_session="));
        assert_eq!(session_id_from_headers(&headers), None);

        headers.insert(header::COOKIE, HeaderValue::from_static("other_session=abc"));
        assert_eq!(session_id_from_headers(&headers), None);
    }

    #[test]
    fn test_cookie_values() {
        assert_eq!(session_cookie("id1"), "sasn_session=id1; Path=/; HttpOnly; SameSite=Lax");
        assert!(expired_session_cookie().contains("Max-Age=0"));
    }
}
