//! 登录/登出
//!
//! 包含 /, /logout 端点

use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{WebError, WebResult};
use crate::middleware::auth::{expired_session_cookie, session_cookie, session_id_from_headers};
use crate::state::AppState;

use super::pages;

/// 登录失败提示
pub const INVALID_CREDENTIAL: &str = "Invalid credential";

/// 登录表单
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// 创建登录路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(login_form).post(login))
        .route("/logout", get(logout))
}

/// GET /
async fn login_form() -> Html<String> {
    Html(pages::login_page(None))
}

/// POST /
///
/// 凭据与 RP 卡用户名/密码一致时建立会话并跳转首页
async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> WebResult<Response> {
    if !state.verify_credentials(&form.username, &form.password) {
        tracing::warn!(user = %form.username, "Login rejected");
        return Ok(Html(pages::login_page(Some(INVALID_CREDENTIAL))).into_response());
    }

    let session = state.open_session(&form.username).await.map_err(|e| {
        tracing::error!(user = %form.username, error = %e, "Failed to open host session");
        WebError::from(e)
    })?;

    Ok((
        [(header::SET_COOKIE, session_cookie(&session.id))],
        Redirect::to("/home/"),
    )
        .into_response())
}

/// GET /logout
///
/// 取消预热、关闭远端会话并清除 cookie
async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(id) = session_id_from_headers(&headers) {
        state.close_session(&id).await;
    }

    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Redirect::to("/"),
    )
}
