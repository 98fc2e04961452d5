//! 命令控制台
//!
//! 包含 /my_console/ 端点，命令在 Host 上执行，记录按用户保存

use axum::{response::Html, routing::get, Form, Router};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::WebResult;
use crate::middleware::RequireLogin;
use crate::services::Target;
use crate::state::AppState;

use super::pages;

#[derive(Debug, Deserialize)]
pub struct CommandForm {
    #[serde(default)]
    pub cmd: String,
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/my_console/", get(show_console).post(run_command))
}

/// GET /my_console/
async fn show_console(RequireLogin(session): RequireLogin) -> Html<String> {
    let console = session.console.lock().await;
    Html(pages::console_page(console.lines()))
}

/// POST /my_console/
async fn run_command(
    RequireLogin(session): RequireLogin,
    Form(form): Form<CommandForm>,
) -> WebResult<Html<String>> {
    let cmd = form.cmd.trim();
    if cmd.is_empty() {
        let console = session.console.lock().await;
        return Ok(Html(pages::console_page(console.lines())));
    }

    tracing::info!(user = %session.username, cmd = %cmd, "Console command");
    let output = session.helper.exec(Target::Host, cmd).await?;

    let mut console = session.console.lock().await;
    console.record(cmd, output);
    Ok(Html(pages::console_page(console.lines())))
}
