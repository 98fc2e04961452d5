//! 配置上传与提交
//!
//! 包含 /loadandapply/ 端点：校验扩展名、保存配置文件，然后执行 load apply

use axum::{
    extract::{Multipart, State},
    response::Html,
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;

use crate::error::{WebError, WebResult};
use crate::middleware::RequireLogin;
use crate::state::AppState;

use super::pages::{self, UploadView};

/// 扩展名不合法时的提示
pub const INVALID_EXTENSION: &str = "Invalid extension of file, should end with wzd, cfg or conf";

/// 上传表单中的文件字段名
const FILE_FIELD: &str = "file";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/loadandapply/", get(upload_form).post(upload_and_apply))
}

/// 检查文件名扩展名（区分大小写）
pub fn allowed_file(filename: &str, allowed_extensions: &[String]) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => allowed_extensions.iter().any(|allowed| allowed == ext),
        None => false,
    }
}

/// GET /loadandapply/
async fn upload_form(_login: RequireLogin) -> Html<String> {
    Html(pages::load_apply_page(UploadView::Form))
}

/// POST /loadandapply/
async fn upload_and_apply(
    RequireLogin(session): RequireLogin,
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> WebResult<Html<String>> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| WebError::bad_request(e.to_string()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| WebError::bad_request(e.to_string()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Ok(Html(pages::load_apply_page(UploadView::Invalid("No file part"))));
    };
    if filename.is_empty() {
        return Ok(Html(pages::load_apply_page(UploadView::Invalid("No selected file"))));
    }
    if !allowed_file(&filename, &state.config.upload.allowed_extensions) {
        tracing::warn!(user = %session.username, filename = %filename, "Rejected upload");
        return Ok(Html(pages::load_apply_page(UploadView::Invalid(INVALID_EXTENSION))));
    }

    // 配置文件路径和 Host 上的脚本路径是共享的，同一时间只允许一个 load apply
    let _guard = state.load_apply_lock.lock().await;

    let config_file = &state.config.upload.config_file_path;
    save_upload(config_file, &data).await?;
    tracing::info!(
        user = %session.username,
        filename = %filename,
        size = data.len(),
        "Config file uploaded"
    );

    let report = session.helper.load_apply(config_file).await?;
    Ok(Html(pages::load_apply_page(UploadView::Applied(&report))))
}

async fn save_upload(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
}
