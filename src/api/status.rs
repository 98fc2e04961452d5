//! 状态查询页面
//!
//! 包含 /home/, /showstatus/, /showsessions/ 端点

use axum::{
    response::Html,
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{WebError, WebResult};
use crate::middleware::RequireLogin;
use crate::services::format::show_sessions_command;
use crate::services::WarmupStatus;
use crate::state::{AppState, UserSession};

use super::pages::{self, HomeView};

/// 预热失败时的提示
pub const WARMUP_FAILED: &str = "There is something with ssh key between RP and Host, please check!";

#[derive(Debug, Deserialize)]
pub struct PartitionForm {
    #[serde(default)]
    pub partition: String,
}

/// 创建状态查询路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/home/", get(home))
        .route("/showstatus/", get(show_status))
        .route("/showsessions/", get(list_partitions).post(show_sessions))
}

/// GET /home/
///
/// 预热完成后展示所有 SASN VM 的软件版本
async fn home(RequireLogin(session): RequireLogin) -> WebResult<Html<String>> {
    let page = match session.warmup.status() {
        WarmupStatus::Ready => {
            let info = session.helper.software_information().await?;
            pages::status_page(HomeView::Software {
                records: &info.records(),
                info_num: info.len(),
            })
        }
        WarmupStatus::Pending => pages::status_page(HomeView::Connecting),
        WarmupStatus::Failed(_) | WarmupStatus::Cancelled => {
            pages::status_page(HomeView::Error(WARMUP_FAILED))
        }
    };
    Ok(Html(page))
}

/// GET /showstatus/
async fn show_status(RequireLogin(session): RequireLogin) -> WebResult<Html<String>> {
    let command = session.helper.commands().show_status.clone();
    let results = session.helper.exec_host(&command).await?;
    Ok(Html(pages::show_status_page(&results)))
}

/// GET /showsessions/
///
/// 查询分区列表并缓存到会话
async fn list_partitions(RequireLogin(session): RequireLogin) -> WebResult<Html<String>> {
    let partitions = refresh_partitions(&session).await?;
    Ok(Html(pages::show_sessions_page(&partitions, None)))
}

/// POST /showsessions/
///
/// 只接受分区列表中出现过的分区名
async fn show_sessions(
    RequireLogin(session): RequireLogin,
    Form(form): Form<PartitionForm>,
) -> WebResult<Html<String>> {
    let partition = form.partition.trim();

    let mut partitions = session.partitions.lock().await.clone();
    if !is_known_partition(&partitions, partition) {
        partitions = refresh_partitions(&session).await?;
    }
    if !is_known_partition(&partitions, partition) {
        tracing::warn!(user = %session.username, partition = %partition, "Unknown partition");
        return Err(WebError::bad_request(format!("Unknown partition '{}'", partition)));
    }

    let results = session
        .helper
        .exec_host(&show_sessions_command(partition))
        .await?;
    Ok(Html(pages::show_sessions_page(&partitions, Some(&results))))
}

async fn refresh_partitions(session: &UserSession) -> WebResult<Vec<String>> {
    let command = session.helper.commands().list_partitions.clone();
    let partitions = session.helper.exec_host(&command).await?;
    *session.partitions.lock().await = partitions.clone();
    Ok(partitions)
}

fn is_known_partition(partitions: &[String], partition: &str) -> bool {
    !partition.is_empty() && partitions.iter().any(|p| p.trim() == partition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_known_partition() {
        let partitions = vec!["part1".to_string(), "  part2 ".to_string()];
        assert!(is_known_partition(&partitions, "part1"));
        assert!(is_known_partition(&partitions, "part2"));
        assert!(!is_known_partition(&partitions, "part3"));
        assert!(!is_known_partition(&partitions, ""));
    }
}
