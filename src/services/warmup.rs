//! 登录后的连接预热
//!
//! 登录时在后台建立 RP 会话并做一次 Host 连通性探测，
//! 首页渲染前通过非阻塞的 `status()` 查询结果；登出时可取消

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::RemoteEndpoint;
use crate::infra::Connector;

use super::helper::CommandHelper;

/// 探测命令
const PROBE_COMMAND: &str = "date";

/// 预热状态
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum WarmupStatus {
    Pending,
    Ready,
    Failed(String),
    Cancelled,
}

/// 预热任务句柄
pub struct WarmupHandle {
    status: watch::Receiver<WarmupStatus>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WarmupHandle {
    /// 启动预热任务
    pub fn spawn(
        connector: Arc<dyn Connector>,
        endpoint: RemoteEndpoint,
        helper: Arc<CommandHelper>,
    ) -> Self {
        let (tx, rx) = watch::channel(WarmupStatus::Pending);
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let status = tokio::select! {
                _ = token.cancelled() => WarmupStatus::Cancelled,
                status = warm_up(connector.as_ref(), &endpoint, &helper) => status,
            };

            match &status {
                WarmupStatus::Ready => info!(endpoint = endpoint.name, "Connection warm-up finished"),
                WarmupStatus::Failed(reason) => {
                    warn!(endpoint = endpoint.name, reason = %reason, "Connection warm-up failed")
                }
                WarmupStatus::Cancelled => info!(endpoint = endpoint.name, "Connection warm-up cancelled"),
                WarmupStatus::Pending => {}
            }

            let _ = tx.send(status);
        });

        Self {
            status: rx,
            cancel,
            task,
        }
    }

    /// 当前状态（不阻塞）
    pub fn status(&self) -> WarmupStatus {
        self.status.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.status.borrow(), WarmupStatus::Ready)
    }

    /// 取消进行中的预热
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn warm_up(
    connector: &dyn Connector,
    endpoint: &RemoteEndpoint,
    helper: &CommandHelper,
) -> WarmupStatus {
    let session = match connector.connect(endpoint).await {
        Ok(session) => session,
        Err(e) => return WarmupStatus::Failed(e.to_string()),
    };
    helper.attach_rp(session).await;

    match helper.exec_host(PROBE_COMMAND).await {
        Ok(_) => WarmupStatus::Ready,
        Err(e) => WarmupStatus::Failed(e.to_string()),
    }
}
