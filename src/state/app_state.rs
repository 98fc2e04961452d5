//! 应用状态

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// 全局 shutdown token，用于优雅关闭所有后台任务
static GLOBAL_SHUTDOWN: std::sync::OnceLock<CancellationToken> = std::sync::OnceLock::new();

/// 获取全局 shutdown token
pub fn get_shutdown_token() -> CancellationToken {
    GLOBAL_SHUTDOWN
        .get_or_init(CancellationToken::new)
        .clone()
}

/// 触发全局 shutdown
pub fn trigger_shutdown() {
    if let Some(token) = GLOBAL_SHUTDOWN.get() {
        token.cancel();
    }
}

use crate::config::ConsoleConfig;
use crate::infra::{Connector, SshConnector, SshError};
use crate::services::{CommandHelper, TemplateRenderer, WarmupHandle};

use super::session_store::{SessionStore, UserSession};

/// 应用状态
pub struct AppState {
    /// 控制台配置
    pub config: ConsoleConfig,
    /// 服务启动时间
    pub started_at: DateTime<Utc>,
    /// 登录用户会话
    pub sessions: SessionStore,
    /// 远端会话连接器
    pub connector: Arc<dyn Connector>,
    /// load apply 串行锁（本地配置文件与 Host 上的脚本路径是共享的）
    pub load_apply_lock: Mutex<()>,
}

impl AppState {
    /// 使用 russh 连接器创建应用状态
    pub fn new(config: ConsoleConfig) -> Self {
        let connector = Arc::new(SshConnector::new(config.connect_timeout()));
        Self::with_connector(config, connector)
    }

    pub fn with_connector(config: ConsoleConfig, connector: Arc<dyn Connector>) -> Self {
        tracing::info!(
            port = config.port,
            rp = %config.rp.address,
            host = %config.host.address,
            apply_ip = %config.apply_ip,
            allowed_extensions = ?config.upload.allowed_extensions,
            session_idle_secs = config.session_idle_secs,
            "Loaded configuration"
        );

        Self {
            sessions: SessionStore::new(config.session_idle_secs),
            started_at: Utc::now(),
            connector,
            load_apply_lock: Mutex::new(()),
            config,
        }
    }

    /// 校验登录凭据（与 RP 卡的用户名/密码一致）
    pub fn verify_credentials(&self, username: &str, password: &str) -> bool {
        username == self.config.rp.username && password == self.config.rp.password
    }

    /// 建立用户会话：连接 Host，并在后台预热 RP 会话
    pub async fn open_session(&self, username: &str) -> Result<Arc<UserSession>, SshError> {
        let host = self.connector.connect(&self.config.host).await?;

        let helper = Arc::new(CommandHelper::new(
            self.config.commands.clone(),
            TemplateRenderer::new(self.config.template_dir.clone(), self.config.temp_dir.clone()),
            self.config.apply_ip.clone(),
            host,
        ));

        let warmup = WarmupHandle::spawn(
            self.connector.clone(),
            self.config.rp.clone(),
            helper.clone(),
        );

        let session = self
            .sessions
            .insert(UserSession::new(username, helper, warmup))
            .await;

        tracing::info!(session_id = %session.id, user = %username, "User session opened");
        Ok(session)
    }

    /// 关闭用户会话
    pub async fn close_session(&self, id: &str) -> bool {
        match self.sessions.remove(id).await {
            Some(session) => {
                session.shutdown().await;
                tracing::info!(session_id = %id, user = %session.username, "User session closed");
                true
            }
            None => false,
        }
    }

    /// 关闭全部会话
    pub async fn close_all_sessions(&self) -> usize {
        let sessions = self.sessions.drain().await;
        for session in &sessions {
            session.shutdown().await;
        }
        sessions.len()
    }

    /// 关闭所有空闲超时的会话
    pub async fn cleanup_expired_sessions(&self) -> usize {
        let expired = self.sessions.cleanup_expired().await;
        for session in &expired {
            session.shutdown().await;
        }
        expired.len()
    }
}
