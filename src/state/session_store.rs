//! 用户会话存储
//!
//! 每个登录用户持有独立的命令助手、预热句柄和控制台记录，空闲超时后清理

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::config::env::constants::MAX_SESSION_IDLE_SECS;
use crate::domain::ConsoleTranscript;
use crate::services::{CommandHelper, WarmupHandle};

/// 登录用户会话
pub struct UserSession {
    pub id: String,
    pub username: String,
    pub helper: Arc<CommandHelper>,
    pub warmup: WarmupHandle,
    /// 命令控制台记录
    pub console: Mutex<ConsoleTranscript>,
    /// 最近一次查询到的分区列表
    pub partitions: Mutex<Vec<String>>,
    pub created_at: DateTime<Utc>,
    last_seen: std::sync::Mutex<DateTime<Utc>>,
}

impl UserSession {
    pub fn new(username: impl Into<String>, helper: Arc<CommandHelper>, warmup: WarmupHandle) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            helper,
            warmup,
            console: Mutex::new(ConsoleTranscript::new()),
            partitions: Mutex::new(Vec::new()),
            created_at: now,
            last_seen: std::sync::Mutex::new(now),
        }
    }

    fn touch(&self) {
        if let Ok(mut last_seen) = self.last_seen.lock() {
            *last_seen = Utc::now();
        }
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
            .lock()
            .map(|t| *t)
            .unwrap_or(self.created_at)
    }

    /// 取消预热并关闭远端会话
    pub async fn shutdown(&self) {
        self.warmup.cancel();
        self.helper.close().await;
    }
}

/// 会话存储
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<UserSession>>>,
    /// 空闲超时
    idle_timeout: Duration,
}

impl SessionStore {
    /// 超时秒数超过 [`MAX_SESSION_IDLE_SECS`] 时按上限处理
    pub fn new(idle_timeout_secs: u64) -> Self {
        let secs = idle_timeout_secs.min(MAX_SESSION_IDLE_SECS) as i64;
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout: Duration::seconds(secs),
        }
    }

    /// 保存会话
    pub async fn insert(&self, session: UserSession) -> Arc<UserSession> {
        let session = Arc::new(session);
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    /// 获取会话并刷新活跃时间，已过期的会话视为不存在
    pub async fn get(&self, id: &str) -> Option<Arc<UserSession>> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(id)?;
        if self.is_expired(session, Utc::now()) {
            return None;
        }
        session.touch();
        Some(session.clone())
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// 移除空闲超时的会话，返回被移除的会话（由调用方关闭）
    pub async fn cleanup_expired(&self) -> Vec<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        let mut expired = Vec::new();

        sessions.retain(|id, session| {
            if self.is_expired(session, now) {
                tracing::info!(session_id = %id, user = %session.username, "Session expired");
                expired.push(session.clone());
                false
            } else {
                true
            }
        });

        expired
    }

    /// 取出全部会话（服务关闭时使用）
    pub async fn drain(&self) -> Vec<Arc<UserSession>> {
        let mut sessions = self.sessions.write().await;
        sessions.drain().map(|(_, session)| session).collect()
    }

    fn is_expired(&self, session: &UserSession, now: DateTime<Utc>) -> bool {
        now - session.last_seen() > self.idle_timeout
    }
}
