//! SASN Console - SASN 节点 Web 管理控制台
//!
//! 通过 SSH 连接 RP 卡和 Host，提供命令控制台、状态查询和配置 load apply

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod middleware;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::env::constants::{SESSION_CLEANUP_INTERVAL_SECS, VERSION};
use crate::config::env::log_file_from_env;
use crate::config::ConsoleConfig;
use crate::state::app_state::{get_shutdown_token, trigger_shutdown};
use crate::state::AppState;

/// 命令行覆盖的运行时参数
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    /// 覆盖 PORT 环境变量
    pub port_override: Option<u16>,
}

/// 初始化日志：stdout 输出，设置了日志文件时额外追加写入（无 ANSI 颜色）
pub fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(std::sync::Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

/// 加载配置并运行控制台，直到收到 Ctrl-C
pub async fn init_and_run_console_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    // 先初始化日志，配置加载过程中的告警才能输出
    init_logging(log_file_from_env().as_deref())?;
    tracing::info!(version = VERSION, "Starting SASN console");

    let mut config = ConsoleConfig::from_env();
    if let Some(port) = runtime.port_override {
        config.port = port;
    }

    let port = config.port;
    let state = Arc::new(AppState::new(config));
    let shutdown = get_shutdown_token();

    tokio::spawn(session_cleanup_loop(state.clone()));

    tokio::spawn(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            return;
        }
        tracing::info!("Shutdown signal received");
        trigger_shutdown();
    });

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, api::router(state.clone()))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("server error")?;

    let closed = state.close_all_sessions().await;
    tracing::info!(closed, "SASN console stopped");
    Ok(())
}

/// 定期关闭空闲超时的用户会话
async fn session_cleanup_loop(state: Arc<AppState>) {
    let shutdown = get_shutdown_token();
    let mut interval = tokio::time::interval(Duration::from_secs(SESSION_CLEANUP_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let closed = state.cleanup_expired_sessions().await;
                if closed > 0 {
                    tracing::info!(closed, "Closed idle sessions");
                }
            }
        }
    }
}
