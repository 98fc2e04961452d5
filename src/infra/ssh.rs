//! SSH 客户端
//!
//! 基于 russh 的远端命令执行与 SFTP 文件传输：
//! - 用户名/密码认证
//! - 自动信任未知主机密钥（不做 host key 校验）
//! - 命令输出按 stdout/stderr 分离并按行切分

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_sftp::client::SftpSession;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::RemoteEndpoint;

/// SSH 错误类型
#[derive(Debug, Error)]
pub enum SshError {
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("Authentication failed for {user}@{endpoint}")]
    AuthFailed { endpoint: String, user: String },

    #[error("Connection to {0} timed out")]
    Timeout(String),

    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("SFTP error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No open session to {0}")]
    NotConnected(&'static str),
}

/// 命令执行结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExecOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// 远端未报告退出码时为 None
    pub exit_status: Option<u32>,
}

impl ExecOutput {
    /// 由原始字节构建，按行切分
    pub fn from_bytes(stdout: &[u8], stderr: &[u8], exit_status: Option<u32>) -> Self {
        Self {
            stdout: split_lines(stdout),
            stderr: split_lines(stderr),
            exit_status,
        }
    }

    /// stdout 非空时返回 stdout，否则返回 stderr
    pub fn preferred_lines(self) -> Vec<String> {
        if self.stdout.is_empty() {
            self.stderr
        } else {
            self.stdout
        }
    }
}

/// 单个文件传输请求
#[derive(Clone, Debug, PartialEq)]
pub struct FileTransfer {
    pub local: PathBuf,
    pub remote: String,
}

impl FileTransfer {
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            remote: remote.into(),
        }
    }
}

/// 远端 shell 会话
///
/// 真实实现为 [`SshSession`]，测试中可替换为 mock
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// 执行原始命令（不做任何包装）
    async fn exec(&self, command: &str) -> Result<ExecOutput, SshError>;

    /// 在同一个 SFTP 子通道中依次上传文件，完成后关闭子通道
    async fn put_files(&self, transfers: &[FileTransfer]) -> Result<(), SshError>;

    /// 关闭会话
    async fn close(&self) -> Result<(), SshError>;
}

/// 会话建立接口
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn RemoteShell>, SshError>;
}

/// 基于 russh 的连接器
pub struct SshConnector {
    timeout: Duration,
}

impl SshConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Arc<dyn RemoteShell>, SshError> {
        let session = SshSession::connect(endpoint, self.timeout).await?;
        Ok(Arc::new(session))
    }
}

/// 客户端回调处理器
struct ClientHandler;

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh_keys::key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // 首次使用即信任，不校验 known_hosts
        debug!(key_type = ?server_public_key.name(), "Accepting server host key");
        Ok(true)
    }
}

/// 已认证的 SSH 会话
pub struct SshSession {
    endpoint: String,
    handle: Handle<ClientHandler>,
}

impl SshSession {
    /// 建立连接并使用密码认证
    ///
    /// 握手和认证共用同一个超时
    pub async fn connect(endpoint: &RemoteEndpoint, timeout: Duration) -> Result<Self, SshError> {
        let target = format!("{}:{}", endpoint.address, endpoint.port);
        info!(endpoint = endpoint.name, target = %target, user = %endpoint.username, "Opening SSH session");

        let handle = match tokio::time::timeout(timeout, handshake(endpoint, &target)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(endpoint = endpoint.name, target = %target, "SSH connect timed out");
                return Err(SshError::Timeout(target));
            }
        };

        info!(endpoint = endpoint.name, target = %target, "SSH session established");
        Ok(Self {
            endpoint: target,
            handle,
        })
    }
}

/// TCP 连接、SSH 握手与密码认证
async fn handshake(endpoint: &RemoteEndpoint, target: &str) -> Result<Handle<ClientHandler>, SshError> {
    let config = Arc::new(client::Config {
        inactivity_timeout: None,
        ..Default::default()
    });

    let mut handle = client::connect(
        config,
        (endpoint.address.as_str(), endpoint.port),
        ClientHandler,
    )
    .await
    .map_err(|e| SshError::Connect {
        endpoint: target.to_string(),
        reason: e.to_string(),
    })?;

    let authenticated = handle
        .authenticate_password(endpoint.username.as_str(), endpoint.password.as_str())
        .await?;
    if !authenticated {
        warn!(endpoint = endpoint.name, target = %target, "SSH password auth rejected");
        return Err(SshError::AuthFailed {
            endpoint: target.to_string(),
            user: endpoint.username.clone(),
        });
    }

    Ok(handle)
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(&self, command: &str) -> Result<ExecOutput, SshError> {
        debug!(endpoint = %self.endpoint, command = %command, "Executing remote command");

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(data);
                    }
                }
                // ExitStatus 之后仍可能有数据，继续读到通道关闭
                ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
                _ => {}
            }
        }

        if exit_status.map_or(false, |code| code != 0) {
            debug!(endpoint = %self.endpoint, exit_status = ?exit_status, "Remote command exited non-zero");
        }

        Ok(ExecOutput::from_bytes(&stdout, &stderr, exit_status))
    }

    async fn put_files(&self, transfers: &[FileTransfer]) -> Result<(), SshError> {
        let channel = self.handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream()).await?;

        for transfer in transfers {
            upload_one(&sftp, &transfer.local, &transfer.remote).await?;
            info!(
                endpoint = %self.endpoint,
                local = %transfer.local.display(),
                remote = %transfer.remote,
                "Uploaded file"
            );
        }

        sftp.close().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), SshError> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await?;
        info!(endpoint = %self.endpoint, "SSH session closed");
        Ok(())
    }
}

async fn upload_one(sftp: &SftpSession, local: &Path, remote: &str) -> Result<(), SshError> {
    let contents = tokio::fs::read(local).await?;
    let mut file = sftp.create(remote).await?;
    file.write_all(&contents).await?;
    file.flush().await?;
    file.shutdown().await?;
    Ok(())
}

/// 按行切分输出，去掉行尾换行符
fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(|line| line.trim_end_matches('\r').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_times_out_on_stalled_server() {
        // 接受连接但从不发送 SSH banner
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let endpoint = RemoteEndpoint {
            name: "host",
            address: "127.0.0.1".to_string(),
            port,
            username: "root".to_string(),
            password: "rootroot".to_string(),
        };

        let start = std::time::Instant::now();
        let result = SshSession::connect(&endpoint, Duration::from_millis(200)).await;
        assert!(matches!(result, Err(SshError::Timeout(target)) if target == format!("127.0.0.1:{}", port)));
        assert!(start.elapsed() < Duration::from_secs(5));

        server.abort();
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(b"a\r\nb\nc"), vec!["a", "b", "c"]);
        assert!(split_lines(b"").is_empty());
    }

    #[test]
    fn test_preferred_lines_uses_stdout_first() {
        let output = ExecOutput::from_bytes(b"out\n", b"err\n", Some(0));
        assert_eq!(output.preferred_lines(), vec!["out"]);
    }

    #[test]
    fn test_preferred_lines_falls_back_to_stderr() {
        let output = ExecOutput::from_bytes(b"", b"err1\nerr2\n", Some(1));
        assert_eq!(output.preferred_lines(), vec!["err1", "err2"]);

        let empty = ExecOutput::from_bytes(b"", b"", None);
        assert!(empty.preferred_lines().is_empty());
    }
}
