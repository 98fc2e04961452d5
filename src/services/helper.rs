//! SASN 命令执行助手
//!
//! 持有两个独立的远端会话（RP 卡、Host），负责：
//! - 按目标格式化并执行命令
//! - 解析软件版本信息
//! - load and apply：渲染脚本、上传、执行并轮询提交进度

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::env::constants::{
    COMMIT_DONE_MARKER, COMMIT_POLL_ATTEMPTS, COMMIT_POLL_INTERVAL_SECS, LOAD_APPLY_COMMAND,
    LOAD_APPLY_TEMPLATE, REMOTE_CONFIG_PATH, REMOTE_SCRIPT_PATH, SCRIPT_MODE,
};
use crate::config::CommandTemplates;
use crate::domain::deploy::{load_apply_stages, CommitOutcome, LoadApplyReport};
use crate::domain::SoftwareInfo;
use crate::infra::{FileTransfer, RemoteShell, SshError};

use super::format;
use super::template::{TemplateError, TemplateRenderer};

/// 助手错误类型
#[derive(Debug, Error)]
pub enum HelperError {
    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

/// 命令目标
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Rp,
    Host,
}

/// 提交进度轮询策略
#[derive(Clone, Copy, Debug)]
pub struct CommitPoll {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for CommitPoll {
    fn default() -> Self {
        Self {
            attempts: COMMIT_POLL_ATTEMPTS,
            interval: Duration::from_secs(COMMIT_POLL_INTERVAL_SECS),
        }
    }
}

/// 命令执行助手
///
/// 每个登录用户持有一个实例；RP 会话由后台预热任务建立后再挂载
pub struct CommandHelper {
    commands: CommandTemplates,
    renderer: TemplateRenderer,
    /// 渲染进 load apply 脚本的 RP 管理 IP
    apply_ip: String,
    poll: CommitPoll,
    host: Arc<dyn RemoteShell>,
    rp: RwLock<Option<Arc<dyn RemoteShell>>>,
}

impl CommandHelper {
    pub fn new(
        commands: CommandTemplates,
        renderer: TemplateRenderer,
        apply_ip: impl Into<String>,
        host: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            commands,
            renderer,
            apply_ip: apply_ip.into(),
            poll: CommitPoll::default(),
            host,
            rp: RwLock::new(None),
        }
    }

    pub fn commands(&self) -> &CommandTemplates {
        &self.commands
    }

    /// 挂载 RP 会话，替换已有会话
    pub async fn attach_rp(&self, session: Arc<dyn RemoteShell>) {
        let previous = self.rp.write().await.replace(session);
        if let Some(previous) = previous {
            if let Err(e) = previous.close().await {
                warn!(error = %e, "Failed to close replaced RP session");
            }
        }
    }

    pub async fn has_rp(&self) -> bool {
        self.rp.read().await.is_some()
    }

    /// 在 RP 卡上执行命令，返回 stderr 行
    pub async fn exec_rp(&self, cmd: &str) -> Result<Vec<String>, SshError> {
        let rp = self
            .rp
            .read()
            .await
            .clone()
            .ok_or(SshError::NotConnected("rp"))?;
        let output = rp.exec(&format::rp_command(&self.commands.rp_prefix, cmd)).await?;
        Ok(output.stderr)
    }

    /// 在 Host 上执行命令，stdout 非空时返回 stdout，否则返回 stderr
    pub async fn exec_host(&self, cmd: &str) -> Result<Vec<String>, SshError> {
        let output = self
            .host
            .exec(&format::host_command(&self.commands.host_template, cmd))
            .await?;
        Ok(output.preferred_lines())
    }

    /// 按目标分发命令
    pub async fn exec(&self, target: Target, cmd: &str) -> Result<Vec<String>, SshError> {
        match target {
            Target::Rp => self.exec_rp(cmd).await,
            Target::Host => self.exec_host(cmd).await,
        }
    }

    /// 获取所有 SASN VM 的软件版本信息
    pub async fn software_information(&self) -> Result<SoftwareInfo, SshError> {
        let lines = self.exec_host(&self.commands.show_software_info).await?;
        Ok(SoftwareInfo::parse(&lines))
    }

    /// 上传配置文件并以单事务提交
    pub async fn load_apply(&self, config_file: &Path) -> Result<LoadApplyReport, HelperError> {
        let mut stages = load_apply_stages();

        // Stage 1: render
        stages[0].start();
        let script = self
            .renderer
            .render_to_file(
                LOAD_APPLY_TEMPLATE,
                &[
                    ("local_file_path", REMOTE_SCRIPT_PATH),
                    ("ip", self.apply_ip.as_str()),
                    ("command", LOAD_APPLY_COMMAND),
                ],
            )
            .await?;
        stages[0].finish(true, Some(script.display().to_string()));

        // Stage 2: transfer
        stages[1].start();
        self.host
            .put_files(&[
                FileTransfer::new(script, REMOTE_SCRIPT_PATH),
                FileTransfer::new(config_file, REMOTE_CONFIG_PATH),
            ])
            .await?;
        stages[1].finish(true, None);

        // Stage 3: execute
        stages[2].start();
        self.host
            .exec(&format!("chmod {} {}", SCRIPT_MODE, REMOTE_SCRIPT_PATH))
            .await?;
        let run = self.host.exec(REMOTE_SCRIPT_PATH).await?;
        stages[2].finish(true, run.exit_status.map(|code| format!("exit status {}", code)));

        // Stage 4: poll
        stages[3].start();
        let outcome = self.wait_commit_done().await?;
        match outcome {
            CommitOutcome::Done { .. } => stages[3].finish(true, None),
            CommitOutcome::NotConfirmed { attempts } => stages[3].finish(
                false,
                Some(format!("commit not confirmed after {} attempts", attempts)),
            ),
        }

        info!(
            config_file = %config_file.display(),
            outcome = ?outcome,
            "Load and apply finished"
        );

        Ok(LoadApplyReport { outcome, stages })
    }

    /// 轮询提交进度，直到出现 "No commit in progress" 或重试用尽
    ///
    /// 每次未确认后都会等待一个间隔，最坏情况 attempts × interval
    pub async fn wait_commit_done(&self) -> Result<CommitOutcome, SshError> {
        for attempt in 1..=self.poll.attempts {
            let lines = self.exec_host(&self.commands.show_commit_progress).await?;
            if lines.iter().any(|line| line.contains(COMMIT_DONE_MARKER)) {
                return Ok(CommitOutcome::Done { attempts: attempt });
            }
            info!(attempt, "Commit still in progress");
            tokio::time::sleep(self.poll.interval).await;
        }

        warn!(attempts = self.poll.attempts, "Commit completion not confirmed");
        Ok(CommitOutcome::NotConfirmed {
            attempts: self.poll.attempts,
        })
    }

    /// 关闭两个会话
    pub async fn close(&self) {
        if let Some(rp) = self.rp.write().await.take() {
            if let Err(e) = rp.close().await {
                warn!(error = %e, "Failed to close RP session");
            }
        }
        if let Err(e) = self.host.close().await {
            warn!(error = %e, "Failed to close host session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageStatus;
    use crate::infra::ExecOutput;
    use crate::test_support::{stdout, MockShell};
    use tokio::time::Instant;

    fn stderr(lines: &[&str]) -> ExecOutput {
        ExecOutput {
            stdout: Vec::new(),
            stderr: lines.iter().map(|s| s.to_string()).collect(),
            exit_status: Some(0),
        }
    }

    /// 暂停时钟下的耗时断言，容忍计时器的毫秒级取整
    fn assert_elapsed(start: Instant, secs: u64) {
        let elapsed = start.elapsed();
        let expected = Duration::from_secs(secs);
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_millis(100),
            "elapsed {:?}, expected {:?}",
            elapsed,
            expected
        );
    }

    fn templates() -> CommandTemplates {
        CommandTemplates {
            rp_prefix: "nssh".to_string(),
            host_template: "%s".to_string(),
            show_software_info: "show software info".to_string(),
            show_commit_progress: "show commit progress".to_string(),
            show_status: "show status".to_string(),
            list_partitions: "ns part list".to_string(),
        }
    }

    fn helper(host: Arc<MockShell>, output_dir: &Path) -> CommandHelper {
        CommandHelper::new(
            templates(),
            TemplateRenderer::new(None, output_dir.to_path_buf()),
            "10.0.0.2",
            host,
        )
    }

    /// 第 k 次轮询时返回完成标志的 host
    fn commit_done_on(k: usize) -> Arc<MockShell> {
        Arc::new(MockShell::new(move |cmd, nth| {
            if cmd == "show commit progress" && nth >= k {
                stdout(&["No commit in progress"])
            } else if cmd == "show commit progress" {
                stdout(&["Commit in progress: 42%"])
            } else {
                stdout(&[])
            }
        }))
    }

    #[tokio::test]
    async fn test_exec_host_formats_and_prefers_stdout() {
        let host = Arc::new(MockShell::new(|_, _| stdout(&["ok"])));
        let dir = tempfile::tempdir().unwrap();
        let helper = CommandHelper::new(
            CommandTemplates {
                host_template: "wrap[%s]".to_string(),
                ..templates()
            },
            TemplateRenderer::new(None, dir.path().to_path_buf()),
            "10.0.0.2",
            host.clone(),
        );

        let lines = helper.exec_host("echo 'hi'").await.unwrap();
        assert_eq!(lines, vec!["ok"]);
        assert_eq!(host.commands(), vec![r"wrap[echo \'hi\']"]);
    }

    #[tokio::test]
    async fn test_exec_host_falls_back_to_stderr() {
        let host = Arc::new(MockShell::new(|_, _| stderr(&["not found"])));
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host, dir.path());

        assert_eq!(helper.exec_host("nope").await.unwrap(), vec!["not found"]);
    }

    #[tokio::test]
    async fn test_exec_rp_requires_session_and_reads_stderr() {
        let host = Arc::new(MockShell::new(|_, _| stdout(&[])));
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host, dir.path());

        assert!(matches!(
            helper.exec_rp("ns part list").await,
            Err(SshError::NotConnected("rp"))
        ));

        let rp = Arc::new(MockShell::new(|_, _| ExecOutput {
            stdout: vec!["ignored".to_string()],
            stderr: vec!["partition-1".to_string()],
            exit_status: Some(0),
        }));
        helper.attach_rp(rp.clone()).await;

        assert_eq!(helper.exec_rp("ns part list").await.unwrap(), vec!["partition-1"]);
        assert_eq!(rp.commands(), vec!["nssh \"ns part list\""]);
    }

    #[tokio::test]
    async fn test_exec_dispatches_by_target() {
        let host = Arc::new(MockShell::new(|_, _| stdout(&["from host"])));
        let rp = Arc::new(MockShell::new(|_, _| stderr(&["from rp"])));
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host, dir.path());
        helper.attach_rp(rp).await;

        assert_eq!(helper.exec(Target::Host, "date").await.unwrap(), vec!["from host"]);
        assert_eq!(helper.exec(Target::Rp, "date").await.unwrap(), vec!["from rp"]);
    }

    #[tokio::test]
    async fn test_software_information_end_to_end() {
        let host = Arc::new(MockShell::new(|cmd, _| {
            assert_eq!(cmd, "show software info");
            stdout(&["heuristics  1.2.3 pkgA pkgB", "sasn-vpf 9.9.9"])
        }));
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host, dir.path());

        let info = helper.software_information().await.unwrap();
        assert_eq!(info.as_slice(), ["1.2.3", "pkgA pkgB", "9.9.9"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_on_kth_attempt() {
        for k in 1..=3usize {
            let host = commit_done_on(k);
            let dir = tempfile::tempdir().unwrap();
            let helper = helper(host.clone(), dir.path());

            let start = Instant::now();
            let outcome = helper.wait_commit_done().await.unwrap();

            assert_eq!(outcome, CommitOutcome::Done { attempts: k as u32 });
            assert_eq!(host.count("show commit progress"), k);
            assert_elapsed(start, 5 * (k as u64 - 1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_three_attempts() {
        let host = commit_done_on(usize::MAX);
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host.clone(), dir.path());

        let start = Instant::now();
        let outcome = helper.wait_commit_done().await.unwrap();

        assert_eq!(outcome, CommitOutcome::NotConfirmed { attempts: 3 });
        assert!(!outcome.is_done());
        assert_eq!(host.count("show commit progress"), 3);
        assert_elapsed(start, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_apply_workflow() {
        let host = commit_done_on(2);
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("upload.cfg");
        std::fs::write(&config_file, "config data").unwrap();
        let helper = helper(host.clone(), &dir.path().join("rendered"));

        let start = Instant::now();
        let report = helper.load_apply(&config_file).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.outcome.attempts(), 2);
        assert_eq!(host.count("show commit progress"), 2);
        assert_elapsed(start, 5);
        assert!(report.stages.iter().all(|s| s.status == StageStatus::Success));

        let transfers = host.transfers.lock().unwrap().clone();
        assert_eq!(
            transfers,
            vec![
                FileTransfer::new(dir.path().join("rendered").join("loadApply"), "/tmp/loadApply"),
                FileTransfer::new(config_file.clone(), "/tmp/config.com"),
            ]
        );

        let commands = host.commands();
        assert_eq!(commands[0], "chmod 744 /tmp/loadApply");
        assert_eq!(commands[1], "/tmp/loadApply");

        let script = std::fs::read_to_string(dir.path().join("rendered").join("loadApply")).unwrap();
        assert!(script.contains("root@10.0.0.2"));
        assert!(script.contains("configure /tmp/loadApply single-app-commit"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_apply_not_confirmed() {
        let host = commit_done_on(usize::MAX);
        let dir = tempfile::tempdir().unwrap();
        let config_file = dir.path().join("upload.wzd");
        std::fs::write(&config_file, "x").unwrap();
        let helper = helper(host, dir.path());

        let report = helper.load_apply(&config_file).await.unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.stages[3].status, StageStatus::Failed);
    }

    #[tokio::test]
    async fn test_close_closes_both_sessions() {
        let host = Arc::new(MockShell::new(|_, _| stdout(&[])));
        let rp = Arc::new(MockShell::new(|_, _| stdout(&[])));
        let dir = tempfile::tempdir().unwrap();
        let helper = helper(host.clone(), dir.path());
        helper.attach_rp(rp.clone()).await;

        helper.close().await;
        assert!(*host.closed.lock().unwrap());
        assert!(*rp.closed.lock().unwrap());
        assert!(!helper.has_rp().await);
    }
}
