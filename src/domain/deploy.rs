//! load and apply 相关领域模型

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 阶段状态
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
        }
    }
}

/// 部署阶段信息
#[derive(Clone, Debug, Serialize)]
pub struct DeployStage {
    /// 阶段标识 (e.g., "render", "transfer", "poll")
    pub name: String,
    /// 显示名称
    pub display_name: String,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 持续时间（毫秒）
    pub duration_ms: Option<i64>,
    pub status: StageStatus,
    /// 附加信息
    pub message: Option<String>,
}

impl DeployStage {
    /// 创建新的待执行阶段
    pub fn new(name: &str, display_name: &str) -> Self {
        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            status: StageStatus::Pending,
            message: None,
        }
    }

    /// 开始执行阶段
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = StageStatus::Running;
    }

    /// 完成阶段
    pub fn finish(&mut self, success: bool, message: Option<String>) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.status = if success {
            StageStatus::Success
        } else {
            StageStatus::Failed
        };
        self.message = message;
        if let Some(started) = self.started_at {
            self.duration_ms = Some((now - started).num_milliseconds());
        }
    }
}

/// load apply 的四个阶段：渲染、传输、执行、轮询
pub fn load_apply_stages() -> Vec<DeployStage> {
    vec![
        DeployStage::new("render", "Render Script"),
        DeployStage::new("transfer", "Transfer Files"),
        DeployStage::new("execute", "Execute Script"),
        DeployStage::new("poll", "Wait For Commit"),
    ]
}

/// 提交确认结果
///
/// `NotConfirmed` 只表示在重试次数内没有看到完成标志，提交本身可能仍在进行或已失败
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// 观察到 "No commit in progress"
    Done { attempts: u32 },
    /// 重试用尽仍未确认
    NotConfirmed { attempts: u32 },
}

impl CommitOutcome {
    pub fn is_done(&self) -> bool {
        matches!(self, CommitOutcome::Done { .. })
    }

    /// 实际执行的轮询次数
    pub fn attempts(&self) -> u32 {
        match self {
            CommitOutcome::Done { attempts } | CommitOutcome::NotConfirmed { attempts } => *attempts,
        }
    }
}

/// load apply 执行报告
#[derive(Clone, Debug, Serialize)]
pub struct LoadApplyReport {
    pub outcome: CommitOutcome,
    pub stages: Vec<DeployStage>,
}

impl LoadApplyReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_done()
    }
}
