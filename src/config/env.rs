//! 环境变量配置加载

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// 控制台配置
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// 服务监听端口
    pub port: u16,
    /// RP 卡（管理面）连接信息
    pub rp: RemoteEndpoint,
    /// Host（主命令接口）连接信息
    pub host: RemoteEndpoint,
    /// load apply 脚本中渲染的 RP 管理 IP
    pub apply_ip: String,
    /// 命令模板
    pub commands: CommandTemplates,
    /// 上传配置
    pub upload: UploadConfig,
    /// 模板覆盖目录（未设置时使用内置模板）
    pub template_dir: Option<PathBuf>,
    /// 渲染脚本的本地临时目录
    pub temp_dir: PathBuf,
    /// 会话空闲超时秒数
    pub session_idle_secs: u64,
    /// SSH 连接超时秒数
    pub connect_timeout_secs: u64,
}

/// 远端 SSH 端点
#[derive(Clone)]
pub struct RemoteEndpoint {
    /// 端点名称，仅用于日志
    pub name: &'static str,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for RemoteEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteEndpoint")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl RemoteEndpoint {
    /// 从带前缀的环境变量加载 (`{prefix}_IP`, `{prefix}_SSH_PORT`, ...)
    pub fn from_env(name: &'static str, prefix: &str) -> Self {
        let address = env::var(format!("{}_IP", prefix)).unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var(format!("{}_SSH_PORT", prefix))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(22);
        let username = env::var(format!("{}_USERNAME", prefix)).unwrap_or_else(|_| "root".to_string());
        let password = env::var(format!("{}_PASSWORD", prefix)).unwrap_or_else(|_| {
            warn!(endpoint = name, "{}_PASSWORD not set, using default", prefix);
            "rootroot".to_string()
        });

        Self {
            name,
            address,
            port,
            username,
            password,
        }
    }
}

/// 远端命令模板
#[derive(Clone, Debug)]
pub struct CommandTemplates {
    /// RP 命令前缀，命令被包装为 `<prefix> "<cmd>"`
    pub rp_prefix: String,
    /// Host 命令模板，`%s` 会被替换为命令
    pub host_template: String,
    pub show_software_info: String,
    pub show_commit_progress: String,
    pub show_status: String,
    pub list_partitions: String,
}

impl Default for CommandTemplates {
    fn default() -> Self {
        Self {
            rp_prefix: "nssh".to_string(),
            host_template: "ssh -q root@127.0.0.1 \"nssh '%s'\"".to_string(),
            show_software_info: "ns cluster 'ns system show software info' all-appvms".to_string(),
            show_commit_progress: "ns config show commit progress".to_string(),
            show_status: "ns cluster 'ns system show status v' all-appvms".to_string(),
            list_partitions: "ns part list".to_string(),
        }
    }
}

impl CommandTemplates {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host_template = env::var("TEST_NSSH").unwrap_or(defaults.host_template);
        if !host_template.contains("%s") {
            warn!(template = %host_template, "TEST_NSSH has no %s placeholder, commands will be ignored");
        }

        Self {
            rp_prefix: env::var("RP_NSSH").unwrap_or(defaults.rp_prefix),
            host_template,
            show_software_info: env::var("SHOW_SOFTWARE_INFO_CMD")
                .unwrap_or(defaults.show_software_info),
            show_commit_progress: env::var("SHOW_COMMIT_PROGRESS_CMD")
                .unwrap_or(defaults.show_commit_progress),
            show_status: env::var("SHOW_STATUS_CMD").unwrap_or(defaults.show_status),
            list_partitions: env::var("LIST_PARTITIONS_CMD").unwrap_or(defaults.list_partitions),
        }
    }
}

/// 上传配置
#[derive(Clone, Debug)]
pub struct UploadConfig {
    /// 允许的扩展名（不含 `.`）
    pub allowed_extensions: Vec<String>,
    /// 请求体最大字节数
    pub max_content_length: usize,
    /// 上传的配置文件在本地保存的位置
    pub config_file_path: PathBuf,
}

impl UploadConfig {
    pub fn from_env(temp_dir: &std::path::Path) -> Self {
        let allowed_extensions = env::var("ALLOWED_EXTENSIONS")
            .map(|v| parse_extensions(&v))
            .unwrap_or_else(|_| {
                constants::DEFAULT_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let max_content_length = env::var("MAX_CONTENT_LENGTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(constants::DEFAULT_MAX_CONTENT_LENGTH);

        let config_file_path = env::var("CONFIG_FILE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| temp_dir.join("config.com"));

        Self {
            allowed_extensions,
            max_content_length,
            config_file_path,
        }
    }
}

impl ConsoleConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);

        let rp = RemoteEndpoint::from_env("rp", "RP");
        let host = RemoteEndpoint::from_env("host", "HOST");
        let apply_ip = env::var("RP1_IP").unwrap_or_else(|_| rp.address.clone());

        let temp_dir = env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("sasn-console"));

        let template_dir = env::var("TEMPLATE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from);

        let session_idle_secs = env::var("SESSION_IDLE_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let connect_timeout_secs = env::var("SSH_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);

        Self {
            port,
            rp,
            host,
            apply_ip,
            commands: CommandTemplates::from_env(),
            upload: UploadConfig::from_env(&temp_dir),
            template_dir,
            temp_dir,
            session_idle_secs,
            connect_timeout_secs,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// 日志文件路径 (`LOG_FILE`)，在日志初始化前单独读取
pub fn log_file_from_env() -> Option<PathBuf> {
    env::var("LOG_FILE").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// 解析逗号分隔的扩展名列表，忽略空项和前导 `.`
fn parse_extensions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().trim_start_matches('.'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// 常量
pub mod constants {
    /// 提交进度轮询次数
    pub const COMMIT_POLL_ATTEMPTS: u32 = 3;

    /// 两次轮询之间的间隔（秒）
    pub const COMMIT_POLL_INTERVAL_SECS: u64 = 5;

    /// 提交完成标志
    pub const COMMIT_DONE_MARKER: &str = "No commit in progress";

    /// load apply 脚本在 Host 上的路径
    pub const REMOTE_SCRIPT_PATH: &str = "/tmp/loadApply";

    /// 上传的配置文件在 Host 上的路径
    pub const REMOTE_CONFIG_PATH: &str = "/tmp/config.com";

    /// 脚本权限 (rwxr--r--)
    pub const SCRIPT_MODE: &str = "744";

    /// 单事务提交命令
    pub const LOAD_APPLY_COMMAND: &str = "configure /tmp/loadApply single-app-commit";

    /// load apply 模板名称
    pub const LOAD_APPLY_TEMPLATE: &str = "loadApply";

    /// 默认允许上传的扩展名
    pub const DEFAULT_EXTENSIONS: &[&str] = &["wzd", "cfg", "conf"];

    /// 默认上传大小上限 16 MiB
    pub const DEFAULT_MAX_CONTENT_LENGTH: usize = 16 * 1024 * 1024;

    /// 会话空闲超时上限（秒），约 10 年
    pub const MAX_SESSION_IDLE_SECS: u64 = 10 * 365 * 24 * 3600;

    /// 会话清理间隔（秒）
    pub const SESSION_CLEANUP_INTERVAL_SECS: u64 = 60;

    /// 版本号
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}
