//! 远端命令格式化
//!
//! RP 卡与 Host 的命令包装方式不同，这里只做纯字符串变换

/// 转义后的单引号
const ESCAPED_SINGLE_QUOTE: &str = "\\'";

/// RP 卡命令: `<prefix> "<cmd>"`
pub fn rp_command(prefix: &str, cmd: &str) -> String {
    format!("{} \"{}\"", prefix, cmd)
}

/// Host 命令：转义引号后代入模板中的 `%s`
///
/// 含双引号时只替换双引号；否则替换单引号。
/// 同时含两种引号的命令只有双引号会被替换。
pub fn host_command(template: &str, cmd: &str) -> String {
    let escaped = if cmd.contains('"') {
        cmd.replace('"', ESCAPED_SINGLE_QUOTE)
    } else if cmd.contains('\'') {
        cmd.replace('\'', ESCAPED_SINGLE_QUOTE)
    } else {
        cmd.to_string()
    };
    template.replacen("%s", &escaped, 1)
}

/// 切换到指定分区并列出 relay 会话
pub fn show_sessions_command(partition: &str) -> String {
    format!(
        "ns part set {};ns config scm plugin relay show session all",
        partition
    )
}
