//! 控制台会话记录

use serde::Serialize;

/// 分隔线宽度
const SEPARATOR_WIDTH: usize = 40;

/// 命令控制台的累计输出
///
/// 每条命令追加 `====`、`In[n]:`、命令、`Out[n]:` 和输出行
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConsoleTranscript {
    lines: Vec<String>,
    command_number: u32,
}

impl ConsoleTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次命令执行
    pub fn record<S: Into<String>>(&mut self, command: &str, output: impl IntoIterator<Item = S>) {
        let n = self.command_number;
        self.lines.push("=".repeat(SEPARATOR_WIDTH));
        self.lines.push(format!("In[{}]: ", n));
        self.lines.push(command.to_string());
        self.lines.push(format!("Out[{}]: ", n));
        self.lines.extend(output.into_iter().map(Into::into));
        self.command_number += 1;
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn command_number(&self) -> u32 {
        self.command_number
    }
}
