//! SASN VM 软件版本信息
//!
//! 从 "show software info" 的输出中提取 heuristics / sasn-vpf 版本

use serde::Serialize;
use tracing::warn;

/// heuristics 行的标记
pub const HEURISTICS_MARKER: &str = "heuristics";
/// sasn-vpf 行的标记
pub const VPF_MARKER: &str = "sasn-vpf";

/// 扁平化的软件信息序列
///
/// 按输出行顺序排列，每三个元素对应一个 SASN VM：
/// `[heuristics_release, heuristics_installed, vpf_release, ...]`
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SoftwareInfo(Vec<String>);

/// 单个 VM 的软件版本记录
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SoftwareRecord {
    pub heuristics_release: String,
    pub heuristics_installed: String,
    pub vpf_release: String,
}

/// 标记 token 之后那个 token 的下标
fn release_index(tokens: &[&str], marker: &str) -> Option<usize> {
    let idx = tokens.iter().position(|t| t.contains(marker))? + 1;
    (idx < tokens.len()).then_some(idx)
}

impl SoftwareInfo {
    /// 解析命令输出
    ///
    /// 版本号取标记所在 token 之后的第一个 token（标准输出中即第 3 个 token）。
    /// `heuristics` 行额外追加其后剩余 token 的拼接；`sasn-vpf` 行只追加版本号。
    /// 其它行忽略。
    pub fn parse<S: AsRef<str>>(lines: &[S]) -> Self {
        let mut entries = Vec::new();

        for line in lines {
            let line = line.as_ref();
            let tokens: Vec<&str> = line.split_whitespace().collect();

            if line.contains(HEURISTICS_MARKER) {
                match release_index(&tokens, HEURISTICS_MARKER) {
                    Some(idx) => {
                        entries.push(tokens[idx].to_string());
                        entries.push(tokens[idx + 1..].join(" "));
                    }
                    None => warn!(line = %line.trim_end(), "Malformed heuristics line, skipped"),
                }
            }

            if line.contains(VPF_MARKER) {
                match release_index(&tokens, VPF_MARKER) {
                    Some(idx) => entries.push(tokens[idx].to_string()),
                    None => warn!(line = %line.trim_end(), "Malformed sasn-vpf line, skipped"),
                }
            }
        }

        Self(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// 按三元组分组，尾部不完整的部分被丢弃
    pub fn records(&self) -> Vec<SoftwareRecord> {
        self.0
            .chunks_exact(3)
            .map(|chunk| SoftwareRecord {
                heuristics_release: chunk[0].clone(),
                heuristics_installed: chunk[1].clone(),
                vpf_release: chunk[2].clone(),
            })
            .collect()
    }
}
