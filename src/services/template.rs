//! 脚本模板渲染
//!
//! 模板中的 `{{ name }}` 占位符会被替换为参数值，渲染结果写入临时目录

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// 内置模板
const BUILTIN_TEMPLATES: &[(&str, &str)] = &[("loadApply", include_str!("../../templates/loadApply"))];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Template '{template}' has unresolved placeholder '{placeholder}'")]
    Unresolved { template: String, placeholder: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 模板渲染器
#[derive(Clone, Debug)]
pub struct TemplateRenderer {
    /// 覆盖目录，存在同名文件时优先于内置模板
    template_dir: Option<PathBuf>,
    /// 渲染输出目录
    output_dir: PathBuf,
}

impl TemplateRenderer {
    pub fn new(template_dir: Option<PathBuf>, output_dir: PathBuf) -> Self {
        Self {
            template_dir,
            output_dir,
        }
    }

    /// 渲染模板并返回文本
    pub async fn render(&self, name: &str, params: &[(&str, &str)]) -> Result<String, TemplateError> {
        let source = self.load(name).await?;
        substitute(name, &source, params)
    }

    /// 渲染模板并写入 `<output_dir>/<name>`，返回文件路径
    pub async fn render_to_file(
        &self,
        name: &str,
        params: &[(&str, &str)],
    ) -> Result<PathBuf, TemplateError> {
        let data = self.render(name, params).await?;
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let target = self.output_dir.join(name);
        tokio::fs::write(&target, data).await?;
        debug!(template = %name, target = %target.display(), "Rendered template");
        Ok(target)
    }

    async fn load(&self, name: &str) -> Result<String, TemplateError> {
        if let Some(dir) = &self.template_dir {
            let path = dir.join(name);
            if path_exists(&path).await {
                return Ok(tokio::fs::read_to_string(&path).await?);
            }
        }

        BUILTIN_TEMPLATES
            .iter()
            .find(|(builtin, _)| *builtin == name)
            .map(|(_, source)| source.to_string())
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok()
}

/// 替换 `{{ key }}` / `{{key}}` 占位符
fn substitute(name: &str, source: &str, params: &[(&str, &str)]) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| TemplateError::Unresolved {
            template: name.to_string(),
            placeholder: after.lines().next().unwrap_or_default().to_string(),
        })?;

        let key = after[..end].trim();
        let value = params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
            .ok_or_else(|| TemplateError::Unresolved {
                template: name.to_string(),
                placeholder: key.to_string(),
            })?;

        out.push_str(value);
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute() {
        let rendered = substitute("t", "a={{ a }} b={{b}}", &[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(rendered, "a=1 b=2");
    }

    #[test]
    fn test_substitute_missing_param() {
        let err = substitute("t", "x={{ missing }}", &[]).unwrap_err();
        assert!(matches!(err, TemplateError::Unresolved { placeholder, .. } if placeholder == "missing"));
    }

    #[tokio::test]
    async fn test_render_builtin_load_apply() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = TemplateRenderer::new(None, dir.path().to_path_buf());

        let path = renderer
            .render_to_file(
                "loadApply",
                &[
                    ("local_file_path", "/tmp/loadApply"),
                    ("ip", "10.1.1.1"),
                    ("command", "configure /tmp/loadApply single-app-commit"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("loadApply"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("root@10.1.1.1:/tmp/loadApply"));
        assert!(content.contains("\"configure /tmp/loadApply single-app-commit\""));
        assert!(!content.contains("{{"));
    }

    #[tokio::test]
    async fn test_template_dir_overrides_builtin() {
        let templates = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        std::fs::write(templates.path().join("loadApply"), "run {{ command }}").unwrap();

        let renderer = TemplateRenderer::new(
            Some(templates.path().to_path_buf()),
            output.path().to_path_buf(),
        );
        let rendered = renderer.render("loadApply", &[("command", "ls")]).await.unwrap();
        assert_eq!(rendered, "run ls");
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let renderer = TemplateRenderer::new(None, std::env::temp_dir());
        let err = renderer.render("nope", &[]).await.unwrap_err();
        assert!(matches!(err, TemplateError::NotFound(_)));
    }
}
