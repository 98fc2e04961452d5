//! HTML 页面渲染
//!
//! 所有远端输出在写入页面前都经过 [`escape`]

use std::fmt::Write;

use crate::domain::{DeployStage, LoadApplyReport, SoftwareRecord};

/// HTML 转义
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// 页面骨架
fn layout(title: &str, nav: bool, body: &str) -> String {
    let nav = if nav {
        r#"<nav>
      <a href="/home/">Home</a>
      <a href="/my_console/">Console</a>
      <a href="/showstatus/">Show Status</a>
      <a href="/showsessions/">Show Sessions</a>
      <a href="/loadandapply/">Load and Apply</a>
      <a href="/logout">Log out</a>
    </nav>"#
    } else {
        ""
    };

    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>SASN Admin - {title}</title>
    <style>
      body {{ font-family: ui-sans-serif, system-ui, Helvetica, Arial; padding: 18px; max-width: 960px; margin: 0 auto; }}
      nav a {{ margin-right: 12px; }}
      pre {{ background: #0b1020; color: #e5e7eb; padding: 12px; border-radius: 8px; overflow: auto; }}
      table {{ border-collapse: collapse; }}
      td, th {{ border: 1px solid #d1d5db; padding: 6px 10px; }}
      .error {{ color: #b91c1c; }}
      .notice {{ color: #6b7280; }}
    </style>
  </head>
  <body>
    {nav}
    <h1>{title}</h1>
    {body}
  </body>
</html>"#,
        title = escape(title),
        nav = nav,
        body = body,
    )
}

/// 输出行渲染为 `<pre>` 块
fn pre_block<S: AsRef<str>>(lines: &[S]) -> String {
    let mut out = String::from("<pre>");
    for line in lines {
        out.push_str(&escape(line.as_ref()));
        out.push('\n');
    }
    out.push_str("</pre>");
    out
}

fn error_paragraph(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<p class="error">{}</p>"#, escape(e)))
        .unwrap_or_default()
}

pub fn login_page(error: Option<&str>) -> String {
    let body = format!(
        r#"{error}
    <form method="post" action="/">
      <p><label>Username <input name="username" /></label></p>
      <p><label>Password <input name="password" type="password" /></label></p>
      <p><button type="submit">Log in</button></p>
    </form>"#,
        error = error_paragraph(error),
    );
    layout("Log in", false, &body)
}

/// 首页状态展示
pub enum HomeView<'a> {
    /// 软件版本信息及扁平序列长度
    Software {
        records: &'a [SoftwareRecord],
        info_num: usize,
    },
    /// 预热尚未完成
    Connecting,
    /// 预热失败
    Error(&'a str),
}

pub fn status_page(view: HomeView<'_>) -> String {
    let body = match view {
        HomeView::Software { records, info_num } => {
            let mut rows = String::new();
            for (vm, record) in records.iter().enumerate() {
                let _ = write!(
                    rows,
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    vm,
                    escape(&record.heuristics_release),
                    escape(&record.heuristics_installed),
                    escape(&record.vpf_release),
                );
            }
            format!(
                r#"<p class="notice">{vms} SASN VM(s), {info_num} entries</p>
    <table>
      <tr><th>VM</th><th>Heuristics Release</th><th>Heuristics Installed</th><th>SASN VPF Release</th></tr>
      {rows}
    </table>"#,
                vms = records.len(),
                info_num = info_num,
                rows = rows,
            )
        }
        HomeView::Connecting => {
            r#"<p class="notice">Connection to the RP card is still being established, please refresh in a moment.</p>"#
                .to_string()
        }
        HomeView::Error(error) => error_paragraph(Some(error)),
    };
    layout("SASN Status", true, &body)
}

pub fn console_page<S: AsRef<str>>(results: &[S]) -> String {
    let output = if results.is_empty() {
        String::new()
    } else {
        pre_block(results)
    };
    let body = format!(
        r#"<form method="post" action="/my_console/">
      <input name="cmd" size="80" autofocus />
      <button type="submit">Run</button>
    </form>
    {output}"#,
        output = output,
    );
    layout("Console", true, &body)
}

pub fn show_status_page<S: AsRef<str>>(results: &[S]) -> String {
    layout("Show Status", true, &pre_block(results))
}

pub fn show_sessions_page<S: AsRef<str>>(partitions: &[S], sessions: Option<&[String]>) -> String {
    let mut options = String::new();
    for partition in partitions {
        let partition = escape(partition.as_ref().trim());
        if partition.is_empty() {
            continue;
        }
        let _ = write!(options, r#"<option value="{0}">{0}</option>"#, partition);
    }

    let sessions = sessions.map(|lines| pre_block(lines)).unwrap_or_default();
    let body = format!(
        r#"{partitions}
    <form method="post" action="/showsessions/">
      <select name="partition">{options}</select>
      <button type="submit">Show sessions</button>
    </form>
    {sessions}"#,
        partitions = pre_block(partitions),
        options = options,
        sessions = sessions,
    );
    layout("Show Sessions", true, &body)
}

/// load apply 页面结果
pub enum UploadView<'a> {
    Form,
    Invalid(&'a str),
    Applied(&'a LoadApplyReport),
}

fn stage_rows(stages: &[DeployStage]) -> String {
    let mut rows = String::new();
    for stage in stages {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape(&stage.display_name),
            stage.status.as_str(),
            stage.duration_ms.map(|ms| format!("{} ms", ms)).unwrap_or_default(),
            escape(stage.message.as_deref().unwrap_or_default()),
        );
    }
    rows
}

pub fn load_apply_page(view: UploadView<'_>) -> String {
    let result = match view {
        UploadView::Form => String::new(),
        UploadView::Invalid(message) => error_paragraph(Some(message)),
        UploadView::Applied(report) => {
            let summary = if report.succeeded() {
                r#"<p class="notice">Load and apply succeeded</p>"#.to_string()
            } else {
                error_paragraph(Some(
                    "Commit completion was not confirmed in time, please check the commit progress",
                ))
            };
            format!(
                r#"{summary}
    <table>
      <tr><th>Stage</th><th>Status</th><th>Duration</th><th>Message</th></tr>
      {rows}
    </table>"#,
                summary = summary,
                rows = stage_rows(&report.stages),
            )
        }
    };

    let body = format!(
        r#"<form method="post" action="/loadandapply/" enctype="multipart/form-data">
      <input type="file" name="file" />
      <button type="submit">Upload</button>
    </form>
    {result}"#,
        result = result,
    );
    layout("Load and Apply", true, &body)
}

/// 错误页面
pub fn error_page(title: &str, message: &str) -> String {
    layout(title, false, &error_paragraph(Some(message)))
}

pub fn unauthorized_page() -> String {
    layout(
        "Authorization Required",
        false,
        r#"<p class="error">You need to log in first.</p>
    <p><a href="/">Go to log in</a></p>"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_console_page_escapes_output() {
        let page = console_page(&["<script>alert(1)</script>"]);
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>alert"));
    }

    #[test]
    fn test_status_page_lists_records() {
        let records = vec![SoftwareRecord {
            heuristics_release: "1.2.3".to_string(),
            heuristics_installed: "pkgA pkgB".to_string(),
            vpf_release: "9.9.9".to_string(),
        }];
        let page = status_page(HomeView::Software {
            records: &records,
            info_num: 3,
        });
        assert!(page.contains("<td>1.2.3</td><td>pkgA pkgB</td><td>9.9.9</td>"));
        assert!(page.contains("1 SASN VM(s), 3 entries"));
    }

    #[test]
    fn test_show_sessions_options_skip_blank() {
        let page = show_sessions_page(&["part1", "  ", "part2"], None);
        assert!(page.contains(r#"<option value="part1">part1</option>"#));
        assert!(page.contains(r#"<option value="part2">part2</option>"#));
        assert_eq!(page.matches("<option").count(), 2);
    }
}
