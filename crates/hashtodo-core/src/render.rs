use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::filter::ViewCategory;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let wanted = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self {
            color: wanted && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Tab strip with the selected category in brackets.
    pub fn write_tabs<W: Write>(&self, out: &mut W, selected: ViewCategory) -> anyhow::Result<()> {
        let tabs: Vec<String> = ViewCategory::TABS
            .into_iter()
            .map(|tab| {
                if tab == selected {
                    self.paint(&format!("[{}]", tab.label()), "1;34")
                } else {
                    format!(" {} ", tab.label())
                }
            })
            .collect();
        writeln!(out, "{}", tabs.join(" "))?;
        Ok(())
    }

    /// One row per task. The last column carries the labels of the row's
    /// controls; the delete control only exists on the Completed tab.
    #[tracing::instrument(skip(self, out, tasks))]
    pub fn write_task_table<W: Write>(
        &self,
        out: &mut W,
        selected: ViewCategory,
        tasks: &[&Task],
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "Done".to_string(),
            "ID".to_string(),
            "Task".to_string(),
            "Actions".to_string(),
        ];

        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let checkbox = if task.is_checked() { "[x]" } else { "[ ]" };
            let id = self.paint(&task.id.to_string(), "33");
            let text = if task.is_completed() {
                self.paint(&task.text, "2;9")
            } else {
                task.text.clone()
            };
            let mut labels = vec![task.toggle_label()];
            if selected.allows_delete() {
                labels.push(task.delete_label());
            }
            rows.push(vec![checkbox.to_string(), id, text, labels.join("; ")]);
        }

        write_table(out, headers, rows)
    }

    pub fn write_notice<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(message, "32"))?;
        Ok(())
    }

    /// Full screen for one tab: notice banner, tab strip, rows and the
    /// actions the tab offers.
    pub fn write_view<W: Write>(
        &self,
        out: &mut W,
        selected: ViewCategory,
        tasks: &[&Task],
        notice: Option<&str>,
    ) -> anyhow::Result<()> {
        if let Some(message) = notice {
            self.write_notice(out, message)?;
        }
        self.write_tabs(out, selected)?;
        self.write_task_table(out, selected, tasks)?;

        let mut actions = Vec::new();
        if selected.accepts_new_tasks() {
            actions.push("add <text>");
        }
        actions.push("toggle <id>");
        if selected.allows_delete() {
            actions.push("delete <id>");
            actions.push("clear");
        }
        writeln!(out, "actions: {}", actions.join(", "))?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi};
    use crate::filter::ViewCategory;
    use crate::task::{Task, TaskId};

    #[test]
    fn table_marks_completed_rows_checked() {
        let open = Task::new_active(TaskId::new(1), "Buy milk".to_string());
        let mut done = Task::new_active(TaskId::new(22), "Walk dog".to_string());
        done.active = false;

        let mut out = Vec::new();
        Renderer::plain()
            .write_task_table(&mut out, ViewCategory::All, &[&open, &done])
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0].trim_end(), "Done ID Task     Actions");
        assert_eq!(
            lines[2].trim_end(),
            "[ ]  1  Buy milk Mark task \"Buy milk\" as completed"
        );
        assert_eq!(
            lines[3].trim_end(),
            "[x]  22 Walk dog Mark task \"Walk dog\" as active"
        );
    }

    #[test]
    fn completed_rows_carry_a_delete_label() {
        let mut done = Task::new_active(TaskId::new(7), "Call mom".to_string());
        done.active = false;

        let mut out = Vec::new();
        Renderer::plain()
            .write_view(&mut out, ViewCategory::Completed, &[&done], None)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Mark task \"Call mom\" as active; Delete task \"Call mom\""));

        let mut out = Vec::new();
        Renderer::plain()
            .write_view(&mut out, ViewCategory::All, &[&done], None)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("Delete task"));
    }

    #[test]
    fn view_lists_tab_specific_actions() {
        let renderer = Renderer::plain();

        let mut out = Vec::new();
        renderer
            .write_view(&mut out, ViewCategory::Completed, &[], Some("done"))
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("done\n"));
        assert!(text.contains("[Completed]"));
        assert!(text.contains("No tasks."));
        assert!(text.contains("actions: toggle <id>, delete <id>, clear"));

        let mut out = Vec::new();
        renderer
            .write_view(&mut out, ViewCategory::Active, &[], None)
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("actions: add <text>, toggle <id>\n"));
    }

    #[test]
    fn ansi_sequences_do_not_count_toward_width() {
        assert_eq!(strip_ansi("\x1b[33m42\x1b[0m"), "42");
    }
}
