//! Output formatting for run results.
//!
//! Three formats: human-readable text with colors, a concise
//! `file:line:col: [kind] message` form for editors, and JSON for machine
//! consumers.

use crate::runner::report::{FileResult, Problem};
use colored::Colorize;

/// Available output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format with colors
    Text,
    /// Concise format: file:line:col: [kind] message
    Concise,
    /// JSON dump of every FileResult
    Json,
}

impl OutputFormat {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "concise" => Some(Self::Concise),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Trait for output formatters
pub trait OutputFormatter {
    fn format_results(&self, results: &[FileResult]) -> String;
}

pub fn formatter_for(format: OutputFormat, use_colors: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter { use_colors }),
        OutputFormat::Concise => Box::new(ConciseFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

struct TextFormatter {
    use_colors: bool,
}

impl OutputFormatter for TextFormatter {
    fn format_results(&self, results: &[FileResult]) -> String {
        let mut out = String::new();
        for result in results {
            if result.problems.is_empty() && result.infos.is_empty() {
                let line = format!("✓ {} is clean", result.file);
                out.push_str(&if self.use_colors { line.green().to_string() } else { line });
                out.push('\n');
                continue;
            }
            for problem in &result.problems {
                out.push_str(&self.format_problem(&result.file, problem));
                out.push('\n');
            }
            for info in &result.infos {
                let header = match (&info.test, info.status) {
                    (Some(test), Some(status)) => {
                        format!("{}: test {} {:?}", result.file, test, status)
                    }
                    _ => format!("{}: {}", result.file, info.kind),
                };
                out.push_str(&header);
                out.push('\n');
            }
        }
        out
    }
}

impl TextFormatter {
    fn format_problem(&self, file: &str, problem: &Problem) -> String {
        let location = match (problem.line, problem.column) {
            (Some(line), Some(column)) => format!("{file}:{line}:{column}"),
            (Some(line), None) => format!("{file}:{line}"),
            _ => file.to_string(),
        };
        let kind = format!("[{}]", problem.rule.as_deref().unwrap_or(problem.kind.as_str()));
        let first_line = problem.message.lines().next().unwrap_or(&problem.message);
        if self.use_colors {
            format!("{}: {} {}", location.cyan(), kind.red().bold(), first_line)
        } else {
            format!("{location}: {kind} {first_line}")
        }
    }
}

/// Concise formatter: file:line:col: [kind] message
struct ConciseFormatter;

impl OutputFormatter for ConciseFormatter {
    fn format_results(&self, results: &[FileResult]) -> String {
        let mut out = String::new();
        for result in results {
            for problem in &result.problems {
                let first_line = problem.message.lines().next().unwrap_or(&problem.message);
                out.push_str(&format!(
                    "{}:{}:{}: [{}] {}\n",
                    result.file,
                    problem.line.unwrap_or(1),
                    problem.column.unwrap_or(1),
                    problem.rule.as_deref().unwrap_or(problem.kind.as_str()),
                    first_line
                ));
            }
        }
        out
    }
}

struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_results(&self, results: &[FileResult]) -> String {
        serde_json::to_string_pretty(results).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
    }
}
