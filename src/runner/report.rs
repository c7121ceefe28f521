//! Typed reports produced by the output parser.
//!
//! Every recognized unit of toolchain output becomes a [`Report`], a closed
//! sum over the nine report kinds. While lines are still being accumulated the
//! parser works on a [`PendingReport`] builder; only a flush promotes it to a
//! `Report`. Finished reports are materialized into [`Problem`]s and [`Info`]s
//! and filed under a [`FileResult`].

use serde::Serialize;
use std::collections::BTreeMap;

/// Kind tag carried by every report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Error,
    Check,
    Lint,
    Diff,
    Failure,
    Test,
    Output,
    Debug,
    Fatal,
}

impl ReportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Check => "check",
            Self::Lint => "lint",
            Self::Diff => "diff",
            Self::Failure => "failure",
            Self::Test => "test",
            Self::Output => "output",
            Self::Debug => "debug",
            Self::Fatal => "fatal",
        }
    }

    /// Fixed classification used by the aggregator.
    pub fn category(self) -> ReportCategory {
        match self {
            Self::Fatal => ReportCategory::Fatal,
            Self::Error | Self::Check | Self::Lint | Self::Diff | Self::Failure => ReportCategory::Problem,
            Self::Test | Self::Output => ReportCategory::Info,
            Self::Debug => ReportCategory::Debug,
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the aggregator does with a finished report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportCategory {
    /// Fails the whole run, even though the line was recognized.
    Fatal,
    /// Materialized into `Problem`s on the resolved file.
    Problem,
    /// Materialized into `Info`s on the resolved file.
    Info,
    /// Observer hook only, never stored.
    Debug,
}

/// Outcome of a single test as printed by the test runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Ignored,
}

impl TestStatus {
    /// Parse the status token from a test result line (`ok`, `FAILED`, `ignored`).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "ok" => Some(Self::Passed),
            "FAILED" => Some(Self::Failed),
            "ignored" => Some(Self::Ignored),
            _ => None,
        }
    }

    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

/// A finished, typed unit of toolchain output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Report {
    /// Generic `error: …` diagnostic, optionally located.
    Error {
        file: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        message: String,
    },
    /// Type-checker diagnostic with its diagnostic code.
    Check {
        file: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        code: Option<String>,
        message: String,
    },
    /// Lint diagnostic with the rule that fired and an optional hint.
    Lint {
        file: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        rule: Option<String>,
        hint: Option<String>,
        message: String,
    },
    /// Formatter difference for one file.
    Diff {
        file: Option<String>,
        diff: String,
        message: String,
    },
    /// Test failure block with its accumulated stack frames.
    Failure {
        file: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        test: Option<String>,
        reason: Option<String>,
        stack: Option<String>,
        message: String,
    },
    /// Single test result line.
    Test {
        file: Option<String>,
        test: Option<String>,
        status: Option<TestStatus>,
        elapsed_ms: Option<u64>,
        message: String,
    },
    /// Captured program output attributable to a file.
    Output {
        file: Option<String>,
        line: Option<usize>,
        column: Option<usize>,
        text: String,
        message: String,
    },
    /// Recognized but inconsequential narration.
    Debug { message: String },
    /// Recognized output that must fail the run.
    Fatal { message: String },
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Self::Error { .. } => ReportKind::Error,
            Self::Check { .. } => ReportKind::Check,
            Self::Lint { .. } => ReportKind::Lint,
            Self::Diff { .. } => ReportKind::Diff,
            Self::Failure { .. } => ReportKind::Failure,
            Self::Test { .. } => ReportKind::Test,
            Self::Output { .. } => ReportKind::Output,
            Self::Debug { .. } => ReportKind::Debug,
            Self::Fatal { .. } => ReportKind::Fatal,
        }
    }

    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Error { file, .. }
            | Self::Check { file, .. }
            | Self::Lint { file, .. }
            | Self::Diff { file, .. }
            | Self::Failure { file, .. }
            | Self::Test { file, .. }
            | Self::Output { file, .. } => file.as_deref(),
            Self::Debug { .. } | Self::Fatal { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Error { message, .. }
            | Self::Check { message, .. }
            | Self::Lint { message, .. }
            | Self::Diff { message, .. }
            | Self::Failure { message, .. }
            | Self::Test { message, .. }
            | Self::Output { message, .. }
            | Self::Debug { message }
            | Self::Fatal { message } => message,
        }
    }
}

/// The parser's single piece of mutable working state: the report currently
/// being accumulated, the named state it was started in, and whether its
/// triggering line was final.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingReport {
    pub kind: ReportKind,
    pub fields: BTreeMap<String, String>,
    pub message: String,
    pub done: bool,
}

impl PendingReport {
    fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    /// Promote the accumulated fields into a typed report.
    ///
    /// Promotion is best-effort: missing or malformed fields become `None`
    /// rather than failing, since an approximately located diagnostic is
    /// still more useful than a dropped one.
    pub fn promote(&self) -> Report {
        let file = self.get("file").map(str::to_string);
        let line = self.get_usize("line");
        let column = self.get_usize("column");
        let message = self.message.clone();

        match self.kind {
            ReportKind::Error => Report::Error {
                file,
                line,
                column,
                message,
            },
            ReportKind::Check => Report::Check {
                file,
                line,
                column,
                code: self.get("code").map(str::to_string),
                message,
            },
            ReportKind::Lint => Report::Lint {
                file,
                line,
                column,
                rule: self.get("rule").map(str::to_string),
                hint: self.get("hint").map(str::to_string),
                message,
            },
            ReportKind::Diff => Report::Diff {
                file,
                diff: self.get("diff").unwrap_or_default().to_string(),
                message,
            },
            ReportKind::Failure => Report::Failure {
                file,
                line,
                column,
                test: self.get("test").map(str::to_string),
                reason: self.get("reason").map(str::to_string),
                stack: self.get("stack").map(str::to_string),
                message,
            },
            ReportKind::Test => Report::Test {
                file,
                test: self.get("test").map(str::to_string),
                status: self.get("status").and_then(TestStatus::parse),
                elapsed_ms: self.get("elapsed").and_then(|v| v.parse().ok()),
                message,
            },
            ReportKind::Output => Report::Output {
                file,
                line,
                column,
                text: self.get("text").unwrap_or_default().to_string(),
                message,
            },
            ReportKind::Debug => Report::Debug { message },
            ReportKind::Fatal => Report::Fatal { message },
        }
    }
}

/// A structured diagnostic attributable to a document. Never thrown,
/// always returned inside the document's [`FileResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Problem {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub kind: ReportKind,
    pub rule: Option<String>,
    pub message: String,
}

/// A structured non-error observation (a passing test, captured stdout).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Info {
    pub file: String,
    pub kind: ReportKind,
    pub test: Option<String>,
    pub status: Option<TestStatus>,
    pub elapsed_ms: Option<u64>,
    pub message: String,
}

/// One materialized unit produced by a command's reporter.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Problem(Problem),
    Info(Info),
}

/// All results collected for one document over a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileResult {
    pub file: String,
    pub problems: Vec<Problem>,
    pub infos: Vec<Info>,
}

impl FileResult {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            problems: Vec::new(),
            infos: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}
