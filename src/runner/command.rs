//! Built-in toolchain command definitions.
//!
//! Every command is pure configuration consumed by one generic engine: the
//! argument fragments the invoker assembles, the declarative rule table the
//! parser runs, the reporter that materializes finished reports, and the
//! location offsets the resolver applies to pre-stamped references. Many
//! command grammars, one engine.

use crate::runner::parser::ParserRule;
use crate::runner::report::{Info, Outcome, Problem, Report, ReportKind};
use crate::runner::resolve::LocationOffset;
use std::collections::HashMap;
use std::path::Path;

/// Extensions treated as documents rather than script inputs.
pub const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// Turns a finished report into the problems and infos it stands for.
pub type Reporter = fn(&Report) -> Vec<Outcome>;

/// Configuration for one toolchain verb.
pub struct ToolchainCommand {
    pub name: &'static str,
    /// Toolchain binary; overridable through configuration.
    pub default_binary: &'static str,
    /// Arguments every invocation starts with.
    pub common_args: Vec<&'static str>,
    /// Arguments added only when a direct script input is present.
    pub conditional_args: Vec<&'static str>,
    /// Separator placed before trailing caller-supplied script arguments.
    pub arg_separator: Option<&'static str>,
    /// Extensions this command accepts as inputs.
    pub extensions: &'static [&'static str],
    /// Extensions the toolchain handles natively; no extraction for these,
    /// the files are passed directly instead.
    pub extract_skip: &'static [&'static str],
    /// When set, extraction is limited to these extensions.
    pub extract_only: Option<&'static [&'static str]>,
    pub rules: Vec<ParserRule>,
    pub reporter: Reporter,
    /// Line/column adjustments for locations arriving as pre-stamped
    /// pseudo-references; kinds without an entry shift by zero.
    pub offsets: HashMap<ReportKind, LocationOffset>,
}

impl ToolchainCommand {
    pub fn accepts(&self, path: &str) -> bool {
        crate::utils::discovery::has_extension(Path::new(path), self.extensions)
    }

    /// A direct input that is a script file, as opposed to a document.
    pub fn is_script_file(&self, path: &str) -> bool {
        self.accepts(path) && !crate::utils::discovery::has_extension(Path::new(path), MARKDOWN_EXTENSIONS)
    }

    /// Whether samples should be extracted from this input.
    pub fn should_extract(&self, path: &str) -> bool {
        if !self.accepts(path) || crate::utils::discovery::has_extension(Path::new(path), self.extract_skip) {
            return false;
        }
        match self.extract_only {
            Some(only) => crate::utils::discovery::has_extension(Path::new(path), only),
            None => true,
        }
    }

    /// Whether this input is passed to the toolchain as-is: script files
    /// always, documents only when the toolchain handles them natively.
    pub fn is_direct_input(&self, path: &str) -> bool {
        self.is_script_file(path) || crate::utils::discovery::has_extension(Path::new(path), self.extract_skip)
    }
}

/// Names of all built-in commands, in presentation order.
pub const BUILTIN_COMMANDS: &[&str] = &["check", "fmt", "lint", "doc", "test", "compile"];

/// Look up a built-in command definition by verb.
pub fn builtin_command(name: &str) -> Option<ToolchainCommand> {
    match name {
        "check" => Some(check_command()),
        "fmt" => Some(fmt_command()),
        "lint" => Some(lint_command()),
        "doc" => Some(doc_command()),
        "test" => Some(test_command()),
        "compile" => Some(compile_command()),
        _ => None,
    }
}

const SCRIPT_AND_DOC_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "md", "markdown"];
const SCRIPT_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

fn check_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "check",
        default_binary: "deno",
        common_args: vec!["check"],
        conditional_args: vec![],
        arg_separator: None,
        extensions: SCRIPT_AND_DOC_EXTENSIONS,
        extract_skip: &[],
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^(?:Download|Check) \S+$"]).emits(ReportKind::Debug),
            ParserRule::new(&[
                r"^TS(?P<code>\d+) \[ERROR\]: .+$",
                r"^error: TS(?P<code>\d+) \[ERROR\]: .+$",
            ])
            .emits(ReportKind::Check)
            .next("check"),
            ParserRule::new(&[r"^\s+at (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"]).in_states(&["check", "error"]),
            ParserRule::new(&[r"^Found \d+ errors?\.$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: Type checking failed\.?$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Error).next("error"),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["check", "error"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

fn fmt_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "fmt",
        default_binary: "deno",
        common_args: vec!["fmt"],
        conditional_args: vec![],
        arg_separator: None,
        extensions: &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs", "md", "markdown", "json", "jsonc"],
        // The formatter understands documents and JSON natively; extraction
        // only covers doc-comment samples in script files.
        extract_skip: &["md", "markdown", "json", "jsonc"],
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^from (?P<file>.+?):$"]).emits(ReportKind::Diff).next("diff"),
            ParserRule::new(&[r"^(?P<diff>\s*\d+\s*\|\s?.*)$"])
                .in_states(&["diff"])
                .aggregate(&["diff"]),
            ParserRule::new(&[r"^error: Found \d+ not formatted files? in \d+ files?$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^Checked \d+ files?$", r"^Formatted \d+ files?$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: (?P<reason>.+?) at (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"])
                .emits(ReportKind::Error)
                .next("error"),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Error).next("error"),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["error"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

fn lint_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "lint",
        default_binary: "deno",
        common_args: vec!["lint"],
        conditional_args: vec![],
        arg_separator: None,
        extensions: SCRIPT_AND_DOC_EXTENSIONS,
        extract_skip: &[],
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^\((?P<rule>[a-z0-9-]+)\) .+$"]).emits(ReportKind::Lint).next("lint"),
            ParserRule::new(&[r"^\s+at (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"]).in_states(&["lint", "error"]),
            ParserRule::new(&[r"^\s+(?:hint|help): (?P<hint>.+)$"])
                .in_states(&["lint"])
                .aggregate(&["hint"]),
            ParserRule::new(&[r"^Checked \d+ files?$", r"^Found \d+ problems?.*$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Error).next("error"),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["lint", "error"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

fn doc_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "doc",
        default_binary: "deno",
        common_args: vec!["doc"],
        conditional_args: vec![],
        arg_separator: None,
        extensions: SCRIPT_EXTENSIONS,
        // Documentation is generated from real modules only.
        extract_skip: SCRIPT_EXTENSIONS,
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^Defined in (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"])
                .emits(ReportKind::Output)
                .next("doc"),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Error).next("error"),
            ParserRule::new(&[r"^(?P<text>.*)$"]).in_states(&["doc"]).aggregate(&["text"]),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["error"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

fn test_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "test",
        default_binary: "deno",
        common_args: vec!["test"],
        conditional_args: vec!["--allow-all"],
        arg_separator: Some("--"),
        extensions: SCRIPT_AND_DOC_EXTENSIONS,
        extract_skip: &[],
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^running (?P<count>\d+) tests? from (?P<file>.+)$"])
                .emits(ReportKind::Debug)
                .next("tests"),
            ParserRule::new(&[
                r"^test (?P<test>.+?) \.\.\.(?: (?P<status>ok|FAILED|ignored))?(?: \((?P<elapsed>\d+)m?s\))?$",
            ])
            .emits(ReportKind::Test)
            .next("tests"),
            ParserRule::new(&[r"^-+ (?:pre-test )?output -+$"]).emits(ReportKind::Output).next("output"),
            ParserRule::new(&[r"^-+ output end -+$"])
                .in_states(&["output"])
                .emits(ReportKind::Debug)
                .next("tests"),
            ParserRule::new(&[r"^(?P<text>.*)$"]).in_states(&["output"]).aggregate(&["text"]),
            ParserRule::new(&[r"^\s*ERRORS\s*$"]).emits(ReportKind::Debug).next("errors"),
            ParserRule::new(&[r"^(?P<test>.+?) => (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"])
                .in_states(&["errors", "failure"])
                .emits(ReportKind::Failure)
                .next("failure"),
            ParserRule::new(&[r"^\s*FAILURES\s*$"]).emits(ReportKind::Debug).next("failures"),
            ParserRule::new(&[r"^.+ => \S+:\d+:\d+$"]).in_states(&["failures"]).ignored(),
            ParserRule::new(&[r"^(?:ok|FAILED) \| \d+ passed \| \d+ failed.*$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: Test failed.*$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).in_states(&["failure"]),
            ParserRule::new(&[r"^\s+at (?P<stack>.+)$"]).in_states(&["failure"]).aggregate(&["stack"]),
            // Anything else prefixed `error:` outside a failure block is an
            // unrecoverable toolchain condition (module load, permissions).
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Fatal),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["failure"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

fn compile_command() -> ToolchainCommand {
    ToolchainCommand {
        name: "compile",
        default_binary: "deno",
        common_args: vec!["compile"],
        conditional_args: vec![],
        arg_separator: Some("--"),
        extensions: SCRIPT_EXTENSIONS,
        extract_skip: SCRIPT_EXTENSIONS,
        extract_only: None,
        rules: vec![
            ParserRule::new(&[r"^(?:Download|Check|Compile) \S+.*$"]).emits(ReportKind::Debug),
            ParserRule::new(&[r"^Emit (?P<file>\S+).*$"]).emits(ReportKind::Output),
            ParserRule::new(&[r"^\s+at (?P<file>\S+?):(?P<line>\d+):(?P<column>\d+)$"]).in_states(&["error"]),
            ParserRule::new(&[r"^error: (?P<reason>.+)$"]).emits(ReportKind::Error).next("error"),
            ParserRule::new(&[r"^$"]).ignored(),
            ParserRule::new(&[r"^.+$"]).in_states(&["error"]),
        ],
        reporter: default_reporter,
        offsets: HashMap::new(),
    }
}

/// Shared reporter: problem kinds become one `Problem`, info kinds one
/// `Info`. Files are filled in by the aggregator.
pub fn default_reporter(report: &Report) -> Vec<Outcome> {
    let kind = report.kind();
    match report {
        Report::Error { line, column, .. }
        | Report::Check { line, column, .. }
        | Report::Failure { line, column, .. } => vec![Outcome::Problem(Problem {
            file: String::new(),
            line: *line,
            column: *column,
            kind,
            rule: match report {
                Report::Check { code, .. } => code.as_ref().map(|c| format!("TS{c}")),
                _ => None,
            },
            message: report.message().to_string(),
        })],
        Report::Lint {
            line, column, rule, ..
        } => vec![Outcome::Problem(Problem {
            file: String::new(),
            line: *line,
            column: *column,
            kind,
            rule: rule.clone(),
            message: report.message().to_string(),
        })],
        Report::Diff { .. } => vec![Outcome::Problem(Problem {
            file: String::new(),
            line: None,
            column: None,
            kind,
            rule: None,
            message: report.message().to_string(),
        })],
        Report::Test {
            test, status, elapsed_ms, ..
        } => vec![Outcome::Info(Info {
            file: String::new(),
            kind,
            test: test.clone(),
            status: *status,
            elapsed_ms: *elapsed_ms,
            message: report.message().to_string(),
        })],
        Report::Output { .. } => vec![Outcome::Info(Info {
            file: String::new(),
            kind,
            test: None,
            status: None,
            elapsed_ms: None,
            message: report.message().to_string(),
        })],
        Report::Debug { .. } | Report::Fatal { .. } => vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::parser::{ParseEvent, ReportParser};
    use crate::runner::report::{PendingReport, TestStatus};
    use crate::runner::stream::{LineEvent, StreamSource};

    fn parse(command: &ToolchainCommand, source: StreamSource, transcript: &str) -> Vec<PendingReport> {
        let mut parser = ReportParser::new(&command.rules);
        let mut finished = Vec::new();
        for line in transcript.lines() {
            let event = LineEvent {
                source,
                text: line.to_string(),
                done: true,
            };
            for parsed in parser.feed(&event) {
                if let ParseEvent::Flush(p) = parsed
                    && p.done
                {
                    finished.push(p);
                }
            }
        }
        for parsed in parser.finish() {
            if let ParseEvent::Flush(p) = parsed
                && p.done
            {
                finished.push(p);
            }
        }
        finished
    }

    #[test]
    fn test_check_transcript() {
        let command = builtin_command("check").unwrap();
        let transcript = "\
Check file:///src/mod.ts
TS2322 [ERROR]: Type 'string' is not assignable to type 'number'.
const x: number = \"a\";
                  ^
    at file:///src/mod.ts:1:19

TS2304 [ERROR]: Cannot find name 'y'.
    at file:///src/mod.ts:3:1

Found 2 errors.
";
        let reports = parse(&command, StreamSource::Stderr, transcript);
        let checks: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Check).collect();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].fields.get("code").unwrap(), "2322");
        assert_eq!(checks[0].fields.get("file").unwrap(), "file:///src/mod.ts");
        assert_eq!(checks[0].fields.get("line").unwrap(), "1");
        assert_eq!(checks[0].fields.get("column").unwrap(), "19");
        assert!(checks[0].message.contains("not assignable"));
        assert_eq!(checks[1].fields.get("code").unwrap(), "2304");
    }

    #[test]
    fn test_lint_transcript() {
        let command = builtin_command("lint").unwrap();
        let transcript = "\
(no-unused-vars) `x` is never used
    at /src/mod.ts:2:7

    hint: If this is intentional, prefix it with an underscore like `_x`

Checked 1 file
";
        let reports = parse(&command, StreamSource::Stderr, transcript);
        let lints: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Lint).collect();
        assert_eq!(lints.len(), 1);
        assert_eq!(lints[0].fields.get("rule").unwrap(), "no-unused-vars");
        assert_eq!(lints[0].fields.get("line").unwrap(), "2");
        assert!(lints[0].fields.get("hint").unwrap().starts_with("If this is intentional"));
    }

    #[test]
    fn test_fmt_transcript_aggregates_diff() {
        let command = builtin_command("fmt").unwrap();
        let transcript = "\
from /src/a.ts:
1 | -const a=1
1 | +const a = 1;

error: Found 1 not formatted file in 1 file
";
        let reports = parse(&command, StreamSource::Stderr, transcript);
        let diffs: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Diff).collect();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].fields.get("file").unwrap(), "/src/a.ts");
        assert_eq!(diffs[0].fields.get("diff").unwrap(), "1 | -const a=1\n1 | +const a = 1;");
        assert!(reports.iter().all(|r| r.kind != ReportKind::Fatal));
    }

    #[test]
    fn test_test_transcript() {
        let command = builtin_command("test").unwrap();
        let transcript = "\
running 2 tests from ./math_test.ts
test addition ... ok (6ms)
test subtraction ... FAILED (4ms)

 ERRORS

subtraction => ./math_test.ts:8:6
error: AssertionError: Values are not equal.
    at assertEquals (https://jsr.io/@std/assert/equals.ts:29:9)
    at file:///src/math_test.ts:9:3

 FAILURES

subtraction => ./math_test.ts:8:6

FAILED | 1 passed | 1 failed (12ms)

error: Test failed
";
        let reports = parse(&command, StreamSource::Stdout, transcript);

        let tests: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Test).collect();
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].fields.get("test").unwrap(), "addition");
        assert_eq!(tests[0].fields.get("status").unwrap(), "ok");
        assert_eq!(tests[0].fields.get("elapsed").unwrap(), "6");
        match tests[1].promote() {
            Report::Test { status, .. } => assert_eq!(status, Some(TestStatus::Failed)),
            other => panic!("expected test report, got {other:?}"),
        }

        let failures: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Failure).collect();
        assert_eq!(failures.len(), 1);
        let failure = failures[0];
        assert_eq!(failure.fields.get("test").unwrap(), "subtraction");
        assert_eq!(failure.fields.get("file").unwrap(), "./math_test.ts");
        assert_eq!(failure.fields.get("line").unwrap(), "8");
        assert_eq!(failure.fields.get("reason").unwrap(), "AssertionError: Values are not equal.");
        assert!(failure.fields.get("stack").unwrap().contains("math_test.ts:9:3"));

        // `error: Test failed` is chatter, not a fatal condition.
        assert!(reports.iter().all(|r| r.kind != ReportKind::Fatal));
    }

    #[test]
    fn test_test_output_block() {
        let command = builtin_command("test").unwrap();
        let transcript = "\
running 1 test from ./log_test.ts
test logging ... ok (3ms)
------- output -------
hello from the test
second line
----- output end -----
";
        let reports = parse(&command, StreamSource::Stdout, transcript);
        let outputs: Vec<_> = reports.iter().filter(|r| r.kind == ReportKind::Output).collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].fields.get("text").unwrap(), "hello from the test\nsecond line");
    }

    #[test]
    fn test_uncaught_error_is_fatal() {
        let command = builtin_command("test").unwrap();
        let transcript = "error: Uncaught ReferenceError: boom is not defined\n";
        let reports = parse(&command, StreamSource::Stderr, transcript);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].kind, ReportKind::Fatal);
    }

    #[test]
    fn test_every_builtin_has_a_table() {
        for name in BUILTIN_COMMANDS {
            let command = builtin_command(name).unwrap();
            assert_eq!(&command.name, name);
            assert!(!command.rules.is_empty());
            assert!(!command.extensions.is_empty());
        }
        assert!(builtin_command("publish").is_none());
    }

    #[test]
    fn test_input_classification() {
        let command = builtin_command("check").unwrap();
        assert!(command.is_script_file("src/mod.ts"));
        assert!(!command.is_script_file("README.md"));
        assert!(command.should_extract("README.md"));
        assert!(command.is_direct_input("src/mod.ts"));
        assert!(!command.is_direct_input("README.md"));
        assert!(!command.accepts("notes.txt"));
    }
}
