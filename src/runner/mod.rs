//! The runner: one toolchain subprocess per run, parsed into typed results.
//!
//! A run extracts embeddable code samples into a disposable temp directory,
//! spawns the toolchain over the direct inputs plus that directory, feeds the
//! merged output streams through the command's rule table, resolves every
//! report back to origin-document coordinates, and files it under the right
//! [`FileResult`]. Sample content the toolchain modified is patched back into
//! the origin documents once the run succeeds.
//!
//! The parse path is strictly sequential; only stream reading and
//! document-level file work run concurrently (see `utils::pool`). Because
//! results are only mutated from the parse path, no locking is involved.

pub mod command;
pub mod invoke;
pub mod parser;
pub mod report;
pub mod resolve;
pub mod stream;

pub use command::{BUILTIN_COMMANDS, Reporter, ToolchainCommand, builtin_command};
pub use report::{FileResult, Info, Outcome, Problem, Report, ReportCategory, ReportKind, TestStatus};
pub use resolve::LocationOffset;
pub use stream::{LineEvent, StreamSource};

use crate::samples::extract::{SampleError, extract_samples};
use crate::samples::rewrite;
use indexmap::IndexMap;
use parser::{ParseEvent, ReportParser};
use report::ReportCategory as Category;
use resolve::Resolver;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Synchronous observers invoked from the sequential parse path. They must
/// not block; partial reports are visible only through these, never through
/// the returned results.
pub trait RunHooks {
    fn on_partial(&self, _report: &Report) {}
    fn on_debug(&self, _report: &Report) {}
    fn on_fatal(&self, _message: &str) {}
}

/// Hook implementation that observes nothing.
pub struct NoHooks;

impl RunHooks for NoHooks {}

/// Options for one run.
pub struct RunOptions {
    pub command: ToolchainCommand,
    /// Toolchain binary override; defaults to the command's own.
    pub binary: Option<String>,
    /// Arguments forwarded to the executed scripts after the separator.
    pub script_args: Vec<String>,
    /// Allow a run whose effective file set is empty.
    pub permit_no_files: bool,
    /// Working directory for the toolchain process.
    pub cwd: Option<PathBuf>,
    /// Max documents in flight during extraction and write-back.
    pub concurrency: usize,
}

impl RunOptions {
    pub const DEFAULT_CONCURRENCY: usize = 8;

    pub fn new(command: ToolchainCommand) -> Self {
        Self {
            command,
            binary: None,
            script_args: Vec::new(),
            permit_no_files: false,
            cwd: None,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }
}

/// Errors that abort a run. Per-file diagnostics are never errors; they come
/// back inside `FileResult`s.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no input files matched the requested paths")]
    NoFiles,

    /// The toolchain produced output no rule recognized (or a fatal report).
    /// Unrecognized output means the structured results cannot be trusted,
    /// so none are returned.
    #[error(
        "`{binary}` produced {} unrecognized output line(s) (exit code {})\n{}",
        .unrecognized.len(),
        .exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string()),
        .unrecognized.join("\n")
    )]
    Toolchain {
        binary: String,
        args: Vec<String>,
        exit_code: Option<i32>,
        unrecognized: Vec<String>,
    },

    #[error("failed to spawn `{binary}`: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Sample(#[from] SampleError),

    #[error("i/o failure during run: {0}")]
    Io(#[from] io::Error),
}

/// Run the configured command over `files` and return one result per file.
///
/// Fails before spawning anything when the effective file set is empty and
/// `permit_no_files` is unset. A non-zero toolchain exit code by itself does
/// not fail the run; unrecognized or fatal output does.
pub fn run(files: &[String], options: &RunOptions, hooks: &dyn RunHooks) -> Result<Vec<FileResult>, RunError> {
    let command = &options.command;

    let effective: Vec<String> = files.iter().filter(|f| command.accepts(f.as_str())).cloned().collect();
    if effective.is_empty() && !options.permit_no_files {
        return Err(RunError::NoFiles);
    }

    let mut results: IndexMap<String, FileResult> = effective
        .iter()
        .map(|f| (f.clone(), FileResult::new(f.clone())))
        .collect();
    let requested: HashMap<PathBuf, String> = effective
        .iter()
        .map(|f| {
            let canonical = std::fs::canonicalize(f).unwrap_or_else(|_| PathBuf::from(f));
            (canonical, f.clone())
        })
        .collect();

    // Sample storage lives exactly as long as the run, error paths included.
    let sample_root = tempfile::Builder::new().prefix("rundown-samples-").tempdir()?;
    let extract_docs: Vec<String> = effective
        .iter()
        .filter(|f| command.should_extract(f.as_str()))
        .cloned()
        .collect();
    let samples = extract_samples(&extract_docs, sample_root.path(), options.concurrency)?;

    let direct: Vec<String> = effective
        .iter()
        .filter(|f| command.is_direct_input(f.as_str()))
        .cloned()
        .collect();
    let sample_dir = (!samples.is_empty()).then(|| sample_root.path());
    let args = invoke::build_args(command, &direct, sample_dir, &options.script_args);
    let binary = options.binary.as_deref().unwrap_or(command.default_binary);

    log::debug!("spawning `{binary}` with {args:?}");
    let mut process = invoke::spawn(binary, &args, options.cwd.as_deref()).map_err(|e| RunError::Spawn {
        binary: binary.to_string(),
        source: e,
    })?;

    let (events, readers) = stream::merge_streams(process.stdout, process.stderr);

    let resolver = Resolver::new(&samples, &command.offsets, &requested);
    let mut parse = ReportParser::new(&command.rules);
    let mut aggregator = Aggregator {
        resolver,
        reporter: command.reporter,
        hooks,
        results: &mut results,
        unrecognized: Vec::new(),
        last_file: effective.first().cloned(),
    };

    for event in events.iter() {
        for parsed in parse.feed(&event) {
            aggregator.handle(parsed);
        }
    }
    for parsed in parse.finish() {
        aggregator.handle(parsed);
    }

    for reader in readers {
        let _ = reader.join();
    }
    let status = process.child.wait()?;
    let unrecognized = aggregator.unrecognized;
    log::debug!("`{binary}` exited with {status}; {} unrecognized line(s)", unrecognized.len());

    if !unrecognized.is_empty() {
        return Err(RunError::Toolchain {
            binary: binary.to_string(),
            args,
            exit_code: status.code(),
            unrecognized,
        });
    }

    rewrite::write_back(&samples, options.concurrency)?;

    Ok(results.into_values().collect())
}

/// Files finished reports under their resolved documents. Only ever driven
/// from the sequential parse path.
struct Aggregator<'a> {
    resolver: Resolver<'a>,
    reporter: Reporter,
    hooks: &'a dyn RunHooks,
    results: &'a mut IndexMap<String, FileResult>,
    unrecognized: Vec<String>,
    /// Most recent file any finished report carried; reports without their
    /// own file (per-test results under a section header) fall back to it.
    last_file: Option<String>,
}

impl Aggregator<'_> {
    fn handle(&mut self, event: ParseEvent) {
        match event {
            ParseEvent::Unrecognized(line) => self.unrecognized.push(line),
            ParseEvent::Partial(mut pending) => {
                self.resolver.resolve(pending.kind, &mut pending.fields, &mut pending.message);
                self.hooks.on_partial(&pending.promote());
            }
            ParseEvent::Flush(mut pending) => {
                self.resolver.resolve(pending.kind, &mut pending.fields, &mut pending.message);
                let report = pending.promote();
                if !pending.done {
                    // Superseded by the terminated form of the same line.
                    self.hooks.on_partial(&report);
                    return;
                }
                if let Some(file) = pending.fields.get("file").filter(|f| !f.is_empty()) {
                    self.last_file = Some(file.clone());
                }
                match report.kind().category() {
                    Category::Fatal => {
                        self.hooks.on_fatal(report.message());
                        self.unrecognized.push(report.message().to_string());
                    }
                    Category::Debug => self.hooks.on_debug(&report),
                    Category::Problem | Category::Info => self.store(&report),
                }
            }
        }
    }

    fn store(&mut self, report: &Report) {
        let Some(file) = report.file().map(str::to_string).or_else(|| self.last_file.clone()) else {
            log::warn!("dropping {} report with no attributable file: {}", report.kind(), report.message());
            return;
        };
        for outcome in (self.reporter)(report) {
            let entry = self
                .results
                .entry(file.clone())
                .or_insert_with(|| FileResult::new(file.clone()));
            match outcome {
                Outcome::Problem(mut problem) => {
                    problem.file = file.clone();
                    entry.problems.push(problem);
                }
                Outcome::Info(mut info) => {
                    info.file = file.clone();
                    entry.infos.push(info);
                }
            }
        }
    }
}
