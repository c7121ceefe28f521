//! rundown — a structured runner for scripting-toolchain CLIs.
//!
//! Wraps an external toolchain (type checker, formatter, linter, doc
//! generator, test runner, compiler) and converts its free-form textual
//! output into typed, per-file results. Fenced code samples inside Markdown
//! documents and documentation comments are extracted into synthetic source
//! files so the toolchain can process them as first-class inputs; every
//! diagnostic is resolved back to its origin-document location, and
//! formatter-modified samples are patched back into the source documents.
//!
//! ```no_run
//! use rundown_lib::runner::{self, NoHooks, RunOptions, builtin_command};
//!
//! let options = RunOptions::new(builtin_command("lint").expect("built-in"));
//! let results = runner::run(&["docs/guide.md".to_string()], &options, &NoHooks)?;
//! for result in &results {
//!     for problem in &result.problems {
//!         println!("{}:{}: {}", result.file, problem.line.unwrap_or(1), problem.message);
//!     }
//! }
//! # Ok::<(), runner::RunError>(())
//! ```

pub mod config;
pub mod exit_codes;
pub mod output;
pub mod runner;
pub mod samples;
pub mod utils;

pub use config::Config;
pub use runner::{
    FileResult, Info, NoHooks, Problem, Report, ReportKind, RunError, RunHooks, RunOptions, TestStatus,
    ToolchainCommand, builtin_command, run,
};
pub use samples::{CodeSample, SampleError};
