use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::Path;

use rundown_lib::config::Config;
use rundown_lib::exit_codes;
use rundown_lib::output::{OutputFormat, formatter_for};
use rundown_lib::runner::{self, NoHooks, RunOptions, builtin_command};
use rundown_lib::utils::discovery::{DiscoveryOptions, discover_files};

#[derive(Parser)]
#[command(name = "rundown", author, version, about = "Structured runner for scripting-toolchain CLIs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Type-check files and their embedded code samples
    Check(CommandArgs),
    /// Check or apply formatting, embedded code samples included
    Fmt(CommandArgs),
    /// Lint files and their embedded code samples
    Lint(CommandArgs),
    /// Generate documentation output for modules
    Doc(CommandArgs),
    /// Run tests, embedded documentation tests included
    Test(CommandArgs),
    /// Compile a standalone executable
    Compile(CommandArgs),
}

impl ToolCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::Check(_) => "check",
            Self::Fmt(_) => "fmt",
            Self::Lint(_) => "lint",
            Self::Doc(_) => "doc",
            Self::Test(_) => "test",
            Self::Compile(_) => "compile",
        }
    }

    fn args(&self) -> &CommandArgs {
        match self {
            Self::Check(args)
            | Self::Fmt(args)
            | Self::Lint(args)
            | Self::Doc(args)
            | Self::Test(args)
            | Self::Compile(args) => args,
        }
    }
}

#[derive(Args)]
struct CommandArgs {
    /// Files or directories to process. Defaults to the current directory.
    #[arg(required = false)]
    paths: Vec<String>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "concise", "json"])]
    output: String,

    /// Toolchain binary override
    #[arg(long)]
    binary: Option<String>,

    /// Allow a run whose effective file set is empty
    #[arg(long, default_value = "false")]
    permit_no_files: bool,

    /// Show detailed output
    #[arg(short, long)]
    verbose: bool,

    /// Only print problems
    #[arg(short, long)]
    quiet: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Arguments forwarded to executed scripts after `--`
    #[arg(last = true)]
    script_args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let args = cli.command.args();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    match execute(&cli.command, args) {
        Ok(had_problems) => {
            if had_problems {
                exit_codes::exit::problems_found();
            }
            exit_codes::exit::success();
        }
        Err(e) => {
            eprintln!("{}: {e:#}", "error".red().bold());
            exit_codes::exit::tool_error();
        }
    }
}

fn execute(command: &ToolCommand, args: &CommandArgs) -> anyhow::Result<bool> {
    let config = Config::load(args.config.as_deref().map(Path::new)).context("loading configuration")?;

    let toolchain = builtin_command(command.name()).context("unknown command")?;

    let paths = if args.paths.is_empty() {
        vec![".".to_string()]
    } else {
        args.paths.clone()
    };
    let discovery = DiscoveryOptions {
        include: config.discovery.include.clone(),
        exclude: config.discovery.exclude.clone(),
        respect_gitignore: config.discovery.respect_gitignore,
    };
    let files = discover_files(&paths, toolchain.extensions, &discovery).context("discovering input files")?;

    let mut options = RunOptions::new(toolchain);
    options.binary = args.binary.clone().or_else(|| config.toolchain.binary.clone());
    options.script_args = args.script_args.clone();
    options.permit_no_files = args.permit_no_files || config.run.permit_no_files;
    options.concurrency = config.run.concurrency;

    let results = runner::run(&files, &options, &NoHooks)?;

    let had_problems = results.iter().any(|r| !r.problems.is_empty());

    let format = OutputFormat::parse(&args.output).unwrap_or(OutputFormat::Text);
    let use_colors = !args.no_color && format == OutputFormat::Text;
    let rendered = formatter_for(format, use_colors).format_results(&results);
    if !rendered.is_empty() && !(args.quiet && !had_problems) {
        print!("{rendered}");
    }

    Ok(had_problems)
}
