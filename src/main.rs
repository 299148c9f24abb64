use std::error::Error as _;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use testsynth::config;
use testsynth::detectors::framework::Framework;
use testsynth::orchestrator::{self, RunOptions};
use testsynth::report::{self, OutputFormat};
use testsynth::Result;

#[derive(Parser, Debug)]
#[command(
    name = "testsynth",
    version,
    about = "Analyze source files and synthesize candidate test suites (pytest, unittest, jest, mocha)."
)]
struct Cli {
    /// Source file or directory to analyze
    path: PathBuf,

    #[arg(short, long, value_enum, help = "Target test framework (detected from the repo when omitted)")]
    framework: Option<Framework>,

    #[arg(short, long, default_value_t = false, help = "Include subdirectories")]
    recursive: bool,

    #[arg(short, long, help = "Write generated test files into this directory")]
    output: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Report format")]
    format: OutputFormat,

    #[arg(long, help = "Config file (default: <config dir>/testsynth/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Complexity above which a manual branching case is added")]
    complexity_threshold: Option<u32>,

    #[arg(long, help = "Cap on boundary cases per function")]
    max_boundary_cases: Option<usize>,

    #[arg(long = "exclude", value_name = "GLOB", help = "Extra exclude pattern (repeatable)")]
    excludes: Vec<String>,

    #[arg(long, default_value_t = false, help = "Fail the run on any skipped file")]
    strict: bool,

    #[arg(long, help = "Also write the JSON report to this file")]
    output_json: Option<PathBuf>,

    #[arg(short, long, default_value_t = false, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, default_value_t = false)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.verbose {
                eprintln!("error: {err:#?}");
                let mut source = err.source();
                while let Some(cause) = source {
                    eprintln!("  caused by: {cause}");
                    source = cause.source();
                }
                eprintln!("{}", std::backtrace::Backtrace::force_capture());
            } else {
                eprintln!("error: {err}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: &Cli) -> Result<()> {
    let mut synthesis = config::load(cli.config.as_deref())?;
    if let Some(t) = cli.complexity_threshold {
        synthesis.complexity_threshold = t;
    }
    if let Some(m) = cli.max_boundary_cases {
        synthesis.max_boundary_cases = m;
    }

    let options = RunOptions {
        path: cli.path.clone(),
        framework: orchestrator::resolve_framework(&cli.path, cli.framework),
        recursive: cli.recursive,
        output_dir: cli.output.clone(),
        strict: cli.strict,
        excludes: cli.excludes.clone(),
    };

    let report = orchestrator::run(&options, &synthesis)?;

    if let Some(path) = &cli.output_json {
        fs::write(path, report::to_json(&report)?)?;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    report::write_report(&mut out, &report, cli.format)?;
    out.flush()?;

    Ok(())
}
