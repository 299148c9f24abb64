//! report.rs
//!
//! Run-level report and its text / JSON / CSV renderings.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::Serialize;

use crate::detectors::framework::Framework;
use crate::error::Result;
use crate::model::{TestCategory, TestSuite};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ParseError,
    ReadError,
    NoFunctions,
    NoTestableFunctions,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::ParseError => "parse_error",
            SkipReason::ReadError => "read_error",
            SkipReason::NoFunctions => "no_functions",
            SkipReason::NoTestableFunctions => "no_testable_functions",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WriteFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub framework: Framework,
    pub generated_at: String,
    pub files_discovered: usize,
    pub files_analyzed: usize,
    pub functions_found: usize,
    pub tests_generated: usize,
    pub by_category: BTreeMap<TestCategory, usize>,
    pub suites: Vec<TestSuite>,
    pub skipped: Vec<SkippedFile>,
    /// Analyzed sources the framework cannot import; never written.
    pub report_only: Vec<PathBuf>,
    pub written: Vec<PathBuf>,
    pub write_failures: Vec<WriteFailure>,
    pub recommendations: Vec<String>,
}

/* ============================================================
   Output
   ============================================================ */

pub fn write_report<W: Write>(out: &mut W, report: &Report, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => write_text(out, report),
        OutputFormat::Json => write_json(out, report),
        OutputFormat::Csv => write_csv(out, report),
    }
}

pub fn to_json(report: &Report) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn write_json<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    writeln!(out, "{}", to_json(report)?)?;
    Ok(())
}

fn write_csv<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_writer(out);
    wtr.write_record(["function", "test", "category", "priority"])?;

    for suite in &report.suites {
        for case in &suite.test_cases {
            let function = match &case.class_name {
                Some(class) => format!("{class}.{}", case.function_name),
                None => case.function_name.clone(),
            };
            wtr.write_record([
                function,
                case.name.clone(),
                case.category.to_string(),
                case.priority.to_string(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

fn write_text<W: Write>(out: &mut W, report: &Report) -> Result<()> {
    writeln!(out, "framework: {}", report.framework)?;
    writeln!(
        out,
        "files: {} discovered, {} analyzed, {} skipped",
        report.files_discovered,
        report.files_analyzed,
        report.skipped.len()
    )?;
    writeln!(out, "functions found: {}", report.functions_found)?;
    writeln!(out, "tests generated: {}", report.tests_generated)?;

    if !report.by_category.is_empty() {
        let parts: Vec<String> = report
            .by_category
            .iter()
            .map(|(category, n)| format!("{category}={n}"))
            .collect();
        writeln!(out, "  by category: {}", parts.join(", "))?;
    }

    for suite in &report.suites {
        writeln!(out)?;
        writeln!(
            out,
            "{} ({} functions, {} tests)",
            suite.source_file.display(),
            suite.functions_analyzed,
            suite.test_cases.len()
        )?;
        for case in &suite.test_cases {
            writeln!(
                out,
                "  [{:<6}] {:<10} {}",
                case.priority,
                case.category,
                case.name
            )?;
        }
    }

    if !report.skipped.is_empty() {
        writeln!(out)?;
        writeln!(out, "skipped:")?;
        for skip in &report.skipped {
            match &skip.detail {
                Some(detail) => writeln!(out, "  {} ({}: {detail})", skip.path.display(), skip.reason)?,
                None => writeln!(out, "  {} ({})", skip.path.display(), skip.reason)?,
            }
        }
    }

    if !report.report_only.is_empty() {
        writeln!(out)?;
        writeln!(out, "report only (no {} target):", report.framework)?;
        for path in &report.report_only {
            writeln!(out, "  {}", path.display())?;
        }
    }

    if !report.written.is_empty() {
        writeln!(out)?;
        writeln!(out, "written:")?;
        for path in &report.written {
            writeln!(out, "  {}", path.display())?;
        }
    }

    if !report.write_failures.is_empty() {
        writeln!(out)?;
        writeln!(out, "write failures:")?;
        for failure in &report.write_failures {
            writeln!(out, "  {}: {}", failure.path.display(), failure.error)?;
        }
    }

    if !report.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "next steps:")?;
        for rec in &report.recommendations {
            writeln!(out, "  - {rec}")?;
        }
    }

    Ok(())
}
