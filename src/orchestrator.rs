//! orchestrator.rs
//!
//! Discovery -> extraction -> synthesis -> (optional) write -> Report.
//!
//! Single-threaded and sequential. Files are independent; only the final
//! aggregation touches shared state.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use glob::Pattern;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::SynthesisConfig;
use crate::detectors::ast;
use crate::detectors::framework::{detect_framework, Framework};
use crate::detectors::language::{LanguageFamily, SOURCE_EXTENSIONS};
use crate::error::{Error, Result};
use crate::model::{TestCategory, TestSuite};
use crate::report::{Report, SkipReason, SkippedFile, WriteFailure};
use crate::testgen::file::{sanitize, write_suite};
use crate::testgen::suite::build_suite;

/// Path substrings that mark existing test sources.
pub const EXCLUDED_SUBSTRINGS: &[&str] = &["test", "spec"];

/// Build, cache and vendor directories, matched against whole directory
/// names.
pub const EXCLUDED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "target",
    "dist",
    "build",
    ".git",
    ".venv",
    "venv",
];

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub path: PathBuf,
    pub framework: Framework,
    pub recursive: bool,
    pub output_dir: Option<PathBuf>,
    /// Treat per-file skips as fatal.
    pub strict: bool,
    /// Extra glob patterns matched against the path relative to the root.
    pub excludes: Vec<String>,
}

impl RunOptions {
    pub fn new(path: impl Into<PathBuf>, framework: Framework) -> Self {
        Self {
            path: path.into(),
            framework,
            recursive: false,
            output_dir: None,
            strict: false,
            excludes: Vec::new(),
        }
    }
}

/// Explicit choice, else repository markers, else the default.
pub fn resolve_framework(path: &Path, explicit: Option<Framework>) -> Framework {
    if let Some(fw) = explicit {
        return fw;
    }

    let root = if path.is_dir() {
        Some(path)
    } else {
        path.parent()
    };

    root.and_then(detect_framework).unwrap_or_default()
}

/* ============================================================
   Run
   ============================================================ */

pub fn run(options: &RunOptions, config: &SynthesisConfig) -> Result<Report> {
    if !options.path.exists() {
        return Err(Error::PathNotFound(options.path.clone()));
    }

    let excludes = compile_excludes(&options.excludes)?;
    let files = discover(&options.path, options.recursive, &excludes)?;
    if files.is_empty() {
        return Err(Error::NoSourceFiles(options.path.clone()));
    }

    info!(
        files = files.len(),
        framework = %options.framework,
        "analyzing source files"
    );

    let mut suites: Vec<TestSuite> = Vec::new();
    let mut skipped: Vec<SkippedFile> = Vec::new();
    let mut functions_found = 0usize;

    for file in &files {
        match analyze_file(file, options.framework, config) {
            Ok(suite) => {
                debug!(
                    path = %file.display(),
                    functions = suite.functions_analyzed,
                    tests = suite.test_cases.len(),
                    "file analyzed"
                );
                functions_found += suite.functions_analyzed;
                suites.push(suite);
            }
            Err(skip) => {
                warn!(path = %skip.path.display(), reason = %skip.reason, "skipping file");
                if options.strict {
                    let reason = match &skip.detail {
                        Some(detail) => format!("{} ({detail})", skip.reason),
                        None => skip.reason.to_string(),
                    };
                    return Err(Error::StrictSkip {
                        path: skip.path,
                        reason,
                    });
                }
                skipped.push(skip);
            }
        }
    }

    let (writable, unwritable): (Vec<&TestSuite>, Vec<&TestSuite>) = suites
        .iter()
        .partition(|s| options.framework.supports(s.language));

    let report_only: Vec<PathBuf> = unwritable
        .iter()
        .map(|s| {
            info!(
                path = %s.source_file.display(),
                language = %s.language,
                "no {} target for this language; report only",
                options.framework
            );
            s.source_file.clone()
        })
        .collect();

    let mut written = Vec::new();
    let mut write_failures = Vec::new();

    if let Some(dir) = &options.output_dir {
        let names = output_names(&options.path, &writable);

        for (suite, name) in writable.iter().zip(&names) {
            match write_suite(dir, suite, name) {
                Ok(path) => {
                    info!(path = %path.display(), tests = suite.test_cases.len(), "wrote test file");
                    written.push(path);
                }
                Err(e) => {
                    let path = dir.join(name);
                    warn!(path = %path.display(), error = %e, "failed to write test file");
                    write_failures.push(WriteFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    let mut by_category: BTreeMap<TestCategory, usize> = BTreeMap::new();
    for case in suites.iter().flat_map(|s| &s.test_cases) {
        *by_category.entry(case.category).or_default() += 1;
    }
    let tests_generated: usize = by_category.values().sum();

    let recommendations = recommendations(options, &writable, report_only.len());

    info!(
        analyzed = suites.len(),
        skipped = skipped.len(),
        tests = tests_generated,
        "run complete"
    );

    Ok(Report {
        framework: options.framework,
        generated_at: Utc::now().to_rfc3339(),
        files_discovered: files.len(),
        files_analyzed: suites.len(),
        functions_found,
        tests_generated,
        by_category,
        suites,
        skipped,
        report_only,
        written,
        write_failures,
        recommendations,
    })
}

/// Per-file pipeline. Every failure becomes a skip record.
fn analyze_file(
    path: &Path,
    framework: Framework,
    config: &SynthesisConfig,
) -> std::result::Result<TestSuite, SkippedFile> {
    let skip = |reason: SkipReason, detail: Option<String>| SkippedFile {
        path: path.to_path_buf(),
        reason,
        detail,
    };

    let family = LanguageFamily::from_path(path)
        .ok_or_else(|| skip(SkipReason::ReadError, Some("unsupported extension".into())))?;

    let source =
        fs::read_to_string(path).map_err(|e| skip(SkipReason::ReadError, Some(e.to_string())))?;

    let functions = ast::extract(&source, family, &config.inference)
        .map_err(|e| skip(SkipReason::ParseError, Some(e.to_string())))?;

    if functions.is_empty() {
        return Err(skip(SkipReason::NoFunctions, None));
    }

    let suite = build_suite(path, &source, family, framework, &functions, config);
    if suite.test_cases.is_empty() {
        return Err(skip(SkipReason::NoTestableFunctions, None));
    }

    Ok(suite)
}

/* ============================================================
   Discovery
   ============================================================ */

fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|source| Error::ExcludePattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

/// Source files under `path`, sorted. A file path is taken as-is when its
/// extension is supported.
pub fn discover(path: &Path, recursive: bool, excludes: &[Pattern]) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(if LanguageFamily::from_path(path).is_some() {
            vec![path.to_path_buf()]
        } else {
            Vec::new()
        });
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in WalkDir::new(path)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let p = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        let supported = p
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !supported {
            continue;
        }

        let rel = p.strip_prefix(path).unwrap_or(p);
        if is_excluded(rel, excludes) {
            debug!(path = %p.display(), "excluded");
            continue;
        }

        files.push(p.to_path_buf());
    }

    files.sort();
    Ok(files)
}

fn is_excluded(rel: &Path, excludes: &[Pattern]) -> bool {
    let text = rel.to_string_lossy().to_ascii_lowercase();
    if EXCLUDED_SUBSTRINGS.iter().any(|s| text.contains(s)) {
        return true;
    }

    let in_excluded_dir = rel
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .any(|c| match c {
            Component::Normal(name) => EXCLUDED_DIRS
                .iter()
                .any(|d| name.eq_ignore_ascii_case(d)),
            _ => false,
        });

    in_excluded_dir || excludes.iter().any(|p| p.matches_path(rel))
}

/* ============================================================
   Output naming
   ============================================================ */

/// One distinct file name per suite. A conventional name shared by
/// several sources is prefixed with each source's directory relative to
/// `root` (`a/util.py` -> `test_a_util.py`); a numeric suffix settles
/// anything left over.
fn output_names(root: &Path, suites: &[&TestSuite]) -> Vec<String> {
    let plain: Vec<String> = suites
        .iter()
        .map(|s| sanitize(&s.framework.output_file_name(&s.source_file, s.language)))
        .collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for name in &plain {
        *counts.entry(name.as_str()).or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(suites.len());

    for (suite, name) in suites.iter().zip(&plain) {
        let stem = if counts.get(name.as_str()).copied().unwrap_or(0) > 1 {
            qualified_stem(root, &suite.source_file)
        } else {
            suite.module_name()
        };

        let mut candidate = sanitize(&suite.framework.file_name_for_stem(&stem, suite.language));
        let mut n = 2;
        while taken.contains(&candidate) {
            candidate = sanitize(
                &suite
                    .framework
                    .file_name_for_stem(&format!("{stem}_{n}"), suite.language),
            );
            n += 1;
        }

        if candidate != *name {
            debug!(
                source = %suite.source_file.display(),
                name = %candidate,
                "output name disambiguated"
            );
        }
        taken.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// `a/b/util.py` under `root` -> `a_b_util`.
fn qualified_stem(root: &Path, source: &Path) -> String {
    let rel = source.strip_prefix(root).unwrap_or(source);

    let mut parts: Vec<String> = rel
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    parts.push(
        source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".into()),
    );

    parts.join("_")
}

/* ============================================================
   Recommendations
   ============================================================ */

/// `suites` are the ones the framework can run; `report_only` counts the
/// analyzed files it cannot.
fn recommendations(
    options: &RunOptions,
    suites: &[&TestSuite],
    report_only: usize,
) -> Vec<String> {
    let mut out = Vec::new();

    if report_only > 0 {
        out.push(format!(
            "{report_only} analyzed file(s) cannot be imported by {} tests and were reported only",
            options.framework
        ));
    }

    if suites.is_empty() {
        return out;
    }

    let has_async = suites.iter().any(|s| s.has_async());
    let mut languages: Vec<LanguageFamily> = Vec::new();
    for suite in suites {
        if !languages.contains(&suite.language) {
            languages.push(suite.language);
        }
    }

    match &options.output_dir {
        Some(dir) => {
            out.extend(options.framework.recommendations(
                &dir.display().to_string(),
                &languages,
                has_async,
            ));
        }
        None => out.push("Pass --output <dir> to write the generated test files".into()),
    }

    if suites.iter().any(|s| s.has_manual()) {
        out.push(
            "Review generated cases; complex-branching cases need hand-written assertions".into(),
        );
    }

    out
}
