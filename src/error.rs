//! error.rs
//!
//! Run-level and extraction-level error types.
//!
//! Only path-level and "nothing to do" conditions surface as `Error`.
//! Per-file problems are captured into the report as skips (see
//! `orchestrator.rs`) unless strict mode is on.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("input path does not exist: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("no supported source files found under {}", .0.display())]
    NoSourceFiles(PathBuf),

    #[error("unknown test framework `{0}` (expected one of: pytest, unittest, jest, mocha)")]
    UnknownFramework(String),

    #[error("invalid exclude pattern `{pattern}`: {source}")]
    ExcludePattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{} skipped in strict mode: {reason}", path.display())]
    StrictSkip { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Failure to build a structural model for one file.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("syntax error near line {line}")]
    Syntax { line: usize },

    #[error("{0} grammar could not be loaded")]
    Grammar(&'static str),

    #[error("parser returned no tree")]
    NoTree,

    #[error("invalid extraction pattern: {0}")]
    Pattern(String),
}
