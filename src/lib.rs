//! testsynth
//!
//! Source-analysis-driven test synthesis. A source file is parsed into a
//! structural model of its callables (`detectors`), each callable gets a
//! layered set of candidate test cases (`testgen::synthesize`), and the
//! cases are rendered as pytest, unittest, jest or mocha source
//! (`testgen::render`). `orchestrator::run` drives the whole pipeline over a
//! file or directory and returns a `report::Report`.

pub mod config;
pub mod detectors;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod testgen;

pub use config::SynthesisConfig;
pub use error::{Error, ExtractError, Result};
pub use orchestrator::{run, RunOptions};
pub use report::{OutputFormat, Report};
