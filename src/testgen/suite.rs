//! testgen/suite.rs
//!
//! Assembles one TestSuite per analyzed file.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::SynthesisConfig;
use crate::detectors::framework::Framework;
use crate::detectors::language::LanguageFamily;
use crate::model::{FunctionInfo, TestSuite};
use crate::testgen::synthesize::synthesize;

pub fn build_suite(
    source_file: &Path,
    source: &str,
    language: LanguageFamily,
    framework: Framework,
    functions: &[FunctionInfo],
    config: &SynthesisConfig,
) -> TestSuite {
    let test_cases: Vec<_> = functions
        .iter()
        .flat_map(|f| synthesize(f, config))
        .collect();

    // one import per top-level symbol actually exercised
    let mut imports: Vec<String> = Vec::new();
    for case in &test_cases {
        let symbol = case.class_name.as_ref().unwrap_or(&case.function_name);
        if !imports.contains(symbol) {
            imports.push(symbol.clone());
        }
    }

    let module_path = module_path(source_file);
    let setup_code = if framework.is_python() {
        python_setup(source_file)
    } else {
        String::new()
    };

    TestSuite {
        source_file: source_file.to_path_buf(),
        language,
        framework,
        source_hash: content_hash(source),
        functions_analyzed: functions.len(),
        test_cases,
        imports,
        module_path,
        setup_code,
    }
}

pub fn content_hash(source: &str) -> String {
    let mut h = Sha256::new();
    h.update(source.as_bytes());
    hex::encode(h.finalize())
}

/* ============================================================
   Helpers
   ============================================================ */

fn absolute(path: &Path) -> std::path::PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn module_path(source_file: &Path) -> String {
    let abs = absolute(source_file).with_extension("");
    abs.to_string_lossy().replace('\\', "/")
}

/// Makes the source directory importable from wherever the test lands.
fn python_setup(source_file: &Path) -> String {
    let dir = absolute(source_file)
        .parent()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|| ".".to_string());

    let quoted = serde_json::Value::from(dir).to_string();
    format!("import os\nimport sys\n\nsys.path.insert(0, os.path.abspath({quoted}))\n")
}
