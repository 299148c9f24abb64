use std::fs;
use std::path::Path;

use tempfile::TempDir;

use testsynth::detectors::framework::Framework;
use testsynth::model::TestCategory;
use testsynth::report::SkipReason;
use testsynth::{run, Error, RunOptions, SynthesisConfig};

const CALC_PY: &str = r#"
def add(a: int, b: int) -> int:
    """Add two numbers."""
    return a + b


def _helper(x):
    return x


class Greeter:
    def __init__(self, name):
        self.name = name

    async def greet(self, name: str, loud=False):
        if loud:
            return name.upper()
        return name
"#;

const CART_TS: &str = r#"
export function total(items: number[], discount?: number): number {
  return items.reduce((a, b) => a + b, 0) - (discount ?? 0);
}

export const isEmpty = (items: string[]): boolean => items.length === 0;
"#;

fn write(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

fn options(dir: &TempDir, framework: Framework) -> RunOptions {
    RunOptions::new(dir.path(), framework)
}

#[test]
fn broken_file_is_skipped_and_run_still_succeeds() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.py", "def broken(:\n    return\n");
    write(dir.path(), "calc.py", CALC_PY);

    let report = run(&options(&dir, Framework::Pytest), &SynthesisConfig::default()).unwrap();

    assert_eq!(report.files_discovered, 2);
    assert_eq!(report.files_analyzed, 1);
    assert!(!report.suites.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].reason, SkipReason::ParseError);
    assert!(report.skipped[0].path.ends_with("broken.py"));
}

#[test]
fn strict_mode_turns_skips_into_failures() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "broken.py", "def broken(:\n");
    write(dir.path(), "calc.py", CALC_PY);

    let mut opts = options(&dir, Framework::Pytest);
    opts.strict = true;

    let err = run(&opts, &SynthesisConfig::default()).unwrap_err();
    assert!(matches!(err, Error::StrictSkip { .. }));
}

#[test]
fn python_suite_counts() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "calc.py", CALC_PY);

    let report = run(&options(&dir, Framework::Pytest), &SynthesisConfig::default()).unwrap();
    let suite = &report.suites[0];

    // add, _helper, Greeter.greet; __init__ is never extracted
    assert_eq!(report.functions_found, 3);
    assert_eq!(suite.imports, vec!["add", "Greeter"]);

    let add_cases: Vec<_> = suite
        .test_cases
        .iter()
        .filter(|c| c.function_name == "add")
        .collect();
    assert_eq!(add_cases.len(), 1 + 4 + 5);
    assert!(add_cases.iter().all(|c| c.category != TestCategory::EdgeCase));

    let greet_edges = suite
        .test_cases
        .iter()
        .filter(|c| c.function_name == "greet" && c.category == TestCategory::EdgeCase)
        .count();
    assert_eq!(greet_edges, 3);

    assert!(suite
        .test_cases
        .iter()
        .all(|c| !c.input_values.contains("self")));
    assert_eq!(report.tests_generated, suite.test_cases.len());
    assert_eq!(
        report.by_category.get(&TestCategory::HappyPath).copied(),
        Some(2)
    );
}

#[test]
fn writes_framework_named_files() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(dir.path(), "cart.ts", CART_TS);

    let mut opts = options(&dir, Framework::Jest);
    opts.output_dir = Some(out.path().join("generated"));

    let report = run(&opts, &SynthesisConfig::default()).unwrap();

    let expected = out.path().join("generated").join("cart.test.ts");
    assert_eq!(report.written, vec![expected.clone()]);
    assert!(report.write_failures.is_empty());

    let text = fs::read_to_string(expected).unwrap();
    assert!(text.contains("describe('total', () => {"));
    assert!(text.contains("describe('isEmpty', () => {"));
    assert!(text.contains("test_total_required_only"));
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("npx jest")));
}

#[test]
fn write_failures_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "calc.py", CALC_PY);

    // a regular file where the output directory should be
    let blocker = dir.path().join("blocked.txt");
    fs::write(&blocker, "").unwrap();

    let mut opts = options(&dir, Framework::Unittest);
    opts.output_dir = Some(blocker);

    let report = run(&opts, &SynthesisConfig::default()).unwrap();
    assert!(report.written.is_empty());
    assert_eq!(report.write_failures.len(), 1);
    assert_eq!(report.files_analyzed, 1);
}

#[test]
fn excluded_and_nested_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "calc.py", CALC_PY);
    write(dir.path(), "tests/test_calc.py", CALC_PY);
    write(dir.path(), "pkg/cart.ts", CART_TS);
    write(dir.path(), "gen/client.ts", CART_TS);

    let flat = run(&options(&dir, Framework::Pytest), &SynthesisConfig::default()).unwrap();
    assert_eq!(flat.files_discovered, 1);

    let mut opts = options(&dir, Framework::Pytest);
    opts.recursive = true;
    opts.excludes = vec!["gen/*".into()];
    let deep = run(&opts, &SynthesisConfig::default()).unwrap();
    assert_eq!(deep.files_discovered, 2);
}

#[test]
fn files_without_testable_functions_are_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "consts.py", "LIMIT = 10\n");
    write(dir.path(), "internal.py", "def _only_private(x):\n    return x\n");
    write(dir.path(), "calc.py", CALC_PY);

    let report = run(&options(&dir, Framework::Pytest), &SynthesisConfig::default()).unwrap();

    let reasons: Vec<_> = report.skipped.iter().map(|s| s.reason).collect();
    assert_eq!(
        reasons,
        vec![SkipReason::NoFunctions, SkipReason::NoTestableFunctions]
    );
    assert_eq!(report.files_analyzed, 1);
}

#[test]
fn missing_path_and_empty_directory_are_fatal() {
    let dir = TempDir::new().unwrap();

    let missing = RunOptions::new(dir.path().join("nope"), Framework::Pytest);
    assert!(matches!(
        run(&missing, &SynthesisConfig::default()),
        Err(Error::PathNotFound(_))
    ));

    write(dir.path(), "README.md", "# nothing here\n");
    assert!(matches!(
        run(&options(&dir, Framework::Pytest), &SynthesisConfig::default()),
        Err(Error::NoSourceFiles(_))
    ));
}

#[test]
fn single_file_input_ignores_default_excludes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "spec_helpers.py", CALC_PY);

    let opts = RunOptions::new(dir.path().join("spec_helpers.py"), Framework::Pytest);
    let report = run(&opts, &SynthesisConfig::default()).unwrap();
    assert_eq!(report.files_analyzed, 1);
}

#[test]
fn same_named_sources_get_distinct_output_files() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(dir.path(), "alpha/util.py", "def alpha(x):\n    return x\n");
    write(dir.path(), "beta/util.py", "def beta(x):\n    return x\n");

    let mut opts = options(&dir, Framework::Pytest);
    opts.recursive = true;
    opts.output_dir = Some(out.path().to_path_buf());

    let report = run(&opts, &SynthesisConfig::default()).unwrap();
    assert_eq!(
        report.written,
        vec![
            out.path().join("test_alpha_util.py"),
            out.path().join("test_beta_util.py"),
        ]
    );

    let alpha = fs::read_to_string(out.path().join("test_alpha_util.py")).unwrap();
    let beta = fs::read_to_string(out.path().join("test_beta_util.py")).unwrap();
    assert!(alpha.contains("from util import alpha"));
    assert!(beta.contains("from util import beta"));
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 2);
}

#[test]
fn sources_the_framework_cannot_import_are_reported_only() {
    let dir = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    write(dir.path(), "calc.py", CALC_PY);
    write(dir.path(), "cart.ts", CART_TS);
    write(
        dir.path(),
        "lib.rs",
        "pub fn parse_port(text: &str) -> u16 {\n    text.len() as u16\n}\n",
    );

    let mut opts = options(&dir, Framework::Pytest);
    opts.output_dir = Some(out.path().to_path_buf());

    let report = run(&opts, &SynthesisConfig::default()).unwrap();

    assert_eq!(report.files_analyzed, 3);
    assert!(report.skipped.is_empty());
    let report_only: Vec<_> = report
        .report_only
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(report_only, vec!["cart.ts", "lib.rs"]);

    assert_eq!(report.written, vec![out.path().join("test_calc.py")]);
    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 1);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("reported only")));
}

#[test]
fn build_directory_names_do_not_exclude_similar_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "distance.py", CALC_PY);
    write(dir.path(), "builder.py", CALC_PY);
    write(dir.path(), "build/gen.py", CALC_PY);

    let mut opts = options(&dir, Framework::Pytest);
    opts.recursive = true;

    let report = run(&opts, &SynthesisConfig::default()).unwrap();
    assert_eq!(report.files_discovered, 2);
}
