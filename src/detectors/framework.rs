//! detectors/framework.rs
//!
//! Target test frameworks: selection, detection from repository markers,
//! output file naming and run commands.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;

use crate::detectors::language::LanguageFamily;
use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Framework {
    #[default]
    Pytest,
    Unittest,
    Jest,
    Mocha,
}

/* ============================================================
   Public API
   ============================================================ */

/// Guess a framework from marker files at `root`.
///
/// Returns `None` when nothing is conclusive; callers fall back to
/// `Framework::default()`.
pub fn detect_framework(root: &Path) -> Option<Framework> {
    if exists(root, "pytest.ini") || exists(root, "conftest.py") {
        return Some(Framework::Pytest);
    }

    if exists(root, "package.json") {
        if let Some(fw) = package_test_runner(root) {
            return Some(fw);
        }
    }

    if exists(root, "pyproject.toml") || exists(root, "setup.py") {
        return Some(Framework::Pytest);
    }

    None
}

impl Framework {
    /// Whether a generated file for this framework can import sources of
    /// `language`. Rust sources are analyzed but never have a target.
    pub fn supports(self, language: LanguageFamily) -> bool {
        match self {
            Framework::Pytest | Framework::Unittest => language == LanguageFamily::Python,
            Framework::Jest | Framework::Mocha => matches!(
                language,
                LanguageFamily::JavaScript | LanguageFamily::TypeScript
            ),
        }
    }

    /// Conventional test file name for a source file.
    pub fn output_file_name(self, source: &Path, language: LanguageFamily) -> String {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module");

        self.file_name_for_stem(stem, language)
    }

    pub fn file_name_for_stem(self, stem: &str, language: LanguageFamily) -> String {
        let js_ext = match language {
            LanguageFamily::TypeScript => "ts",
            _ => "js",
        };

        match self {
            Framework::Pytest | Framework::Unittest => format!("test_{stem}.py"),
            Framework::Jest => format!("{stem}.test.{js_ext}"),
            Framework::Mocha => format!("{stem}.spec.{js_ext}"),
        }
    }

    pub fn is_python(self) -> bool {
        matches!(self, Framework::Pytest | Framework::Unittest)
    }

    /// Commands and hints for running the suites written to `dir` from
    /// sources of `languages`.
    pub fn recommendations(
        self,
        dir: &str,
        languages: &[LanguageFamily],
        has_async: bool,
    ) -> Vec<String> {
        let mut out = Vec::new();

        match self {
            Framework::Pytest => {
                out.push(format!("Run the suite: pytest {dir} -v"));
                if has_async {
                    out.push("Async cases need the plugin: pip install pytest-asyncio".into());
                }
            }
            Framework::Unittest => {
                out.push(format!("Run the suite: python -m unittest discover -s {dir}"));
            }
            Framework::Jest => {
                out.push(format!("Run the suite: npx jest {dir}"));
            }
            Framework::Mocha => {
                let ts = languages.contains(&LanguageFamily::TypeScript);
                let js = languages.contains(&LanguageFamily::JavaScript);
                let command = match (js, ts) {
                    (true, true) => {
                        format!("npx mocha --require ts-node/register '{dir}/**/*.spec.{{js,ts}}'")
                    }
                    (false, true) => {
                        format!("npx mocha --require ts-node/register '{dir}/**/*.spec.ts'")
                    }
                    _ => format!("npx mocha '{dir}/**/*.spec.js'"),
                };
                out.push(format!("Run the suite: {command}"));
                if ts {
                    out.push("TypeScript specs need a loader: npm install --save-dev ts-node".into());
                }
                out.push("Install assertion helpers: npm install --save-dev chai chai-as-promised".into());
            }
        }

        out
    }
}

impl FromStr for Framework {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pytest" => Ok(Framework::Pytest),
            "unittest" => Ok(Framework::Unittest),
            "jest" => Ok(Framework::Jest),
            "mocha" => Ok(Framework::Mocha),
            _ => Err(Error::UnknownFramework(s.to_string())),
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Framework::Pytest => "pytest",
            Framework::Unittest => "unittest",
            Framework::Jest => "jest",
            Framework::Mocha => "mocha",
        };
        f.write_str(s)
    }
}

/* ============================================================
   Helpers
   ============================================================ */

#[inline]
fn exists(root: &Path, file: &str) -> bool {
    root.join(file).exists()
}

fn package_test_runner(root: &Path) -> Option<Framework> {
    let contents = std::fs::read_to_string(root.join("package.json")).ok()?;

    // Cheap string scan; avoids JSON parsing cost
    if contents.contains("\"jest\"") {
        Some(Framework::Jest)
    } else if contents.contains("\"mocha\"") {
        Some(Framework::Mocha)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names_follow_framework_conventions() {
        let py = Path::new("pkg/calc.py");
        let ts = Path::new("web/cart.ts");

        assert_eq!(
            Framework::Pytest.output_file_name(py, LanguageFamily::Python),
            "test_calc.py"
        );
        assert_eq!(
            Framework::Jest.output_file_name(ts, LanguageFamily::TypeScript),
            "cart.test.ts"
        );
        assert_eq!(
            Framework::Mocha.output_file_name(Path::new("lib/util.js"), LanguageFamily::JavaScript),
            "util.spec.js"
        );
    }

    #[test]
    fn frameworks_only_target_their_own_languages() {
        assert!(Framework::Pytest.supports(LanguageFamily::Python));
        assert!(Framework::Unittest.supports(LanguageFamily::Python));
        assert!(!Framework::Pytest.supports(LanguageFamily::TypeScript));
        assert!(Framework::Jest.supports(LanguageFamily::TypeScript));
        assert!(Framework::Mocha.supports(LanguageFamily::JavaScript));
        assert!(!Framework::Jest.supports(LanguageFamily::Python));

        for fw in [Framework::Pytest, Framework::Unittest, Framework::Jest, Framework::Mocha] {
            assert!(!fw.supports(LanguageFamily::Rust));
        }
    }

    #[test]
    fn mocha_glob_follows_written_languages() {
        let js = Framework::Mocha.recommendations("out", &[LanguageFamily::JavaScript], false);
        assert_eq!(js[0], "Run the suite: npx mocha 'out/**/*.spec.js'");

        let ts = Framework::Mocha.recommendations("out", &[LanguageFamily::TypeScript], false);
        assert_eq!(
            ts[0],
            "Run the suite: npx mocha --require ts-node/register 'out/**/*.spec.ts'"
        );
        assert!(ts.iter().any(|r| r.contains("ts-node")));

        let both = Framework::Mocha.recommendations(
            "out",
            &[LanguageFamily::TypeScript, LanguageFamily::JavaScript],
            false,
        );
        assert!(both[0].ends_with("'out/**/*.spec.{js,ts}'"));
    }

    #[test]
    fn unknown_framework_fails_fast() {
        assert_eq!("Jest".parse::<Framework>().unwrap(), Framework::Jest);
        assert!(matches!(
            "nose".parse::<Framework>(),
            Err(Error::UnknownFramework(name)) if name == "nose"
        ));
    }

    #[test]
    fn detects_framework_from_markers() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_framework(dir.path()), None);

        std::fs::write(
            dir.path().join("package.json"),
            r#"{"devDependencies": {"mocha": "^10"}}"#,
        )
        .unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Mocha));

        std::fs::write(dir.path().join("conftest.py"), "").unwrap();
        assert_eq!(detect_framework(dir.path()), Some(Framework::Pytest));
    }
}
