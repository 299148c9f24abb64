//! detectors/language.rs
//!
//! Language family detection from file extensions.

use std::fmt;
use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageFamily {
    Python,
    Rust,
    JavaScript,
    TypeScript,
}

/// How a family's structural model is obtained.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strategy {
    /// Full syntax tree from an in-process tree-sitter grammar.
    Grammar,
    /// Ordered regular expressions over raw text.
    Lexical,
}

/// Extensions the orchestrator will pick up while walking a directory.
pub const SOURCE_EXTENSIONS: &[&str] = &["py", "rs", "js", "jsx", "mjs", "cjs", "ts", "tsx"];

/* ============================================================
   Public API
   ============================================================ */

impl LanguageFamily {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension().and_then(|e| e.to_str())?;
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(LanguageFamily::Python),
            "rs" => Some(LanguageFamily::Rust),
            "js" | "jsx" | "mjs" | "cjs" => Some(LanguageFamily::JavaScript),
            "ts" | "tsx" => Some(LanguageFamily::TypeScript),
            _ => None,
        }
    }

    pub fn strategy(self) -> Strategy {
        match self {
            LanguageFamily::Python | LanguageFamily::Rust => Strategy::Grammar,
            LanguageFamily::JavaScript | LanguageFamily::TypeScript => Strategy::Lexical,
        }
    }

    pub fn is_python(self) -> bool {
        matches!(self, LanguageFamily::Python)
    }
}

impl fmt::Display for LanguageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LanguageFamily::Python => "python",
            LanguageFamily::Rust => "rust",
            LanguageFamily::JavaScript => "javascript",
            LanguageFamily::TypeScript => "typescript",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn families_map_to_strategies() {
        assert_eq!(
            LanguageFamily::from_path(Path::new("pkg/calc.py")),
            Some(LanguageFamily::Python)
        );
        assert_eq!(
            LanguageFamily::from_path(Path::new("web/App.TSX")),
            Some(LanguageFamily::TypeScript)
        );
        assert_eq!(LanguageFamily::from_path(Path::new("README.md")), None);

        assert_eq!(LanguageFamily::Rust.strategy(), Strategy::Grammar);
        assert_eq!(LanguageFamily::JavaScript.strategy(), Strategy::Lexical);
    }
}
