// src/testgen/file.rs

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::model::TestSuite;
use crate::testgen::render::render_with;

/* ============================================================
   Public API
   ============================================================ */

/// Render `suite` and write it to `output_dir/file_name`. Existing files
/// are overwritten.
pub fn write_suite(output_dir: &Path, suite: &TestSuite, file_name: &str) -> io::Result<PathBuf> {
    let path = output_dir.join(sanitize(file_name));

    let text = render_with(suite, suite.framework);

    ensure_parent_dir(&path)?;
    fs::write(&path, text)?;
    Ok(path)
}

/* ============================================================
   Helpers
   ============================================================ */

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Replace anything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.replace(
        |c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '.' && c != '-',
        "_",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SynthesisConfig;
    use crate::detectors::framework::Framework;
    use crate::detectors::language::LanguageFamily;
    use crate::testgen::suite::build_suite;

    #[test]
    fn writes_into_nested_output_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("generated").join("tests");

        let suite = build_suite(
            Path::new("src/my calc.ts"),
            "",
            LanguageFamily::TypeScript,
            Framework::Jest,
            &[],
            &SynthesisConfig::default(),
        );

        let name = suite
            .framework
            .output_file_name(&suite.source_file, suite.language);
        let path = write_suite(&out, &suite, &name).unwrap();
        assert_eq!(path, out.join("my_calc.test.ts"));

        fs::write(&path, "stale").unwrap();
        write_suite(&out, &suite, &name).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("// Generated by testsynth"));
    }
}
