//! testgen/render.rs
//!
//! TestSuite -> test source text for one framework.
//!
//! Pure formatting. Cases are grouped by owning symbol in first-seen order;
//! within a group they keep synthesis order.

use serde_json::Value;

use crate::detectors::framework::Framework;
use crate::error::Result;
use crate::model::{Assertion, TestCase, TestSuite};

/// Repeated single-character strings at least this long render as a
/// repetition expression instead of a literal.
const REPEAT_MIN: usize = 32;

/// Render by framework identifier; unknown identifiers fail fast.
pub fn render(suite: &TestSuite, framework: &str) -> Result<String> {
    let framework: Framework = framework.parse()?;
    Ok(render_with(suite, framework))
}

pub fn render_with(suite: &TestSuite, framework: Framework) -> String {
    let groups = group_cases(&suite.test_cases);

    match framework {
        Framework::Pytest => python::render(suite, &groups, python::Style::Pytest),
        Framework::Unittest => python::render(suite, &groups, python::Style::Unittest),
        Framework::Jest => js::render(suite, &groups, js::Style::Jest),
        Framework::Mocha => js::render(suite, &groups, js::Style::Mocha),
    }
}

/* ============================================================
   Grouping
   ============================================================ */

struct Group<'a> {
    class_name: Option<&'a str>,
    function_name: &'a str,
    cases: Vec<&'a TestCase>,
}

impl Group<'_> {
    fn title(&self) -> String {
        match self.class_name {
            Some(class) => format!("{class}.{}", self.function_name),
            None => self.function_name.to_string(),
        }
    }

    fn has_async(&self) -> bool {
        self.cases.iter().any(|c| c.is_async)
    }
}

fn group_cases(cases: &[TestCase]) -> Vec<Group<'_>> {
    let mut groups: Vec<Group<'_>> = Vec::new();

    for case in cases {
        let class_name = case.class_name.as_deref();
        let existing = groups
            .iter_mut()
            .find(|g| g.function_name == case.function_name && g.class_name == class_name);

        match existing {
            Some(group) => group.cases.push(case),
            None => groups.push(Group {
                class_name,
                function_name: &case.function_name,
                cases: vec![case],
            }),
        }
    }

    groups
}

fn repeated_char(s: &str) -> Option<(char, usize)> {
    let mut chars = s.chars();
    let first = chars.next()?;
    let len = s.chars().count();
    (len >= REPEAT_MIN && chars.all(|c| c == first)).then_some((first, len))
}

fn quoted(s: &str) -> String {
    Value::from(s).to_string()
}

fn pascal_case(s: &str) -> String {
    s.split(|c: char| c == '_' || c == '.' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

fn manual_note(case: &TestCase) -> Option<&str> {
    case.assertions.iter().find_map(|a| match a {
        Assertion::Manual(note) => Some(note.as_str()),
        _ => None,
    })
}

/* ============================================================
   Python (pytest / unittest)
   ============================================================ */

mod python {
    use std::fmt::Write as _;

    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(super) enum Style {
        Pytest,
        Unittest,
    }

    pub(super) fn render(suite: &TestSuite, groups: &[Group<'_>], style: Style) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# Generated by testsynth from {} (sha256 {}).",
            suite.source_file.display(),
            suite.source_hash
        );
        out.push_str("# Candidate tests: review the expectations before relying on them.\n\n");

        match style {
            Style::Pytest => out.push_str("import pytest\n"),
            Style::Unittest => out.push_str("import unittest\n"),
        }
        if !suite.setup_code.is_empty() {
            out.push_str(&suite.setup_code);
        }
        out.push('\n');

        if !suite.imports.is_empty() {
            let _ = writeln!(
                out,
                "from {} import {}",
                suite.module_name(),
                suite.imports.join(", ")
            );
        }

        for group in groups {
            out.push_str("\n\n");
            render_group(&mut out, group, style);
        }

        if style == Style::Unittest {
            out.push_str("\n\nif __name__ == \"__main__\":\n    unittest.main()\n");
        }

        out
    }

    fn render_group(out: &mut String, group: &Group<'_>, style: Style) {
        let class = format!("Test{}", pascal_case(&group.title()));

        match style {
            Style::Pytest => {
                let _ = writeln!(out, "class {class}:");
            }
            Style::Unittest if group.has_async() => {
                let _ = writeln!(out, "class {class}(unittest.IsolatedAsyncioTestCase):");
            }
            Style::Unittest => {
                let _ = writeln!(out, "class {class}(unittest.TestCase):");
            }
        }
        let _ = writeln!(out, "    \"\"\"Tests for {}.\"\"\"", group.title());

        for case in &group.cases {
            out.push('\n');
            render_case(out, group, case, style);
        }
    }

    fn render_case(out: &mut String, group: &Group<'_>, case: &TestCase, style: Style) {
        let manual = manual_note(case);

        if let Some(note) = manual {
            let marker = match style {
                Style::Pytest => "@pytest.mark.skip",
                Style::Unittest => "@unittest.skip",
            };
            let reason = quoted(&format!("manual assertion required: {note}"));
            match style {
                Style::Pytest => {
                    let _ = writeln!(out, "    {marker}(reason={reason})");
                }
                Style::Unittest => {
                    let _ = writeln!(out, "    {marker}({reason})");
                }
            }
        }
        if case.is_async && style == Style::Pytest {
            out.push_str("    @pytest.mark.asyncio\n");
        }

        let def = if case.is_async { "async def" } else { "def" };
        let _ = writeln!(out, "    {def} {}(self):", case.name);
        let _ = writeln!(out, "        \"\"\"{}\"\"\"", docstring(&case.description));

        let call = call_expr(group, case);
        let awaited = if case.is_async {
            format!("await {call}")
        } else {
            call
        };

        if let Some(note) = manual {
            let _ = writeln!(out, "        # MANUAL: {note}");
            let _ = writeln!(out, "        result = {awaited}");
            let _ = writeln!(out, "        # expected: {}", case.expected);
            return;
        }

        for assertion in &case.assertions {
            match (assertion, style) {
                (Assertion::Raises | Assertion::Rejects, Style::Pytest) => {
                    out.push_str("        with pytest.raises(Exception):\n");
                    let _ = writeln!(out, "            {awaited}");
                }
                (Assertion::Raises | Assertion::Rejects, Style::Unittest) => {
                    out.push_str("        with self.assertRaises(Exception):\n");
                    let _ = writeln!(out, "            {awaited}");
                }
                (Assertion::IsDefined | Assertion::Resolves, Style::Pytest) => {
                    let _ = writeln!(out, "        result = {awaited}");
                    out.push_str("        assert result is not None\n");
                }
                (Assertion::IsDefined | Assertion::Resolves, Style::Unittest) => {
                    let _ = writeln!(out, "        result = {awaited}");
                    out.push_str("        self.assertIsNotNone(result)\n");
                }
                (Assertion::Manual(_), _) => {}
            }
        }
    }

    fn call_expr(group: &Group<'_>, case: &TestCase) -> String {
        let args: Vec<String> = case
            .input_values
            .iter()
            .map(|(name, value)| format!("{name}={}", literal(value)))
            .collect();

        let callee = match group.class_name {
            Some(class) if case.is_static => format!("{class}.{}", group.function_name),
            Some(class) => format!("{class}().{}", group.function_name),
            None => group.function_name.to_string(),
        };

        format!("{callee}({})", args.join(", "))
    }

    fn docstring(s: &str) -> String {
        s.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
    }

    pub(super) fn literal(value: &Value) -> String {
        match value {
            Value::Null => "None".into(),
            Value::Bool(true) => "True".into(),
            Value::Bool(false) => "False".into(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => match repeated_char(s) {
                Some((c, n)) => format!("{} * {n}", quoted(&c.to_string())),
                None => quoted(s),
            },
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(literal).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Object(map) => {
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", quoted(k), literal(v)))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
        }
    }
}

/* ============================================================
   JavaScript / TypeScript (jest / mocha)
   ============================================================ */

mod js {
    use std::fmt::Write as _;

    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq)]
    pub(super) enum Style {
        Jest,
        Mocha,
    }

    pub(super) fn render(suite: &TestSuite, groups: &[Group<'_>], style: Style) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "// Generated by testsynth from {} (sha256 {}).",
            suite.source_file.display(),
            suite.source_hash
        );
        out.push_str("// Candidate tests: review the expectations before relying on them.\n\n");

        if style == Style::Mocha {
            out.push_str("const chai = require('chai');\n");
            out.push_str("const chaiAsPromised = require('chai-as-promised');\n\n");
            out.push_str("chai.use(chaiAsPromised);\n");
            out.push_str("const { expect } = chai;\n");
        }

        if !suite.imports.is_empty() {
            let _ = writeln!(
                out,
                "const {{ {} }} = require({});",
                suite.imports.join(", "),
                single_quoted(&suite.module_path)
            );
        }

        for group in groups {
            out.push('\n');
            render_group(&mut out, group, style);
        }

        out
    }

    fn render_group(out: &mut String, group: &Group<'_>, style: Style) {
        let open = match style {
            Style::Jest => "() => {",
            Style::Mocha => "function () {",
        };
        let _ = writeln!(out, "describe({}, {open}", single_quoted(&group.title()));

        for (i, case) in group.cases.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render_case(out, group, case, style);
        }

        out.push_str("});\n");
    }

    fn render_case(out: &mut String, group: &Group<'_>, case: &TestCase, style: Style) {
        let manual = manual_note(case);
        let it = if manual.is_some() { "it.skip" } else { "it" };
        let title = single_quoted(&format!("{}: {}", case.name, case.description));

        let body_open = match (style, case.is_async) {
            (Style::Jest, false) => "() => {",
            (Style::Jest, true) => "async () => {",
            (Style::Mocha, false) => "function () {",
            (Style::Mocha, true) => "async function () {",
        };
        let _ = writeln!(out, "  {it}({title}, {body_open}");

        let call = call_expr(group, case);

        if let Some(note) = manual {
            let _ = writeln!(out, "    // MANUAL: {note}");
            let awaited = if case.is_async { format!("await {call}") } else { call };
            let _ = writeln!(out, "    const result = {awaited};");
            let _ = writeln!(out, "    // expected: {}", case.expected);
            out.push_str("  });\n");
            return;
        }

        for assertion in &case.assertions {
            let line = match (assertion, style, case.is_async) {
                (Assertion::IsDefined, Style::Jest, false) => {
                    format!("const result = {call};\n    expect(result).toBeDefined();")
                }
                (Assertion::IsDefined, Style::Jest, true) => {
                    format!("const result = await {call};\n    expect(result).toBeDefined();")
                }
                (Assertion::IsDefined, Style::Mocha, false) => {
                    format!("const result = {call};\n    expect(result).to.not.be.undefined;")
                }
                (Assertion::IsDefined, Style::Mocha, true) => {
                    format!("const result = await {call};\n    expect(result).to.not.be.undefined;")
                }
                (Assertion::Raises, Style::Jest, false) => {
                    format!("expect(() => {call}).toThrow();")
                }
                (Assertion::Raises, Style::Mocha, false) => {
                    format!("expect(() => {call}).to.throw();")
                }
                // async functions reject instead of throwing synchronously
                (Assertion::Raises | Assertion::Rejects, Style::Jest, _) => {
                    format!("await expect({call}).rejects.toThrow();")
                }
                (Assertion::Raises | Assertion::Rejects, Style::Mocha, _) => {
                    format!("await expect({call}).to.be.rejected;")
                }
                (Assertion::Resolves, Style::Jest, _) => {
                    format!("await expect({call}).resolves.toBeDefined();")
                }
                (Assertion::Resolves, Style::Mocha, _) => {
                    format!("await expect({call}).to.be.fulfilled;")
                }
                (Assertion::Manual(_), _, _) => continue,
            };
            let _ = writeln!(out, "    {line}");
        }

        out.push_str("  });\n");
    }

    fn call_expr(group: &Group<'_>, case: &TestCase) -> String {
        let args: Vec<String> = case.input_values.iter().map(|(_, v)| literal(v)).collect();

        let callee = match group.class_name {
            Some(class) if case.is_static => format!("{class}.{}", group.function_name),
            Some(class) => format!("new {class}().{}", group.function_name),
            None => group.function_name.to_string(),
        };

        format!("{callee}({})", args.join(", "))
    }

    fn single_quoted(s: &str) -> String {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('\'', "\\'")
            .replace('\n', "\\n");
        format!("'{escaped}'")
    }

    pub(super) fn literal(value: &Value) -> String {
        match value {
            Value::Null => "null".into(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => match repeated_char(s) {
                Some((c, n)) => format!("{}.repeat({n})", single_quoted(&c.to_string())),
                None => single_quoted(s),
            },
            Value::Array(items) => {
                let inner: Vec<String> = items.iter().map(literal).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Object(map) => {
                if map.is_empty() {
                    return "{}".into();
                }
                let inner: Vec<String> = map
                    .iter()
                    .map(|(k, v)| format!("{}: {}", single_quoted(k), literal(v)))
                    .collect();
                format!("{{ {} }}", inner.join(", "))
            }
        }
    }
}
