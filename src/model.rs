//! model.rs
//!
//! Shared data model: the structural model produced by extraction and the
//! test cases / suites produced by synthesis.
//!
//! Everything here is built once and never mutated afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::detectors::framework::Framework;
use crate::detectors::language::LanguageFamily;

/// Names treated as the implicit receiver of a method.
pub const RECEIVER_NAMES: &[&str] = &["self", "cls", "this"];

/* ============================================================
   Structural model
   ============================================================ */

/// Coarse semantic category used for heuristic reasoning.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Function,
    Any,
}

impl SemanticType {
    pub const ALL: [SemanticType; 7] = [
        SemanticType::String,
        SemanticType::Number,
        SemanticType::Boolean,
        SemanticType::Array,
        SemanticType::Object,
        SemanticType::Function,
        SemanticType::Any,
    ];
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SemanticType::String => "string",
            SemanticType::Number => "number",
            SemanticType::Boolean => "boolean",
            SemanticType::Array => "array",
            SemanticType::Object => "object",
            SemanticType::Function => "function",
            SemanticType::Any => "any",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub type_hint: SemanticType,
    pub default_value: Option<String>,
    pub is_optional: bool,
}

impl Parameter {
    pub fn is_receiver(&self) -> bool {
        RECEIVER_NAMES.contains(&self.name.as_str())
    }
}

/// One discovered callable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionInfo {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub return_type: SemanticType,
    pub is_async: bool,
    pub is_method: bool,
    /// Invoked on the class itself rather than an instance.
    pub is_static: bool,
    pub class_name: Option<String>,
    pub docstring: Option<String>,
    pub line_number: usize,
    /// Always >= 1.
    pub complexity: u32,
    pub dependencies: BTreeSet<String>,
}

impl FunctionInfo {
    /// Parameters that receive generated input values.
    pub fn input_parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(|p| !p.is_receiver())
    }

    pub fn has_optional_parameters(&self) -> bool {
        self.input_parameters().any(|p| p.is_optional)
    }

    /// `_helper` is private by convention, `__call__` is not.
    pub fn is_private(&self) -> bool {
        let dunder = self.name.len() > 4
            && self.name.starts_with("__")
            && self.name.ends_with("__");
        self.name.starts_with('_') && !dunder
    }
}

/* ============================================================
   Synthesized test cases
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    HappyPath,
    Error,
    Boundary,
    EdgeCase,
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestCategory::HappyPath => "happy_path",
            TestCategory::Error => "error",
            TestCategory::Boundary => "boundary",
            TestCategory::EdgeCase => "edge_case",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        };
        f.pad(s)
    }
}

/// Abstract assertion; each framework renders its own idiom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "note", rename_all = "snake_case")]
pub enum Assertion {
    IsDefined,
    Raises,
    Resolves,
    Rejects,
    Manual(String),
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::IsDefined => f.write_str("result is defined"),
            Assertion::Raises => f.write_str("call raises"),
            Assertion::Resolves => f.write_str("promise resolves"),
            Assertion::Rejects => f.write_str("promise rejects"),
            Assertion::Manual(note) => write!(f, "manual: {note}"),
        }
    }
}

/// Ordered parameter name -> literal mapping, in declaration order.
///
/// Serialized as a JSON object; order is kept so positional call sites
/// line up with the signature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputValues(Vec<(String, Value)>);

impl InputValues {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.0.push((name.into(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Serialize for InputValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCase {
    pub name: String,
    /// Back-reference to `FunctionInfo::name`.
    pub function_name: String,
    pub class_name: Option<String>,
    pub is_static: bool,
    pub is_async: bool,
    pub category: TestCategory,
    pub description: String,
    pub input_values: InputValues,
    pub expected: String,
    pub assertions: Vec<Assertion>,
    pub priority: Priority,
}

/// All cases generated for one analyzed source file.
#[derive(Debug, Clone, Serialize)]
pub struct TestSuite {
    pub source_file: PathBuf,
    pub language: LanguageFamily,
    pub framework: Framework,
    pub source_hash: String,
    pub functions_analyzed: usize,
    pub test_cases: Vec<TestCase>,
    /// Top-level symbols the rendered file must import.
    pub imports: Vec<String>,
    /// Path-style module specifier, extension stripped.
    pub module_path: String,
    pub setup_code: String,
}

impl TestSuite {
    pub fn count(&self, category: TestCategory) -> usize {
        self.test_cases
            .iter()
            .filter(|c| c.category == category)
            .count()
    }

    pub fn has_async(&self) -> bool {
        self.test_cases.iter().any(|c| c.is_async)
    }

    pub fn has_manual(&self) -> bool {
        self.test_cases
            .iter()
            .any(|c| c.assertions.iter().any(|a| matches!(a, Assertion::Manual(_))))
    }

    /// Module stem used by import statements (`calc` for `src/calc.py`).
    pub fn module_name(&self) -> String {
        self.source_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("module")
            .to_string()
    }
}
