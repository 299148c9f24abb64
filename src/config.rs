//! config.rs
//!
//! Data-driven synthesis tables and the optional TOML config file.
//!
//! The file lives at `<config_dir>/testsynth/config.toml` unless a path is
//! given explicitly. A missing file is fine; a malformed one is fatal.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::detectors::infer::{TypeInference, TypePattern};
use crate::error::{Error, Result};
use crate::model::SemanticType;

pub const DEFAULT_COMPLEXITY_THRESHOLD: u32 = 5;
pub const DEFAULT_MAX_BOUNDARY_CASES: usize = 5;

/// One labelled boundary literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub label: String,
    pub value: Value,
}

impl Probe {
    pub fn new(label: &str, value: Value) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    pub valid_values: BTreeMap<SemanticType, Value>,
    pub mismatch_values: BTreeMap<SemanticType, Value>,
    pub boundary_probes: BTreeMap<SemanticType, Vec<Probe>>,
    /// Functions above this get a manual "complex branching" case.
    pub complexity_threshold: u32,
    pub max_boundary_cases: usize,
    pub inference: TypeInference,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        use SemanticType as T;

        let valid_values = BTreeMap::from([
            (T::String, json!("test_value")),
            (T::Number, json!(42)),
            (T::Boolean, json!(true)),
            (T::Array, json!([1, 2, 3])),
            (T::Object, json!({"key": "value"})),
            (T::Function, json!("test_input")),
            (T::Any, json!("test_input")),
        ]);

        let mismatch_values = BTreeMap::from([
            (T::String, json!(42)),
            (T::Number, json!("not_a_number")),
            (T::Array, json!({"key": "value"})),
            (T::Object, json!([1, 2, 3])),
            (T::Boolean, json!("true")),
        ]);

        let boundary_probes = BTreeMap::from([
            (
                T::String,
                vec![
                    Probe::new("empty", json!("")),
                    Probe::new("single_char", json!("a")),
                    Probe::new("long", json!("a".repeat(1000))),
                    Probe::new("special_chars", json!("!@#$%^&*()")),
                    Probe::new("whitespace", json!("   ")),
                ],
            ),
            (
                T::Number,
                vec![
                    Probe::new("zero", json!(0)),
                    Probe::new("one", json!(1)),
                    Probe::new("negative_one", json!(-1)),
                    Probe::new("max_safe", json!(9_007_199_254_740_991_i64)),
                    Probe::new("min_safe", json!(-9_007_199_254_740_991_i64)),
                ],
            ),
            (
                T::Array,
                vec![
                    Probe::new("empty", json!([])),
                    Probe::new("single", json!([1])),
                    Probe::new("large", Value::from((0..100).collect::<Vec<i64>>())),
                ],
            ),
        ]);

        Self {
            valid_values,
            mismatch_values,
            boundary_probes,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            max_boundary_cases: DEFAULT_MAX_BOUNDARY_CASES,
            inference: TypeInference::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn valid_value(&self, ty: SemanticType) -> Value {
        self.valid_values
            .get(&ty)
            .or_else(|| self.valid_values.get(&SemanticType::Any))
            .cloned()
            .unwrap_or_else(|| json!("test_input"))
    }

    pub fn mismatch_value(&self, ty: SemanticType) -> Option<&Value> {
        self.mismatch_values.get(&ty)
    }

    pub fn probes(&self, ty: SemanticType) -> &[Probe] {
        self.boundary_probes
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Layer a parsed config file over the defaults.
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(t) = file.complexity_threshold {
            self.complexity_threshold = t;
        }
        if let Some(m) = file.max_boundary_cases {
            self.max_boundary_cases = m;
        }
        if !file.type_patterns.is_empty() {
            self.inference = self.inference.clone().with_overrides(file.type_patterns);
        }

        for entry in file.valid {
            self.valid_values.insert(entry.ty, entry.value);
        }
        for entry in file.mismatch {
            self.mismatch_values.insert(entry.ty, entry.value);
        }

        // entries for a type replace that type's default list
        let mut replaced: BTreeMap<SemanticType, Vec<Probe>> = BTreeMap::new();
        for entry in file.boundary {
            replaced
                .entry(entry.ty)
                .or_default()
                .push(Probe::new(&entry.label, entry.value));
        }
        self.boundary_probes.extend(replaced);
    }
}

/* ============================================================
   Config file
   ============================================================ */

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub complexity_threshold: Option<u32>,
    pub max_boundary_cases: Option<usize>,
    #[serde(default)]
    pub type_patterns: Vec<TypePattern>,
    #[serde(default)]
    pub valid: Vec<ValueEntry>,
    #[serde(default)]
    pub mismatch: Vec<ValueEntry>,
    #[serde(default)]
    pub boundary: Vec<ProbeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ValueEntry {
    #[serde(rename = "type")]
    pub ty: SemanticType,
    pub value: Value,
}

#[derive(Debug, Deserialize)]
pub struct ProbeEntry {
    #[serde(rename = "type")]
    pub ty: SemanticType,
    pub label: String,
    pub value: Value,
}

pub fn default_config_path() -> PathBuf {
    let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.push("testsynth");
    dir.push("config.toml");
    dir
}

/// Defaults, overlaid with the config file when one exists.
pub fn load(explicit: Option<&Path>) -> Result<SynthesisConfig> {
    let mut config = SynthesisConfig::default();

    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if explicit.is_none() && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(config);
        }
        Err(e) => return Err(Error::Io(e)),
    };

    let file: ConfigFile =
        toml::from_str(&raw).map_err(|source| Error::Config { path: path.clone(), source })?;

    debug!(path = %path.display(), "loaded config file");
    config.apply(file);
    Ok(config)
}
