//! detectors/infer.rs
//!
//! Semantic type resolution.
//!
//! Explicit annotations are resolved first (`resolve_annotation`). When there
//! is none, or it is not understood, the identifier itself is matched against
//! an ordered pattern table (`TypeInference::infer`). Unmatched input always
//! degrades to `SemanticType::Any`.

use serde::{Deserialize, Serialize};

use crate::model::SemanticType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Prefix,
    Suffix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypePattern {
    pub pattern: String,
    #[serde(rename = "match")]
    pub kind: MatchKind,
    #[serde(rename = "type")]
    pub ty: SemanticType,
}

impl TypePattern {
    pub fn new(pattern: &str, kind: MatchKind, ty: SemanticType) -> Self {
        Self {
            pattern: pattern.to_ascii_lowercase(),
            kind,
            ty,
        }
    }

    fn matches(&self, ident: &str) -> bool {
        let p = self.pattern.as_str();
        match self.kind {
            MatchKind::Exact => ident == p,
            MatchKind::Prefix => ident.starts_with(p),
            MatchKind::Suffix => ident.ends_with(p),
            MatchKind::Contains => ident.contains(p),
        }
    }
}

/// Ordered, overridable name -> type lookup. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInference {
    patterns: Vec<TypePattern>,
}

impl Default for TypeInference {
    fn default() -> Self {
        use MatchKind::*;
        use SemanticType as T;

        let table: &[(&str, MatchKind, SemanticType)] = &[
            ("is_", Prefix, T::Boolean),
            ("has_", Prefix, T::Boolean),
            ("can_", Prefix, T::Boolean),
            ("should_", Prefix, T::Boolean),
            ("enabled", Contains, T::Boolean),
            ("disabled", Contains, T::Boolean),
            ("flag", Contains, T::Boolean),
            ("callback", Contains, T::Function),
            ("handler", Contains, T::Function),
            ("fn", Exact, T::Function),
            ("func", Exact, T::Function),
            ("_fn", Suffix, T::Function),
            ("on_", Prefix, T::Function),
            ("count", Contains, T::Number),
            ("index", Contains, T::Number),
            ("size", Contains, T::Number),
            ("amount", Contains, T::Number),
            ("total", Contains, T::Number),
            ("limit", Contains, T::Number),
            ("offset", Contains, T::Number),
            ("timeout", Contains, T::Number),
            ("n", Exact, T::Number),
            ("num", Exact, T::Number),
            ("items", Contains, T::Array),
            ("list", Contains, T::Array),
            ("array", Contains, T::Array),
            ("id", Exact, T::String),
            ("_id", Suffix, T::String),
            ("name", Contains, T::String),
            ("email", Contains, T::String),
            ("url", Contains, T::String),
            ("path", Contains, T::String),
            ("text", Contains, T::String),
            ("message", Contains, T::String),
            ("data", Contains, T::Object),
            ("config", Contains, T::Object),
            ("options", Contains, T::Object),
            ("settings", Contains, T::Object),
            ("params", Contains, T::Object),
        ];

        Self {
            patterns: table
                .iter()
                .map(|(p, k, t)| TypePattern::new(p, *k, *t))
                .collect(),
        }
    }
}

impl TypeInference {
    /// Table with `overrides` consulted before the defaults.
    pub fn with_overrides(mut self, overrides: Vec<TypePattern>) -> Self {
        let mut patterns: Vec<TypePattern> = overrides
            .into_iter()
            .map(|p| TypePattern::new(&p.pattern, p.kind, p.ty))
            .collect();
        patterns.append(&mut self.patterns);
        self.patterns = patterns;
        self
    }

    pub fn patterns(&self) -> &[TypePattern] {
        &self.patterns
    }

    pub fn infer(&self, name: &str) -> SemanticType {
        let ident = normalize_identifier(name);

        self.patterns
            .iter()
            .find(|p| p.matches(&ident))
            .map(|p| p.ty)
            .unwrap_or(SemanticType::Any)
    }

    /// Explicit annotation when understood, name inference otherwise.
    pub fn resolve(&self, name: &str, annotation: Option<&str>) -> SemanticType {
        annotation
            .and_then(resolve_annotation)
            .unwrap_or_else(|| self.infer(name))
    }
}

/// `userId` -> `user_id`, `HTTPHandler` -> `httphandler`.
pub fn normalize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;

    for c in name.trim_start_matches(['$', '*']).chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
            out.push(c);
        }
    }

    out
}

/* ============================================================
   Annotations
   ============================================================ */

/// Map an explicit annotation (`List[int]`, `&str`, `Promise<string>`, ...)
/// to a semantic type. `None` means "not understood".
pub fn resolve_annotation(text: &str) -> Option<SemanticType> {
    let ty = strip_wrappers(text.trim());
    if ty.is_empty() {
        return None;
    }

    let lower = ty.to_ascii_lowercase();
    let head = lower
        .split(|c: char| c == '[' || c == '<' || c == '(')
        .next()
        .unwrap_or("")
        .trim()
        .rsplit("::")
        .next()
        .unwrap_or("")
        .rsplit('.')
        .next()
        .unwrap_or("")
        .trim();

    // Containers and callables before scalars: `List[str]` is an array.
    if lower.ends_with("[]")
        || matches!(
            head,
            "list" | "vec" | "vecdeque" | "array" | "readonlyarray" | "tuple" | "set"
                | "frozenset" | "hashset" | "btreeset" | "sequence" | "iterable"
                | "iterator" | "collection"
        )
        || lower.starts_with('[')
    {
        return Some(SemanticType::Array);
    }

    if lower.contains("=>")
        || lower.starts_with("fn(")
        || lower.starts_with("impl fn")
        || lower.starts_with("dyn fn")
        || matches!(head, "callable" | "fn" | "fnmut" | "fnonce" | "function")
    {
        return Some(SemanticType::Function);
    }

    if lower.starts_with('{')
        || matches!(
            head,
            "dict" | "mapping" | "hashmap" | "btreemap" | "map" | "record" | "object"
                | "typeddict" | "value"
        )
    {
        return Some(SemanticType::Object);
    }

    match head {
        "str" | "string" | "char" | "path" | "pathbuf" | "osstr" | "osstring" => {
            Some(SemanticType::String)
        }
        "int" | "float" | "complex" | "decimal" | "number" | "bigint" | "i8" | "i16"
        | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
        | "usize" | "f32" | "f64" => Some(SemanticType::Number),
        "bool" | "boolean" => Some(SemanticType::Boolean),
        "any" | "unknown" => Some(SemanticType::Any),
        _ => None,
    }
}

/// Peel `Optional[T]`, `Option<T>`, `Promise<T>`, references and
/// `T | None` / `T | undefined` unions down to `T`.
fn strip_wrappers(text: &str) -> &str {
    let mut ty = text.trim();

    loop {
        let before = ty;

        for prefix in ["&'static ", "&mut ", "&", "mut ", "readonly "] {
            if let Some(rest) = ty.strip_prefix(prefix) {
                ty = rest.trim_start();
            }
        }
        // `&'a str`
        if let Some(rest) = ty.strip_prefix('\'') {
            ty = rest
                .split_once(char::is_whitespace)
                .map(|(_, r)| r.trim_start())
                .unwrap_or(rest);
        }

        for wrapper in ["Optional[", "typing.Optional["] {
            if let Some(inner) = ty.strip_prefix(wrapper).and_then(|r| r.strip_suffix(']')) {
                ty = inner.trim();
            }
        }
        for wrapper in ["Option<", "Promise<", "Box<", "Rc<", "Arc<"] {
            if let Some(inner) = ty.strip_prefix(wrapper).and_then(|r| r.strip_suffix('>')) {
                ty = inner.trim();
            }
        }

        if let Some((left, right)) = ty.split_once('|') {
            let right = right.trim();
            let left = left.trim();
            if matches!(right, "None" | "undefined" | "null") {
                ty = left;
            } else if matches!(left, "None" | "undefined" | "null") {
                ty = right;
            }
        }

        if ty == before {
            return ty;
        }
    }
}
