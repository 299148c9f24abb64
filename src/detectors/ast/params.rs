//! detectors/ast/params.rs
//!
//! Parameter list handling shared by both extraction strategies.

use crate::detectors::infer::TypeInference;
use crate::model::Parameter;

/// A parameter as written, before type resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParam {
    pub name: String,
    pub annotation: Option<String>,
    pub default: Option<String>,
    /// TypeScript `name?: T`.
    pub optional_marker: bool,
    /// Declared after `*` / `*args` in Python.
    pub keyword_only: bool,
}

impl RawParam {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/* ============================================================
   Resolution
   ============================================================ */

/// Resolve types and optionality.
///
/// Defaults right-align to the tail of the positional list: a positional
/// parameter is optional iff its index is `>= len - defaults`. Keyword-only
/// parameters are optional iff they carry a default.
pub fn assemble(raw: Vec<RawParam>, inference: &TypeInference) -> Vec<Parameter> {
    let positional = raw.iter().filter(|p| !p.keyword_only).count();
    let defaults = raw
        .iter()
        .filter(|p| !p.keyword_only && p.default.is_some())
        .count();
    let cutoff = positional - defaults;

    let mut index = 0usize;
    raw.into_iter()
        .map(|p| {
            let is_optional = if p.keyword_only {
                p.default.is_some()
            } else {
                let optional = index >= cutoff;
                index += 1;
                optional
            };

            Parameter {
                type_hint: inference.resolve(&p.name, p.annotation.as_deref()),
                is_optional: is_optional || p.optional_marker,
                name: p.name,
                default_value: p.default,
            }
        })
        .collect()
}

/* ============================================================
   Lexical parsing
   ============================================================ */

/// Split on commas that sit outside any bracket, paren, brace, angle
/// bracket or string literal.
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = '\0';

    for c in text.chars() {
        if let Some(q) = quote {
            current.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            prev = c;
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' | '<' => depth += 1,
            // `=>` is an arrow, not a closing angle bracket
            '>' if prev == '=' => {}
            ')' | ']' | '}' | '>' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(std::mem::take(&mut current));
                prev = c;
                continue;
            }
            _ => {}
        }

        current.push(c);
        prev = c;
    }

    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse one `name: type = default` entry from a lexical parameter list.
///
/// Rest parameters yield `None`. Destructured patterns are named
/// `options` (object) or `values` (array).
pub fn parse_param(entry: &str) -> Option<RawParam> {
    let mut entry = entry.trim();

    for modifier in ["public ", "private ", "protected ", "readonly ", "override "] {
        if let Some(rest) = entry.strip_prefix(modifier) {
            entry = rest.trim_start();
        }
    }

    if entry.is_empty() || entry.starts_with("...") || entry.starts_with('*') {
        return None;
    }

    let (binding, default) = match find_top_level(entry, '=') {
        Some(i) => (entry[..i].trim(), Some(entry[i + 1..].trim().to_string())),
        None => (entry, None),
    };

    let (name, annotation) = match find_top_level(binding, ':') {
        Some(i) => (binding[..i].trim(), Some(binding[i + 1..].trim().to_string())),
        None => (binding, None),
    };

    let (name, optional_marker) = match name.strip_suffix('?') {
        Some(n) => (n.trim(), true),
        None => (name, false),
    };

    let (name, annotation) = if name.starts_with('{') {
        ("options", annotation.or_else(|| Some("object".to_string())))
    } else if name.starts_with('[') {
        ("values", annotation.or_else(|| Some("array".to_string())))
    } else {
        (name, annotation)
    };

    if name.is_empty() {
        return None;
    }

    Some(RawParam {
        name: name.to_string(),
        annotation: annotation.filter(|a| !a.is_empty()),
        default: default.filter(|d| !d.is_empty()),
        optional_marker,
        keyword_only: false,
    })
}

/// Byte index of the first `target` at depth 0, ignoring `=>`, `==`,
/// `<=`, `>=` and `!=` when looking for `=`.
fn find_top_level(text: &str, target: char) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth: usize = 0;
    let mut quote: Option<u8> = None;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == q {
                quote = None;
            }
            continue;
        }

        match b {
            b'"' | b'\'' | b'`' => quote = Some(b),
            b'(' | b'[' | b'{' | b'<' => depth += 1,
            b'>' if i > 0 && bytes[i - 1] == b'=' => {}
            b')' | b']' | b'}' | b'>' => depth = depth.saturating_sub(1),
            _ if depth == 0 && b as char == target => {
                if target == '=' {
                    let next = bytes.get(i + 1).copied();
                    let prev = if i > 0 { Some(bytes[i - 1]) } else { None };
                    if matches!(next, Some(b'>') | Some(b'='))
                        || matches!(prev, Some(b'<') | Some(b'>') | Some(b'!') | Some(b'='))
                    {
                        continue;
                    }
                }
                return Some(i);
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SemanticType;

    #[test]
    fn split_respects_nesting_and_strings() {
        let parts = split_top_level(
            "a: Map<string, number>, b = [1, 2], cb = (x, y) => x, s = 'a,b', { c, d }: Props",
        );
        assert_eq!(
            parts,
            vec![
                "a: Map<string, number>",
                "b = [1, 2]",
                "cb = (x, y) => x",
                "s = 'a,b'",
                "{ c, d }: Props",
            ]
        );
        assert!(split_top_level("  ").is_empty());
    }

    #[test]
    fn escaped_backslash_closes_string() {
        let parts = split_top_level(r"sep = '\\', items, quote = 'it\'s, ok'");
        assert_eq!(parts, vec![r"sep = '\\'", "items", r"quote = 'it\'s, ok'"]);

        let p = parse_param(r"sep = '\\'").unwrap();
        assert_eq!(p.name, "sep");
        assert_eq!(p.default.as_deref(), Some(r"'\\'"));
    }

    #[test]
    fn parses_name_type_default_triples() {
        let p = parse_param("limit: number = 10").unwrap();
        assert_eq!(p.name, "limit");
        assert_eq!(p.annotation.as_deref(), Some("number"));
        assert_eq!(p.default.as_deref(), Some("10"));

        let p = parse_param("label?: string").unwrap();
        assert!(p.optional_marker);
        assert_eq!(p.name, "label");

        let p = parse_param("cb = (x) => x >= 1").unwrap();
        assert_eq!(p.name, "cb");
        assert_eq!(p.default.as_deref(), Some("(x) => x >= 1"));

        let p = parse_param("{ a, b }").unwrap();
        assert_eq!(p.name, "options");

        assert!(parse_param("...rest").is_none());
        assert!(parse_param("private readonly repo: Repo").is_some());
    }

    #[test]
    fn trailing_defaults_mark_tail_optional() {
        let raw = vec![
            RawParam::named("a"),
            RawParam::named("b"),
            RawParam {
                default: Some("3".into()),
                ..RawParam::named("c")
            },
        ];

        let params = assemble(raw, &TypeInference::default());
        let optional: Vec<bool> = params.iter().map(|p| p.is_optional).collect();
        assert_eq!(optional, vec![false, false, true]);
    }

    #[test]
    fn keyword_only_optional_iff_default() {
        let raw = vec![
            RawParam::named("a"),
            RawParam {
                keyword_only: true,
                ..RawParam::named("strict")
            },
            RawParam {
                keyword_only: true,
                default: Some("None".into()),
                ..RawParam::named("timeout")
            },
        ];

        let params = assemble(raw, &TypeInference::default());
        assert!(!params[0].is_optional);
        assert!(!params[1].is_optional);
        assert!(params[2].is_optional);
        assert_eq!(params[2].type_hint, SemanticType::Number);
    }
}
