//! detectors/ast/lexical.rs
//!
//! Lexical extraction for JavaScript / TypeScript.
//!
//! No syntax tree: three ordered pattern families over raw text
//! (named function declarations, arrow functions bound to a name,
//! method signatures inside a class body). Complexity stays at the
//! baseline and dependencies are not collected.

use std::collections::{BTreeSet, HashSet};
use std::ops::Range;

use regex::Regex;

use super::params::{assemble, parse_param, split_top_level};
use super::StructuralExtractor;
use crate::detectors::infer::{resolve_annotation, TypeInference};
use crate::error::ExtractError;
use crate::model::{FunctionInfo, SemanticType};

const IDENT: &str = r"[A-Za-z_$][\w$]*";

/// Never method names, whatever the shape of the line.
const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "function", "constructor", "with",
    "else", "do", "try", "new", "typeof", "await", "yield",
];

#[derive(Clone)]
struct Patterns {
    function_decl: Regex,
    arrow_assign: Regex,
    method_sig: Regex,
    class_decl: Regex,
    return_then_body: Regex,
    return_then_arrow: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            function_decl: Regex::new(&format!(
                r"\bfunction\s*\*?\s*({IDENT})\s*(?:<[^>(]*>)?\s*\("
            ))?,
            arrow_assign: Regex::new(&format!(
                r"\b(?:const|let|var)\s+({IDENT})\s*(?::[^=]+)?=\s*(async\s+)?(?:<[^>(]*>\s*)?\("
            ))?,
            method_sig: Regex::new(&format!(
                r"(?m)^[ \t]*((?:(?:public|private|protected|static|readonly|override|abstract|async|get|set)\s+)*)\*?\s*({IDENT})\s*(?:<[^>(]*>)?\s*\("
            ))?,
            class_decl: Regex::new(&format!(r"\bclass\s+({IDENT})[^{{]*\{{"))?,
            return_then_body: Regex::new(r"^\s*(?::\s*([^{;=]+?))?\s*\{")?,
            return_then_arrow: Regex::new(r"^\s*(?::\s*([^=]+?))?\s*=>")?,
        })
    }
}

thread_local! {
    static PATTERNS: Result<Patterns, regex::Error> = Patterns::compile();
}

pub struct LexicalExtractor<'a> {
    patterns: Patterns,
    inference: &'a TypeInference,
}

impl<'a> LexicalExtractor<'a> {
    pub fn new(inference: &'a TypeInference) -> Result<Self, ExtractError> {
        let patterns = PATTERNS.with(|p| {
            p.clone()
                .map_err(|e| ExtractError::Pattern(e.to_string()))
        })?;

        Ok(Self {
            patterns,
            inference,
        })
    }
}

/// One pattern hit, before parameter resolution.
struct Hit {
    offset: usize,
    name: String,
    params: String,
    return_annotation: Option<String>,
    is_async: bool,
    is_static: bool,
    class_name: Option<String>,
}

impl StructuralExtractor for LexicalExtractor<'_> {
    fn extract(&self, source: &str) -> Result<Vec<FunctionInfo>, ExtractError> {
        let mut hits = Vec::new();
        let mut seen = HashSet::new();

        let spans = spans(source);

        self.function_declarations(source, &mut hits, &mut seen);
        self.arrow_assignments(source, &mut hits, &mut seen);
        self.class_methods(source, &spans, &mut hits, &mut seen);

        // pattern hits inside comments and string literals are not declarations
        hits.retain(|h| in_code(&spans, h.offset));
        hits.sort_by_key(|h| h.offset);

        Ok(hits
            .into_iter()
            .map(|hit| {
                let raw = split_top_level(&hit.params)
                    .iter()
                    .filter_map(|p| parse_param(p))
                    .collect();

                FunctionInfo {
                    parameters: assemble(raw, self.inference),
                    return_type: hit
                        .return_annotation
                        .as_deref()
                        .and_then(resolve_annotation)
                        .unwrap_or(SemanticType::Any),
                    is_async: hit.is_async,
                    is_method: hit.class_name.is_some(),
                    is_static: hit.is_static,
                    docstring: doc_comment_before(source, hit.offset),
                    line_number: line_of(source, hit.offset),
                    complexity: 1,
                    dependencies: BTreeSet::new(),
                    class_name: hit.class_name,
                    name: hit.name,
                }
            })
            .collect())
    }
}

impl LexicalExtractor<'_> {
    /// (a) `function name(...)`
    fn function_declarations(&self, src: &str, hits: &mut Vec<Hit>, seen: &mut HashSet<usize>) {
        for caps in self.patterns.function_decl.captures_iter(src) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some((params, after)) = params_at(src, whole.end() - 1) else {
                continue;
            };

            let return_annotation = self
                .patterns
                .return_then_body
                .captures(&src[after..])
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string());

            if seen.insert(whole.start()) {
                hits.push(Hit {
                    offset: whole.start(),
                    name: name.as_str().to_string(),
                    params,
                    return_annotation,
                    is_async: preceded_by_async(src, whole.start()),
                    is_static: false,
                    class_name: None,
                });
            }
        }
    }

    /// (b) `const name = (...) => ...`
    fn arrow_assignments(&self, src: &str, hits: &mut Vec<Hit>, seen: &mut HashSet<usize>) {
        for caps in self.patterns.arrow_assign.captures_iter(src) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let Some((params, after)) = params_at(src, whole.end() - 1) else {
                continue;
            };

            // an explicit parameter list followed by `=>`, not a call
            let Some(arrow) = self.patterns.return_then_arrow.captures(&src[after..]) else {
                continue;
            };

            if seen.insert(whole.start()) {
                hits.push(Hit {
                    offset: whole.start(),
                    name: name.as_str().to_string(),
                    params,
                    return_annotation: arrow.get(1).map(|m| m.as_str().trim().to_string()),
                    is_async: caps.get(2).is_some() || preceded_by_async(src, whole.start()),
                    is_static: false,
                    class_name: None,
                });
            }
        }
    }

    /// (c) bare method signatures directly inside a class body
    fn class_methods(
        &self,
        src: &str,
        spans: &[(Span, Range<usize>)],
        hits: &mut Vec<Hit>,
        seen: &mut HashSet<usize>,
    ) {
        let classes = self.class_bodies(src, spans);
        if classes.is_empty() {
            return;
        }

        for caps in self.patterns.method_sig.captures_iter(src) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }

            let Some((class_name, body)) = classes
                .iter()
                .find(|(_, body)| body.contains(&name.start()))
            else {
                continue;
            };
            if brace_depth(&src[body.start..name.start()]) != 0 {
                continue;
            }

            let Some((params, after)) = params_at(src, whole.end() - 1) else {
                continue;
            };
            let Some(sig) = self.patterns.return_then_body.captures(&src[after..]) else {
                continue;
            };

            let modifiers: Vec<&str> = caps
                .get(1)
                .map(|m| m.as_str().split_whitespace().collect())
                .unwrap_or_default();
            let offset = name.start();

            if seen.insert(offset) {
                hits.push(Hit {
                    offset,
                    name: name.as_str().to_string(),
                    params,
                    return_annotation: sig.get(1).map(|m| m.as_str().trim().to_string()),
                    is_async: modifiers.contains(&"async") || preceded_by_async(src, offset),
                    is_static: modifiers.contains(&"static"),
                    class_name: Some(class_name.clone()),
                });
            }
        }
    }

    /// Class name plus the byte range strictly inside its braces.
    fn class_bodies(
        &self,
        src: &str,
        spans: &[(Span, Range<usize>)],
    ) -> Vec<(String, Range<usize>)> {
        self.patterns
            .class_decl
            .captures_iter(src)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                if !in_code(spans, whole.start()) {
                    return None;
                }
                let name = caps.get(1)?.as_str().to_string();
                let open = whole.end() - 1;
                let close = matching_close(src, open, b'{', b'}')?;
                Some((name, open + 1..close))
            })
            .collect()
    }
}

/* ============================================================
   Helpers
   ============================================================ */

/// Given the index of an opening `(`, return the parameter text (comments
/// blanked out) and the index just past the matching `)`.
fn params_at(src: &str, open: usize) -> Option<(String, usize)> {
    if src.as_bytes().get(open) != Some(&b'(') {
        return None;
    }
    let close = matching_close(src, open, b'(', b')')?;
    Some((strip_comments(&src[open + 1..close]), close + 1))
}

fn matching_close(src: &str, open: usize, open_ch: u8, close_ch: u8) -> Option<usize> {
    let mut depth = 0usize;

    for (i, b) in code_bytes(&src[open..]) {
        if b == open_ch {
            depth += 1;
        } else if b == close_ch {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(open + i);
            }
        }
    }

    None
}

/// Net `{`/`}` balance of `text`; zero means "directly in the class body".
fn brace_depth(text: &str) -> i64 {
    code_bytes(text).fold(0i64, |d, (_, b)| match b {
        b'{' => d + 1,
        b'}' => d - 1,
        _ => d,
    })
}

/* ============================================================
   Literal / comment scanning
   ============================================================ */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    Code,
    Literal,
    Comment,
}

/// Partition `src` into runs of code, string literals and comments.
fn spans(src: &str) -> Vec<(Span, Range<usize>)> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut code_start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        let run = match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'/')) => Some((Span::Comment, line_end(bytes, i))),
            (b'/', Some(b'*')) => Some((
                Span::Comment,
                src[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2),
            )),
            (b'"' | b'\'' | b'`', _) => Some((Span::Literal, literal_end(bytes, i))),
            _ => None,
        };

        match run {
            Some((kind, end)) => {
                if code_start < i {
                    out.push((Span::Code, code_start..i));
                }
                out.push((kind, i..end));
                i = end;
                code_start = end;
            }
            None => i += 1,
        }
    }

    if code_start < bytes.len() {
        out.push((Span::Code, code_start..bytes.len()));
    }

    out
}

fn line_end(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |p| from + p)
}

/// Index just past the literal opened at `start`. An escape consumes the
/// byte after it; `'` and `"` literals also stop at a newline.
fn literal_end(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => return i + 1,
            b'\n' if quote != b'`' => return i,
            _ => i += 1,
        }
    }

    bytes.len()
}

fn code_bytes(src: &str) -> impl Iterator<Item = (usize, u8)> + '_ {
    let bytes = src.as_bytes();
    spans(src)
        .into_iter()
        .filter(|(kind, _)| *kind == Span::Code)
        .flat_map(move |(_, range)| range.map(move |i| (i, bytes[i])))
}

fn in_code(spans: &[(Span, Range<usize>)], offset: usize) -> bool {
    spans
        .iter()
        .find(|(_, range)| range.contains(&offset))
        .map_or(true, |(kind, _)| *kind == Span::Code)
}

fn strip_comments(text: &str) -> String {
    spans(text)
        .into_iter()
        .map(|(kind, range)| match kind {
            Span::Comment => " ",
            _ => &text[range],
        })
        .collect()
}

/// Whether the token `async` sits immediately before `offset`,
/// looking past `export` / `default`.
fn preceded_by_async(src: &str, offset: usize) -> bool {
    let mut before = src[..offset].trim_end();
    loop {
        if before.ends_with("async")
            && before[..before.len() - 5]
                .chars()
                .last()
                .map_or(true, |c| !c.is_alphanumeric() && c != '_' && c != '$')
        {
            return true;
        }

        match ["export", "default"]
            .iter()
            .find_map(|kw| before.strip_suffix(kw))
        {
            Some(rest) => before = rest.trim_end(),
            None => return false,
        }
    }
}

/// `/** ... */` block ending right before the declaration.
fn doc_comment_before(src: &str, offset: usize) -> Option<String> {
    let mut before = src[..offset].trim_end();
    for kw in ["async", "default", "export"] {
        if let Some(rest) = before.strip_suffix(kw) {
            before = rest.trim_end();
        }
    }

    let body = before.strip_suffix("*/")?;
    let start = body.rfind("/**")?;
    let doc = body[start + 3..]
        .lines()
        .map(|l| l.trim().trim_start_matches('*').trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if doc.is_empty() {
        None
    } else {
        Some(doc)
    }
}

fn line_of(src: &str, offset: usize) -> usize {
    src[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}
