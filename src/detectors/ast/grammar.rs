//! detectors/ast/grammar.rs
//!
//! Grammar-based extraction (tree-sitter) for Python and Rust.

use std::cell::RefCell;
use std::collections::BTreeSet;

use tree_sitter::{Language, Node, Parser, Tree};

use super::params::{assemble, RawParam};
use super::StructuralExtractor;
use crate::detectors::infer::{resolve_annotation, TypeInference};
use crate::detectors::language::LanguageFamily;
use crate::error::ExtractError;
use crate::model::{FunctionInfo, SemanticType};

thread_local! {
    static PY_PARSER: RefCell<Option<Parser>> =
        RefCell::new(make_parser(&tree_sitter_python::language()));
    static RS_PARSER: RefCell<Option<Parser>> =
        RefCell::new(make_parser(&tree_sitter_rust::language()));
}

fn make_parser(language: &Language) -> Option<Parser> {
    let mut p = Parser::new();
    p.set_language(language).ok()?;
    Some(p)
}

pub struct GrammarExtractor<'a> {
    family: LanguageFamily,
    inference: &'a TypeInference,
}

impl<'a> GrammarExtractor<'a> {
    pub fn new(family: LanguageFamily, inference: &'a TypeInference) -> Self {
        Self { family, inference }
    }
}

impl StructuralExtractor for GrammarExtractor<'_> {
    fn extract(&self, source: &str) -> Result<Vec<FunctionInfo>, ExtractError> {
        let tree = parse_source(self.family, source)?;
        check_syntax(&tree)?;

        let mut out = Vec::new();
        let root = tree.root_node();

        match self.family {
            LanguageFamily::Python => walk_python(root, source, None, self.inference, &mut out),
            LanguageFamily::Rust => walk_rust(root, source, None, self.inference, &mut out),
            _ => {}
        }

        Ok(out)
    }
}

/* ============================================================
   Parsing
   ============================================================ */

pub fn parse_source(family: LanguageFamily, source: &str) -> Result<Tree, ExtractError> {
    let with_parser = |slot: &RefCell<Option<Parser>>, name: &'static str| -> Result<Tree, ExtractError> {
        let mut guard = slot.borrow_mut();
        let parser = guard.as_mut().ok_or(ExtractError::Grammar(name))?;
        parser.parse(source, None).ok_or(ExtractError::NoTree)
    };

    match family {
        LanguageFamily::Python => PY_PARSER.with(|p| with_parser(p, "python")),
        LanguageFamily::Rust => RS_PARSER.with(|p| with_parser(p, "rust")),
        _ => Err(ExtractError::Grammar("unsupported")),
    }
}

/// Reject trees tree-sitter had to recover; report the first bad line.
fn check_syntax(tree: &Tree) -> Result<(), ExtractError> {
    let root = tree.root_node();
    if !root.has_error() {
        return Ok(());
    }

    let line = first_error(root)
        .map(|n| n.start_position().row + 1)
        .unwrap_or(1);

    Err(ExtractError::Syntax { line })
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(e) = first_error(child) {
            return Some(e);
        }
    }

    None
}

/* ============================================================
   Python
   ============================================================ */

const PY_BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "elif_clause",
    "for_statement",
    "while_statement",
    "except_clause",
    "conditional_expression",
    // nested binary nodes: `a and b and c` counts twice
    "boolean_operator",
];

fn walk_python(
    node: Node,
    src: &str,
    owner: Option<&str>,
    inference: &TypeInference,
    out: &mut Vec<FunctionInfo>,
) {
    match node.kind() {
        "function_definition" => {
            if let Some(f) = python_function(node, src, owner, inference) {
                out.push(f);
            }
            // nested functions are not importable
        }

        "class_definition" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| text(n, src).to_string());

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    walk_python(child, src, name.as_deref(), inference, out);
                }
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_python(child, src, owner, inference, out);
            }
        }
    }
}

fn python_function(
    node: Node,
    src: &str,
    owner: Option<&str>,
    inference: &TypeInference,
) -> Option<FunctionInfo> {
    let name = text(node.child_by_field_name("name")?, src).to_string();
    if name == "__init__" {
        return None;
    }

    let is_async = {
        let mut cursor = node.walk();
        let found = node.children(&mut cursor).any(|c| c.kind() == "async");
        found
    };

    let mut raw = node
        .child_by_field_name("parameters")
        .map(|p| python_params(p, src))
        .unwrap_or_default();

    let receiver = raw.first().map(|p| p.name.clone());
    let is_method = matches!(receiver.as_deref(), Some("self" | "cls"));
    if is_method {
        raw.remove(0);
    }
    // classmethods and bare functions in a class body are called on the class
    let is_static = owner.is_some() && receiver.as_deref() != Some("self");

    let return_type = node
        .child_by_field_name("return_type")
        .and_then(|r| resolve_annotation(text(r, src)))
        .unwrap_or(SemanticType::Any);

    let docstring = node
        .child_by_field_name("body")
        .and_then(|b| python_docstring(b, src));

    Some(FunctionInfo {
        name,
        parameters: assemble(raw, inference),
        return_type,
        is_async,
        is_method,
        is_static,
        class_name: owner.map(str::to_owned),
        docstring,
        line_number: node.start_position().row + 1,
        complexity: count_branches(node, src, |n, _| PY_BRANCH_KINDS.contains(&n.kind()) as u32),
        dependencies: python_calls(node, src),
    })
}

fn python_params(params: Node, src: &str) -> Vec<RawParam> {
    let mut raw = Vec::new();
    let mut keyword_only = false;

    let mut cursor = params.walk();
    for p in params.named_children(&mut cursor) {
        let param = match p.kind() {
            "identifier" => Some(RawParam::named(text(p, src))),

            "typed_parameter" => {
                let mut c = p.walk();
                let binding = p.named_children(&mut c).next();
                match binding {
                    Some(b) if b.kind() == "identifier" => Some(RawParam {
                        annotation: p.child_by_field_name("type").map(|t| text(t, src).to_string()),
                        ..RawParam::named(text(b, src))
                    }),
                    Some(b) => {
                        // `*args: int` / `**kw: str`
                        if b.kind() == "list_splat_pattern" {
                            keyword_only = true;
                        }
                        None
                    }
                    None => None,
                }
            }

            "default_parameter" | "typed_default_parameter" => {
                p.child_by_field_name("name").map(|n| RawParam {
                    annotation: p.child_by_field_name("type").map(|t| text(t, src).to_string()),
                    default: p.child_by_field_name("value").map(|v| text(v, src).to_string()),
                    ..RawParam::named(text(n, src))
                })
            }

            "list_splat_pattern" | "keyword_separator" => {
                keyword_only = true;
                None
            }

            _ => None,
        };

        if let Some(mut param) = param {
            param.keyword_only = keyword_only;
            raw.push(param);
        }
    }

    raw
}

fn python_docstring(body: Node, src: &str) -> Option<String> {
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).next()?;
    if first.kind() != "expression_statement" {
        return None;
    }

    let mut c = first.walk();
    let string = first.named_children(&mut c).next()?;
    if string.kind() != "string" {
        return None;
    }

    let raw = text(string, src).trim_start_matches(|c: char| "rRuUbBfF".contains(c));
    let inner = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| raw.strip_prefix(*q).and_then(|r| r.strip_suffix(*q)))
        .unwrap_or(raw);

    let doc = inner.trim();
    if doc.is_empty() {
        None
    } else {
        Some(doc.to_string())
    }
}

fn python_calls(node: Node, src: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();

    visit(node, &mut |n| {
        if n.kind() != "call" {
            return;
        }
        let Some(callee) = n.child_by_field_name("function") else {
            return;
        };
        let name = match callee.kind() {
            "identifier" => Some(callee),
            "attribute" => callee.child_by_field_name("attribute"),
            _ => None,
        };
        if let Some(name) = name {
            deps.insert(text(name, src).to_string());
        }
    });

    deps
}

/* ============================================================
   Rust
   ============================================================ */

const RS_BRANCH_KINDS: &[&str] = &[
    "if_expression",
    "while_expression",
    "loop_expression",
    "for_expression",
    "try_expression",
];

fn walk_rust(
    node: Node,
    src: &str,
    owner: Option<&str>,
    inference: &TypeInference,
    out: &mut Vec<FunctionInfo>,
) {
    if has_test_attribute(node, src) {
        return;
    }

    match node.kind() {
        "function_item" => {
            if let Some(f) = rust_function(node, src, owner, inference) {
                out.push(f);
            }
        }

        "impl_item" | "trait_item" => {
            let field = if node.kind() == "impl_item" { "type" } else { "name" };
            let name = node.child_by_field_name(field).map(|n| {
                let t = text(n, src);
                t.split('<').next().unwrap_or(t).trim().to_string()
            });

            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    walk_rust(child, src, name.as_deref(), inference, out);
                }
            }
        }

        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                walk_rust(child, src, owner, inference, out);
            }
        }
    }
}

fn rust_function(
    node: Node,
    src: &str,
    owner: Option<&str>,
    inference: &TypeInference,
) -> Option<FunctionInfo> {
    let name = text(node.child_by_field_name("name")?, src).to_string();
    if owner.is_some() && name == "new" {
        return None;
    }

    let is_async = {
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .any(|c| c.kind() == "function_modifiers" && text(c, src).contains("async"));
        found
    };

    let mut is_method = false;
    let mut raw = Vec::new();

    if let Some(params) = node.child_by_field_name("parameters") {
        let mut cursor = params.walk();
        for p in params.named_children(&mut cursor) {
            match p.kind() {
                "self_parameter" => is_method = true,
                "parameter" => {
                    let Some(pattern) = p.child_by_field_name("pattern") else {
                        continue;
                    };
                    let binding = text(pattern, src);
                    raw.push(RawParam {
                        annotation: p.child_by_field_name("type").map(|t| text(t, src).to_string()),
                        ..RawParam::named(binding.trim_start_matches("mut ").trim())
                    });
                }
                _ => {}
            }
        }
    }

    let return_type = node
        .child_by_field_name("return_type")
        .and_then(|r| resolve_annotation(text(r, src)))
        .unwrap_or(SemanticType::Any);

    Some(FunctionInfo {
        name,
        parameters: assemble(raw, inference),
        return_type,
        is_async,
        is_method,
        is_static: owner.is_some() && !is_method,
        class_name: owner.map(str::to_owned),
        docstring: rust_doc_comment(node, src),
        line_number: node.start_position().row + 1,
        complexity: count_branches(node, src, rust_branch_weight),
        dependencies: rust_calls(node, src),
    })
}

fn rust_branch_weight(n: Node, src: &str) -> u32 {
    match n.kind() {
        k if RS_BRANCH_KINDS.contains(&k) => 1,
        // every arm after the first is an extra path
        "match_block" => {
            let mut cursor = n.walk();
            let arms = n
                .named_children(&mut cursor)
                .filter(|c| c.kind() == "match_arm")
                .count() as u32;
            arms.saturating_sub(1)
        }
        "binary_expression" => n
            .child_by_field_name("operator")
            .map(|op| matches!(text(op, src), "&&" | "||") as u32)
            .unwrap_or(0),
        _ => 0,
    }
}

fn rust_doc_comment(node: Node, src: &str) -> Option<String> {
    let mut lines = Vec::new();
    let mut prev = node.prev_sibling();

    while let Some(p) = prev {
        match p.kind() {
            "line_comment" => match text(p, src).strip_prefix("///") {
                Some(doc) => lines.push(doc.trim().to_string()),
                None => break,
            },
            "attribute_item" => {}
            _ => break,
        }
        prev = p.prev_sibling();
    }

    if lines.is_empty() {
        return None;
    }
    lines.reverse();
    Some(lines.join("\n").trim().to_string())
}

fn rust_calls(node: Node, src: &str) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();

    visit(node, &mut |n| {
        if n.kind() != "call_expression" {
            return;
        }
        if let Some(name) = n
            .child_by_field_name("function")
            .and_then(|f| rust_callee(f, src))
        {
            deps.insert(name);
        }
    });

    deps
}

fn rust_callee(node: Node, src: &str) -> Option<String> {
    match node.kind() {
        "identifier" => Some(text(node, src).to_string()),
        "field_expression" => node.child_by_field_name("field").map(|f| text(f, src).to_string()),
        "scoped_identifier" => node.child_by_field_name("name").map(|f| text(f, src).to_string()),
        "generic_function" => node
            .child_by_field_name("function")
            .and_then(|f| rust_callee(f, src)),
        _ => None,
    }
}

/// `#[test]`, `#[tokio::test]` or `#[cfg(test)]` directly above an item.
fn has_test_attribute(node: Node, src: &str) -> bool {
    if !matches!(node.kind(), "function_item" | "mod_item") {
        return false;
    }

    let mut prev = node.prev_sibling();
    while let Some(p) = prev {
        match p.kind() {
            "attribute_item" => {
                if is_test_attribute(text(p, src)) {
                    return true;
                }
            }
            "line_comment" | "block_comment" => {}
            _ => break,
        }
        prev = p.prev_sibling();
    }

    false
}

/// `test` as a whole path segment (`test`, `tokio::test`, `cfg(test)`),
/// never inside a string literal or a longer identifier.
fn is_test_attribute(attr: &str) -> bool {
    let inner = attr
        .trim()
        .trim_start_matches('#')
        .trim_start_matches('!')
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim();

    let head = inner.split(['(', '=']).next().unwrap_or("").trim();
    if head.rsplit("::").next() == Some("test") {
        return true;
    }

    if head != "cfg" {
        return false;
    }

    let args = inner[head.len()..].trim();
    let mut tokens = Vec::new();
    let mut in_str = false;
    let mut current = String::new();
    for c in args.chars() {
        match c {
            '"' => in_str = !in_str,
            _ if in_str => {}
            c if c.is_alphanumeric() || c == '_' => current.push(c),
            _ => tokens.push(std::mem::take(&mut current)),
        }
    }
    tokens.push(current);
    tokens.retain(|t| !t.is_empty());

    // `cfg(not(test))` guards production code
    tokens.iter().enumerate().any(|(i, t)| {
        t == "test" && (i == 0 || tokens[i - 1] != "not")
    })
}

/* ============================================================
   Helpers
   ============================================================ */

fn text<'s>(node: Node, src: &'s str) -> &'s str {
    node.utf8_text(src.as_bytes()).unwrap_or("")
}

fn visit<'t>(node: Node<'t>, f: &mut impl FnMut(Node<'t>)) {
    f(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        visit(child, f);
    }
}

/// 1 + weighted branch nodes anywhere in the subtree.
fn count_branches(node: Node, src: &str, weight: impl Fn(Node, &str) -> u32) -> u32 {
    let mut complexity = 1;
    visit(node, &mut |n| complexity += weight(n, src));
    complexity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(family: LanguageFamily, src: &str) -> Vec<FunctionInfo> {
        let inference = TypeInference::default();
        GrammarExtractor::new(family, &inference).extract(src).unwrap()
    }

    const PY: &str = r#"
import os

def add(a: int, b: int) -> int:
    """Add two numbers."""
    return a + b

async def fetch(url, retries=3, *, timeout: float = 1.0, strict):
    if retries > 0 and url or timeout:
        return await client.get(url)
    for _ in range(retries):
        try:
            os.path.exists(url)
        except ValueError:
            pass
    return None

def _private(x):
    return x

class Cart:
    def __init__(self, items):
        self.items = items

    def total(self, discount=0):
        def inner():
            return 1
        return sum(self.items) - discount if discount else sum(self.items)

    @classmethod
    def empty(cls):
        return cls([])
"#;

    #[test]
    fn python_functions_and_methods() {
        let fns = extract(LanguageFamily::Python, PY);
        let names: Vec<_> = fns.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add", "fetch", "_private", "total", "empty"]);

        let add = &fns[0];
        assert_eq!(add.return_type, SemanticType::Number);
        assert_eq!(add.docstring.as_deref(), Some("Add two numbers."));
        assert_eq!(add.line_number, 4);
        assert_eq!(add.complexity, 1);
        assert!(add.parameters.iter().all(|p| p.type_hint == SemanticType::Number));

        let total = &fns[3];
        assert!(total.is_method);
        assert_eq!(total.class_name.as_deref(), Some("Cart"));
        assert_eq!(total.parameters.len(), 1);
        assert!(total.parameters[0].is_optional);
        assert!(total.dependencies.contains("sum"));

        let empty = &fns[4];
        assert!(empty.is_method);
        assert!(empty.is_static);
        assert!(!total.is_static);
        assert!(empty.parameters.is_empty());
    }

    #[test]
    fn python_async_params_and_complexity() {
        let fns = extract(LanguageFamily::Python, PY);
        let fetch = &fns[1];

        assert!(fetch.is_async);
        let optional: Vec<_> = fetch
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), p.is_optional))
            .collect();
        assert_eq!(
            optional,
            vec![("url", false), ("retries", true), ("timeout", true), ("strict", false)]
        );
        assert_eq!(fetch.parameters[0].type_hint, SemanticType::String);

        // if + 2 boolean ops + for + except
        assert_eq!(fetch.complexity, 6);
        let deps: Vec<_> = fetch.dependencies.iter().map(String::as_str).collect();
        assert_eq!(deps, vec!["exists", "get", "range"]);
    }

    #[test]
    fn python_syntax_error_fails_whole_file() {
        let inference = TypeInference::default();
        let err = GrammarExtractor::new(LanguageFamily::Python, &inference)
            .extract("def ok():\n    pass\n\ndef broken(:\n    pass\n")
            .unwrap_err();
        assert!(matches!(err, ExtractError::Syntax { .. }));
    }

    #[test]
    fn extra_branch_never_lowers_complexity() {
        let base = "def f(x):\n    if x:\n        return 1\n    return 2\n";
        let more = "def f(x):\n    if x:\n        return 1\n    while x:\n        x -= 1\n    return 2\n";

        let a = extract(LanguageFamily::Python, base)[0].complexity;
        let b = extract(LanguageFamily::Python, more)[0].complexity;
        assert_eq!(a, 2);
        assert!(b > a);
    }

    #[test]
    fn extraction_is_deterministic() {
        assert_eq!(
            extract(LanguageFamily::Python, PY),
            extract(LanguageFamily::Python, PY)
        );
    }

    const RS: &str = r#"
/// Parses a port.
pub fn parse_port(text: &str, fallback: Option<u16>) -> Result<u16, String> {
    match text.parse::<u16>() {
        Ok(p) if p > 0 && p < 1024 => Err(format!("reserved {p}")),
        Ok(p) => Ok(p),
        Err(_) => fallback.ok_or_else(|| "bad".to_string()),
    }
}

pub struct Pool { size: usize }

impl Pool {
    pub fn new(size: usize) -> Self { Self { size } }

    pub async fn acquire(&mut self, timeout_ms: u64) -> bool {
        if self.size == 0 { return false; }
        wait(timeout_ms).await;
        true
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn it_works() {}
}
"#;

    #[test]
    fn rust_items_impls_and_receivers() {
        let fns = extract(LanguageFamily::Rust, RS);
        let names: Vec<_> = fns.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["parse_port", "acquire"]);

        let parse = &fns[0];
        assert_eq!(parse.docstring.as_deref(), Some("Parses a port."));
        assert_eq!(parse.parameters[0].type_hint, SemanticType::String);
        assert_eq!(parse.parameters[1].type_hint, SemanticType::Number);
        assert!(!parse.is_method);
        // 3 arms (+2), `&&` (+1)
        assert_eq!(parse.complexity, 4);
        assert!(parse.dependencies.contains("parse"));

        let acquire = &fns[1];
        assert!(acquire.is_async);
        assert!(acquire.is_method);
        assert!(!acquire.is_static);
        assert_eq!(acquire.class_name.as_deref(), Some("Pool"));
        assert_eq!(acquire.return_type, SemanticType::Boolean);
        assert_eq!(acquire.complexity, 2);
        assert!(acquire.dependencies.contains("wait"));
    }

    #[test]
    fn test_attribute_matches_whole_segments() {
        assert!(is_test_attribute("#[test]"));
        assert!(is_test_attribute("#[tokio::test(flavor = \"multi_thread\")]"));
        assert!(is_test_attribute("#[cfg(test)]"));
        assert!(is_test_attribute("#[cfg(all(test, feature = \"slow\"))]"));

        assert!(!is_test_attribute("#[cfg(not(test))]"));
        assert!(!is_test_attribute("#[doc = \"latest\"]"));
        assert!(!is_test_attribute("#[cfg(feature = \"attestation\")]"));
        assert!(!is_test_attribute("#[attest]"));
    }

    #[test]
    fn attribute_words_containing_test_keep_the_item() {
        let src = r#"
#[doc = "latest"]
pub fn latest(limit: usize) -> usize { limit }

#[cfg(feature = "attestation")]
pub fn attest(token: &str) -> bool { !token.is_empty() }

#[cfg(test)]
fn only_in_tests() {}
"#;
        let fns = extract(LanguageFamily::Rust, src);
        let names: Vec<_> = fns.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["latest", "attest"]);
    }
}
