//! testgen/synthesize.rs
//!
//! FunctionInfo -> ordered TestCase list.
//!
//! Order is fixed: happy path, error cases, boundary cases, edge cases.
//! Only non-receiver parameters ever appear in `input_values`.

use serde_json::Value;

use crate::config::SynthesisConfig;
use crate::model::{
    Assertion, FunctionInfo, InputValues, Parameter, Priority, TestCase, TestCategory,
};

pub fn synthesize(function: &FunctionInfo, config: &SynthesisConfig) -> Vec<TestCase> {
    if function.is_private() {
        return Vec::new();
    }

    let params: Vec<&Parameter> = function.input_parameters().collect();
    let builder = CaseBuilder { function };

    let mut cases = Vec::new();
    cases.push(happy_path(&builder, &params, config));
    cases.extend(error_cases(&builder, &params, config));
    cases.extend(boundary_cases(&builder, &params, config));
    cases.extend(edge_cases(&builder, &params, config));
    cases
}

/* ============================================================
   Categories
   ============================================================ */

fn happy_path(b: &CaseBuilder, params: &[&Parameter], config: &SynthesisConfig) -> TestCase {
    b.case(
        "happy_path",
        TestCategory::HappyPath,
        format!("{} returns a value for valid input", b.function.name),
        valid_inputs(params, config),
        "returns a defined result",
        Assertion::IsDefined,
        Priority::High,
    )
}

fn error_cases(b: &CaseBuilder, params: &[&Parameter], config: &SynthesisConfig) -> Vec<TestCase> {
    let mut out = Vec::new();

    for param in params {
        out.push(b.case(
            &format!("{}_null", param.name),
            TestCategory::Error,
            format!("{} with `{}` set to null", b.function.name, param.name),
            substitute(params, config, &param.name, Value::Null),
            "raises an error or falls back to a documented default",
            Assertion::Raises,
            Priority::High,
        ));

        // silently omitted when the type has no mismatch literal
        if let Some(wrong) = config.mismatch_value(param.type_hint) {
            out.push(b.case(
                &format!("{}_wrong_type", param.name),
                TestCategory::Error,
                format!(
                    "{} with a non-{} value for `{}`",
                    b.function.name, param.type_hint, param.name
                ),
                substitute(params, config, &param.name, wrong.clone()),
                "rejects the mistyped argument",
                Assertion::Raises,
                Priority::Medium,
            ));
        }
    }

    out
}

fn boundary_cases(
    b: &CaseBuilder,
    params: &[&Parameter],
    config: &SynthesisConfig,
) -> Vec<TestCase> {
    params
        .iter()
        .flat_map(|param| {
            config
                .probes(param.type_hint)
                .iter()
                .map(move |probe| (*param, probe))
        })
        .take(config.max_boundary_cases)
        .map(|(param, probe)| {
            b.case(
                &format!("{}_{}", param.name, probe.label),
                TestCategory::Boundary,
                format!(
                    "{} with {} boundary `{}` for `{}`",
                    b.function.name, param.type_hint, probe.label, param.name
                ),
                substitute(params, config, &param.name, probe.value.clone()),
                "handles the boundary value without crashing",
                Assertion::IsDefined,
                Priority::Medium,
            )
        })
        .collect()
}

fn edge_cases(b: &CaseBuilder, params: &[&Parameter], config: &SynthesisConfig) -> Vec<TestCase> {
    let f = b.function;
    let mut out = Vec::new();

    if f.has_optional_parameters() {
        let required: Vec<&Parameter> = params.iter().copied().filter(|p| !p.is_optional).collect();
        out.push(b.case(
            "required_only",
            TestCategory::EdgeCase,
            format!("{} called with only its required parameters", f.name),
            valid_inputs(&required, config),
            "optional parameters fall back to their defaults",
            Assertion::IsDefined,
            Priority::Medium,
        ));
    }

    if f.is_async {
        out.push(b.case(
            "async_resolves",
            TestCategory::EdgeCase,
            format!("{} eventually resolves", f.name),
            valid_inputs(params, config),
            "the returned promise/coroutine resolves",
            Assertion::Resolves,
            Priority::High,
        ));

        let inputs = match params.first() {
            Some(first) => substitute(params, config, &first.name, Value::Null),
            None => InputValues::new(),
        };
        out.push(b.case(
            "async_rejects",
            TestCategory::EdgeCase,
            format!("{} propagates failures as a rejection", f.name),
            inputs,
            "the failure surfaces as a rejected/raised error",
            Assertion::Rejects,
            Priority::High,
        ));
    }

    if f.complexity > config.complexity_threshold {
        out.push(b.case(
            "complex_branching",
            TestCategory::EdgeCase,
            format!(
                "{} has complexity {}; exercise each branch",
                f.name, f.complexity
            ),
            valid_inputs(params, config),
            "every branch produces its documented outcome",
            Assertion::Manual(format!(
                "complexity {} exceeds {}; write one assertion per branch",
                f.complexity, config.complexity_threshold
            )),
            Priority::Medium,
        ));
    }

    out
}

/* ============================================================
   Helpers
   ============================================================ */

struct CaseBuilder<'a> {
    function: &'a FunctionInfo,
}

impl CaseBuilder<'_> {
    #[allow(clippy::too_many_arguments)]
    fn case(
        &self,
        suffix: &str,
        category: TestCategory,
        description: String,
        input_values: InputValues,
        expected: &str,
        assertion: Assertion,
        priority: Priority,
    ) -> TestCase {
        TestCase {
            name: format!("test_{}_{}", self.function.name, suffix),
            function_name: self.function.name.clone(),
            class_name: self.function.class_name.clone(),
            is_static: self.function.is_static,
            is_async: self.function.is_async,
            category,
            description,
            input_values,
            expected: expected.to_string(),
            assertions: vec![assertion],
            priority,
        }
    }
}

fn valid_inputs(params: &[&Parameter], config: &SynthesisConfig) -> InputValues {
    let mut inputs = InputValues::new();
    for p in params {
        inputs.push(&p.name, config.valid_value(p.type_hint));
    }
    inputs
}

/// Valid defaults everywhere except `target`.
fn substitute(
    params: &[&Parameter],
    config: &SynthesisConfig,
    target: &str,
    value: Value,
) -> InputValues {
    let mut inputs = InputValues::new();
    for p in params {
        if p.name == target {
            inputs.push(&p.name, value.clone());
        } else {
            inputs.push(&p.name, config.valid_value(p.type_hint));
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::model::SemanticType;

    fn param(name: &str, ty: SemanticType, optional: bool) -> Parameter {
        Parameter {
            name: name.to_string(),
            type_hint: ty,
            default_value: optional.then(|| "None".to_string()),
            is_optional: optional,
        }
    }

    fn function(name: &str, parameters: Vec<Parameter>) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            parameters,
            return_type: SemanticType::Any,
            is_async: false,
            is_method: false,
            is_static: false,
            class_name: None,
            docstring: None,
            line_number: 1,
            complexity: 1,
            dependencies: BTreeSet::new(),
        }
    }

    fn count(cases: &[TestCase], category: TestCategory) -> usize {
        cases.iter().filter(|c| c.category == category).count()
    }

    #[test]
    fn zero_parameters_yield_empty_happy_path_and_no_boundaries() {
        let cases = synthesize(&function("ping", vec![]), &SynthesisConfig::default());

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].category, TestCategory::HappyPath);
        assert!(cases[0].input_values.is_empty());
        assert_eq!(cases[0].name, "test_ping_happy_path");
    }

    #[test]
    fn two_number_parameters() {
        let f = function(
            "add",
            vec![
                param("a", SemanticType::Number, false),
                param("b", SemanticType::Number, false),
            ],
        );
        let cases = synthesize(&f, &SynthesisConfig::default());

        assert_eq!(count(&cases, TestCategory::HappyPath), 1);
        assert_eq!(cases[0].input_values.get("a"), Some(&json!(42)));
        assert_eq!(cases[0].input_values.get("b"), Some(&json!(42)));

        let errors: Vec<_> = cases
            .iter()
            .filter(|c| c.category == TestCategory::Error)
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(
            errors,
            vec![
                "test_add_a_null",
                "test_add_a_wrong_type",
                "test_add_b_null",
                "test_add_b_wrong_type"
            ]
        );

        // capped at 5, all taken from `a` in table order
        let boundaries: Vec<_> = cases
            .iter()
            .filter(|c| c.category == TestCategory::Boundary)
            .collect();
        assert_eq!(boundaries.len(), 5);
        assert!(boundaries.iter().all(|c| c.input_values.get("b") == Some(&json!(42))));
        assert_eq!(boundaries[0].input_values.get("a"), Some(&json!(0)));

        assert_eq!(count(&cases, TestCategory::EdgeCase), 0);
    }

    #[test]
    fn required_string_gets_all_five_string_boundaries() {
        let f = function(
            "greet",
            vec![
                param("name", SemanticType::String, false),
                param("loud", SemanticType::Boolean, false),
            ],
        );
        let cases = synthesize(&f, &SynthesisConfig::default());

        let labels: Vec<_> = cases
            .iter()
            .filter(|c| c.category == TestCategory::Boundary)
            .map(|c| {
                assert_eq!(c.input_values.get("loud"), Some(&json!(true)));
                c.name.trim_start_matches("test_greet_name_").to_string()
            })
            .collect();
        assert_eq!(
            labels,
            vec!["empty", "single_char", "long", "special_chars", "whitespace"]
        );
    }

    #[test]
    fn async_with_optional_string() {
        let mut f = function("fetch", vec![param("url", SemanticType::String, true)]);
        f.is_async = true;

        let cases = synthesize(&f, &SynthesisConfig::default());
        let edges: Vec<_> = cases
            .iter()
            .filter(|c| c.category == TestCategory::EdgeCase)
            .collect();

        assert_eq!(edges.len(), 3);
        assert!(edges[0].input_values.is_empty());
        assert_eq!(edges[1].assertions, vec![Assertion::Resolves]);
        assert_eq!(edges[2].assertions, vec![Assertion::Rejects]);
        assert_eq!(edges[2].input_values.get("url"), Some(&Value::Null));
        assert_eq!(count(&cases, TestCategory::Error), 2);
        assert_eq!(count(&cases, TestCategory::Boundary), 5);
    }

    #[test]
    fn receivers_and_private_names() {
        let mut method = function(
            "area",
            vec![
                param("self", SemanticType::Any, false),
                param("scale", SemanticType::Number, false),
            ],
        );
        method.is_method = true;
        method.class_name = Some("Shape".into());

        let cases = synthesize(&method, &SynthesisConfig::default());
        assert!(cases.iter().all(|c| !c.input_values.contains("self")));
        assert!(cases.iter().all(|c| c.class_name.as_deref() == Some("Shape")));

        assert!(synthesize(&function("_hidden", vec![]), &SynthesisConfig::default()).is_empty());
        assert_eq!(
            synthesize(&function("__call__", vec![]), &SynthesisConfig::default()).len(),
            1
        );
    }

    #[test]
    fn complexity_threshold_is_configurable() {
        let mut f = function("route", vec![]);
        f.complexity = 6;

        let cases = synthesize(&f, &SynthesisConfig::default());
        assert!(matches!(
            cases.last().map(|c| &c.assertions[0]),
            Some(Assertion::Manual(_))
        ));

        let config = SynthesisConfig {
            complexity_threshold: 10,
            ..SynthesisConfig::default()
        };
        assert_eq!(count(&synthesize(&f, &config), TestCategory::EdgeCase), 0);
    }

    #[test]
    fn untyped_parameters_skip_mismatch_case() {
        let f = function("apply", vec![param("thing", SemanticType::Any, false)]);
        let cases = synthesize(&f, &SynthesisConfig::default());

        assert_eq!(count(&cases, TestCategory::Error), 1);
        assert_eq!(cases[0].input_values.get("thing"), Some(&json!("test_input")));
    }
}
