//! Response renderer: turns an `InvocationResult` into one spoken sentence.

use serde_json::Value;

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    failure::FailureDetail,
    invocation::InvocationResult,
    operation::OperationDescriptor,
};

use crate::template::{self, Segment};

/// Render the descriptor's template for a successful result, or the fixed
/// failure phrase otherwise.
///
/// Placeholders resolve against result fields first, then bound arguments.
///
/// # Errors
///
/// `TemplateResolution` when a placeholder has no value, and
/// `InvalidTemplate` when the template does not parse. Registration rejects
/// both, so either one signals a catalog defect.
pub fn render(
    descriptor: &OperationDescriptor,
    result: &InvocationResult,
) -> KubevoxResult<String> {
    let Some(fields) = result.fields() else {
        // Failures never use the template.
        return Ok(result
            .error_detail()
            .map(failure_phrase)
            .unwrap_or_default());
    };

    let segments =
        template::parse(&descriptor.response_template).map_err(|reason| {
            KubevoxError::InvalidTemplate {
                operation: descriptor.name.clone(),
                reason,
            }
        })?;

    let mut out = String::with_capacity(descriptor.response_template.len());
    for segment in &segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Placeholder(name) => {
                if let Some(value) = fields.get(name) {
                    out.push_str(&render_value(value));
                } else if let Some(value) = result.arguments.get(name) {
                    out.push_str(&value.to_string());
                } else {
                    return Err(KubevoxError::TemplateResolution {
                        operation: descriptor.name.clone(),
                        placeholder: name.clone(),
                    });
                }
            }
        }
    }
    Ok(out)
}

/// The fixed sentence spoken for any failed invocation.
pub fn failure_phrase(detail: FailureDetail<'_>) -> String {
    format!("Sorry, that request failed: {}.", detail.summary())
}

/// Textual form of one result value.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "none".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.is_empty() => "none".to_string(),
        Value::Array(items) => items
            .iter()
            .map(render_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use kubevox_contracts::{
        error::KubevoxError,
        failure::{ExecutionFailure, ValidationFailure},
        invocation::{BoundArguments, InvocationResult, Outcome, RequestId},
        operation::{OperationDescriptor, ParamSpec, ParamType, ParamValue},
    };

    use super::{render, render_value};
    use crate::test_support::fields;

    fn list_pods() -> OperationDescriptor {
        OperationDescriptor::new("listPods", "List pods", "Pods in {namespace}: {podNames}").param(
            ParamSpec::optional(
                "namespace",
                ParamType::String,
                "Namespace",
                Some(ParamValue::from("default")),
            ),
        )
    }

    fn result(arguments: BoundArguments, outcome: Outcome) -> InvocationResult {
        InvocationResult {
            request_id: RequestId::new(),
            operation: "listPods".to_string(),
            mutating: false,
            arguments,
            outcome,
        }
    }

    fn default_namespace() -> BoundArguments {
        let mut args = BoundArguments::new();
        args.bind("namespace", ParamValue::from("default"));
        args
    }

    /// Scenario A: bound default and array field together.
    #[test]
    fn fills_from_fields_and_arguments() {
        let r = result(
            default_namespace(),
            Outcome::Success {
                fields: fields(&[("podNames", json!(["nginx-1", "nginx-2"]))]),
            },
        );
        assert_eq!(
            render(&list_pods(), &r).unwrap(),
            "Pods in default: nginx-1, nginx-2"
        );
    }

    #[test]
    fn result_field_wins_over_argument() {
        let r = result(
            default_namespace(),
            Outcome::Success {
                fields: fields(&[("namespace", json!("all")), ("podNames", json!("x"))]),
            },
        );
        assert_eq!(render(&list_pods(), &r).unwrap(), "Pods in all: x");
    }

    #[test]
    fn rendered_output_has_no_placeholder_text() {
        let r = result(
            default_namespace(),
            Outcome::Success {
                fields: fields(&[("podNames", json!([]))]),
            },
        );
        let text = render(&list_pods(), &r).unwrap();
        assert!(!text.contains('{') && !text.contains('}'), "{text}");
        assert_eq!(text, "Pods in default: none");
    }

    #[test]
    fn escaped_braces_render_literally() {
        let desc = OperationDescriptor::new("braces", "d", "{{{count}}} items");
        let r = result(
            BoundArguments::new(),
            Outcome::Success {
                fields: fields(&[("count", json!(3))]),
            },
        );
        assert_eq!(render(&desc, &r).unwrap(), "{3} items");
    }

    #[test]
    fn missing_value_is_a_resolution_error() {
        let r = result(
            BoundArguments::new(),
            Outcome::Success {
                fields: fields(&[("podNames", json!("x"))]),
            },
        );
        match render(&list_pods(), &r) {
            Err(KubevoxError::TemplateResolution { placeholder, .. }) => {
                assert_eq!(placeholder, "namespace");
            }
            other => panic!("expected TemplateResolution, got {other:?}"),
        }
    }

    // ── failures ─────────────────────────────────────────────────────────────

    /// Scenario C: the phrase carries the adapter detail, not the template.
    #[test]
    fn execution_failure_uses_fixed_phrase() {
        let r = result(
            default_namespace(),
            Outcome::ExecutionFailed {
                failure: ExecutionFailure::PermissionDenied {
                    reason: "pods is forbidden".to_string(),
                },
            },
        );
        let text = render(&list_pods(), &r).unwrap();
        assert!(text.starts_with("Sorry, that request failed: "), "{text}");
        assert!(text.contains("pods is forbidden"), "{text}");
        assert!(!text.contains("Pods in"));
    }

    #[test]
    fn validation_failure_names_the_parameter() {
        let r = result(
            BoundArguments::new(),
            Outcome::ValidationFailed {
                failure: ValidationFailure::MissingParameter {
                    parameter: "podName".to_string(),
                },
            },
        );
        assert_eq!(
            render(&list_pods(), &r).unwrap(),
            "Sorry, that request failed: missing required parameter 'podName'."
        );
    }

    // ── value rendering ──────────────────────────────────────────────────────

    #[test]
    fn values_render_textually() {
        assert_eq!(render_value(&json!("v1.29.2")), "v1.29.2");
        assert_eq!(render_value(&json!(12)), "12");
        assert_eq!(render_value(&json!(true)), "true");
        assert_eq!(render_value(&json!(null)), "none");
        assert_eq!(render_value(&json!([1, "a"])), "1, a");
        assert_eq!(render_value(&json!({"name": "prod"})), r#"{"name":"prod"}"#);
    }
}
