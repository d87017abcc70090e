//! The KubeVox dispatcher: validates one model proposal and runs it.
//!
//! The dispatcher enforces the command pipeline's safety model:
//!
//!   Resolve → Validate → Bind defaults → [Invoker::invoke] → Collect
//!
//! The security invariant is structural: `Invoker::invoke()` is only
//! reachable through a `PreparedCall`, and a `PreparedCall` can only be built
//! by `prepare()` after the operation name resolved against the catalog and
//! every argument was coerced to its declared type.
//!
//! No failure escapes `dispatch()`: unknown operations, bad arguments,
//! adapter errors, timeouts and adapter panics all come back as a tagged
//! `InvocationResult`. Nothing is retried.

use std::{sync::Arc, time::Duration, time::Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use kubevox_contracts::{
    failure::{ExecutionFailure, ValidationFailure},
    invocation::{BoundArguments, InvocationRequest, InvocationResult, Outcome, RequestId},
    operation::{OperationDescriptor, ParamSpec, ParamType, ParamValue},
};

use crate::{store::OperationStore, traits::Invoker};

/// Tunables for the invoke step.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Upper bound on one adapter call. Expiry yields `ExecutionFailed/Timeout`.
    pub invoke_timeout: Duration,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            invoke_timeout: Duration::from_secs(10),
        }
    }
}

/// A fully validated call, ready to run.
///
/// Produced only by `Dispatcher::prepare`. The orchestrator may inspect it
/// (for example to apply a confirmation gate) before handing it to
/// `Dispatcher::execute`.
pub struct PreparedCall {
    pub request_id: RequestId,
    pub operation: String,
    pub mutating: bool,
    pub arguments: BoundArguments,
    invoker: Arc<dyn Invoker>,
}

/// A proposal that failed steps 1–3.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub request_id: RequestId,
    pub operation: String,
    pub mutating: bool,
    pub failure: ValidationFailure,
}

impl From<Rejection> for InvocationResult {
    fn from(rejection: Rejection) -> Self {
        InvocationResult {
            request_id: rejection.request_id,
            operation: rejection.operation,
            mutating: rejection.mutating,
            arguments: BoundArguments::new(),
            outcome: Outcome::ValidationFailed {
                failure: rejection.failure,
            },
        }
    }
}

/// Validates and executes model proposals against a shared catalog.
pub struct Dispatcher {
    store: Arc<OperationStore>,
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(store: Arc<OperationStore>, options: DispatchOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &Arc<OperationStore> {
        &self.store
    }

    /// Validate and execute one proposal.
    pub async fn dispatch(&self, request: &InvocationRequest) -> InvocationResult {
        match self.prepare(request) {
            Ok(call) => self.execute(call).await,
            Err(rejection) => rejection.into(),
        }
    }

    /// Steps 1–3: resolve, validate, bind defaults. Pure; touches no adapter.
    pub fn prepare(&self, request: &InvocationRequest) -> Result<PreparedCall, Rejection> {
        let request_id = RequestId::new();

        // ── Step 1: Resolve against the catalog ──────────────────────────────
        //
        // The model is never trusted to name a real action on its own.
        let Some(entry) = self.store.entry(&request.operation_name) else {
            warn!(
                request_id = %request_id,
                operation = %request.operation_name,
                "model proposed an operation outside the catalog"
            );
            return Err(Rejection {
                request_id,
                operation: request.operation_name.clone(),
                mutating: false,
                failure: ValidationFailure::UnknownOperation {
                    name: request.operation_name.clone(),
                },
            });
        };
        let descriptor = &entry.descriptor;

        // ── Steps 2 & 3: Validate, coerce, bind defaults ─────────────────────
        match bind_arguments(descriptor, &request.arguments) {
            Ok(arguments) => {
                debug!(
                    request_id = %request_id,
                    operation = %descriptor.name,
                    bound = arguments.len(),
                    "arguments validated"
                );
                Ok(PreparedCall {
                    request_id,
                    operation: descriptor.name.clone(),
                    mutating: descriptor.mutating,
                    arguments,
                    invoker: Arc::clone(&entry.invoker),
                })
            }
            Err(failure) => {
                warn!(
                    request_id = %request_id,
                    operation = %descriptor.name,
                    tag = failure.tag(),
                    detail = %failure,
                    "argument validation failed"
                );
                Err(Rejection {
                    request_id,
                    operation: descriptor.name.clone(),
                    mutating: descriptor.mutating,
                    failure,
                })
            }
        }
    }

    /// Steps 4–5: invoke the adapter under the timeout and collect the result.
    ///
    /// The adapter runs on its own task so a panic or a hang is contained.
    /// On timeout the task is aborted; adapters without native cancellation
    /// may still finish in the background, but the caller is never blocked
    /// past the bound.
    pub async fn execute(&self, call: PreparedCall) -> InvocationResult {
        let PreparedCall {
            request_id,
            operation,
            mutating,
            arguments,
            invoker,
        } = call;

        info!(
            request_id = %request_id,
            operation = %operation,
            mutating,
            "invoking adapter"
        );

        let started = Instant::now();
        let task_arguments = arguments.clone();
        let mut handle = tokio::spawn(async move { invoker.invoke(&task_arguments).await });

        let outcome = match tokio::time::timeout(self.options.invoke_timeout, &mut handle).await {
            Ok(Ok(Ok(fields))) => Outcome::Success { fields },
            Ok(Ok(Err(failure))) => Outcome::ExecutionFailed { failure },
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "adapter panicked".to_string()
                } else {
                    "adapter task was cancelled".to_string()
                };
                Outcome::ExecutionFailed {
                    failure: ExecutionFailure::Unknown { reason },
                }
            }
            Err(_) => {
                handle.abort();
                Outcome::ExecutionFailed {
                    failure: ExecutionFailure::Timeout {
                        after_ms: self.options.invoke_timeout.as_millis() as u64,
                    },
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Outcome::Success { fields } => info!(
                request_id = %request_id,
                operation = %operation,
                fields = fields.len(),
                elapsed_ms,
                "adapter succeeded"
            ),
            Outcome::ExecutionFailed { failure } => warn!(
                request_id = %request_id,
                operation = %operation,
                tag = failure.tag(),
                detail = %failure,
                elapsed_ms,
                "adapter failed"
            ),
            Outcome::ValidationFailed { .. } => {}
        }

        InvocationResult {
            request_id,
            operation,
            mutating,
            arguments,
            outcome,
        }
    }
}

/// Validate `raw` against the descriptor's parameters and bind defaults.
///
/// Keys are matched exactly. Extra keys are ignored. A JSON `null` counts as
/// absent.
pub fn bind_arguments(
    descriptor: &OperationDescriptor,
    raw: &Value,
) -> Result<BoundArguments, ValidationFailure> {
    let empty = serde_json::Map::new();
    let supplied = match raw {
        Value::Object(map) => map,
        Value::Null => &empty,
        other => {
            return Err(ValidationFailure::MalformedArguments {
                reason: format!("expected an argument object, got {}", describe_raw(other)),
            })
        }
    };

    let mut bound = BoundArguments::new();
    for spec in &descriptor.parameters {
        match supplied.get(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => bound.bind(spec.name.clone(), coerce(spec, value)?),
            None if spec.required => {
                return Err(ValidationFailure::MissingParameter {
                    parameter: spec.name.clone(),
                })
            }
            None => {
                if let Some(default) = &spec.default {
                    bound.bind(spec.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(bound)
}

fn coerce(spec: &ParamSpec, raw: &Value) -> Result<ParamValue, ValidationFailure> {
    let mismatch = || ValidationFailure::TypeMismatch {
        parameter: spec.name.clone(),
        expected: spec.param_type.describe(),
        actual: describe_raw(raw),
    };

    match &spec.param_type {
        ParamType::String => match raw {
            Value::String(s) => Ok(ParamValue::String(s.clone())),
            Value::Number(n) => Ok(ParamValue::String(n.to_string())),
            Value::Bool(b) => Ok(ParamValue::String(b.to_string())),
            _ => Err(mismatch()),
        },
        ParamType::Integer => match raw {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(whole_i64))
                .map(ParamValue::Integer)
                .ok_or_else(mismatch),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(whole_i64))
                    .map(ParamValue::Integer)
                    .ok_or_else(mismatch)
            }
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match raw {
            Value::Bool(b) => Ok(ParamValue::Boolean(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(ParamValue::Boolean(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(ParamValue::Boolean(false)),
            _ => Err(mismatch()),
        },
        ParamType::Enum(allowed) => match raw {
            Value::String(s) if allowed.iter().any(|a| a == s) => Ok(ParamValue::String(s.clone())),
            _ => Err(mismatch()),
        },
    }
}

/// Models often write counts as `4.0`. Accept them when nothing is lost.
fn whole_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    (f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64)
        .then(|| f as i64)
}

/// Short description of a raw JSON value for mismatch messages.
fn describe_raw(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
