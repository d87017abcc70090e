//! The operation descriptor store: the closed catalog of permitted actions.
//!
//! Registration happens once, in a fixed order, during single-threaded
//! start-up (`register` takes `&mut self`). Afterwards the store is wrapped
//! in an `Arc` and shared read-only by the dispatcher and the exporter.
//!
//! Every descriptor is checked when it is registered:
//!
//! 1. The name must not already be in the catalog.
//! 2. Parameter names are unique, enums are non-empty, and defaults have the
//!    declared type (required parameters may not declare one).
//! 3. The response template parses, and each placeholder names either a
//!    result field the invoker declares or a parameter that is always bound.

use std::{collections::HashMap, collections::HashSet, sync::Arc};

use tracing::debug;

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    operation::{OperationDescriptor, ParamType},
};

use crate::{template, traits::Invoker};

/// A descriptor together with the adapter that executes it.
pub(crate) struct Registration {
    pub(crate) descriptor: OperationDescriptor,
    pub(crate) invoker: Arc<dyn Invoker>,
}

/// Ordered, name-indexed catalog of operations.
#[derive(Default)]
pub struct OperationStore {
    entries: Vec<Registration>,
    index: HashMap<String, usize>,
}

impl OperationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `descriptor` to the catalog, bound to `invoker`.
    ///
    /// # Errors
    ///
    /// `DuplicateOperation`, `InvalidParameter`, or `InvalidTemplate` as
    /// described in the module docs. A rejected descriptor leaves the store
    /// unchanged.
    pub fn register(
        &mut self,
        descriptor: OperationDescriptor,
        invoker: Arc<dyn Invoker>,
    ) -> KubevoxResult<()> {
        if self.index.contains_key(&descriptor.name) {
            return Err(KubevoxError::DuplicateOperation {
                name: descriptor.name,
            });
        }

        validate_parameters(&descriptor)?;
        validate_template(&descriptor, invoker.result_fields())?;

        debug!(
            operation = %descriptor.name,
            parameters = descriptor.parameters.len(),
            mutating = descriptor.mutating,
            "operation registered"
        );

        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Registration {
            descriptor,
            invoker,
        });
        Ok(())
    }

    /// Find a descriptor by exact name.
    pub fn lookup(&self, name: &str) -> KubevoxResult<&OperationDescriptor> {
        self.entry(name)
            .map(|r| &r.descriptor)
            .ok_or_else(|| KubevoxError::NotFound {
                name: name.to_string(),
            })
    }

    /// All descriptors in registration order.
    pub fn all(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.entries.iter().map(|r| &r.descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry(&self, name: &str) -> Option<&Registration> {
        self.index.get(name).map(|&i| &self.entries[i])
    }
}

fn validate_parameters(descriptor: &OperationDescriptor) -> KubevoxResult<()> {
    let invalid = |parameter: &str, reason: String| KubevoxError::InvalidParameter {
        operation: descriptor.name.clone(),
        parameter: parameter.to_string(),
        reason,
    };

    let mut seen = HashSet::new();
    for spec in &descriptor.parameters {
        if !seen.insert(spec.name.as_str()) {
            return Err(invalid(&spec.name, "declared more than once".to_string()));
        }
        if matches!(&spec.param_type, ParamType::Enum(values) if values.is_empty()) {
            return Err(invalid(&spec.name, "enum declares no allowed values".to_string()));
        }
        if let Some(default) = &spec.default {
            if spec.required {
                return Err(invalid(
                    &spec.name,
                    "required parameter cannot declare a default".to_string(),
                ));
            }
            if !spec.param_type.accepts(default) {
                return Err(invalid(
                    &spec.name,
                    format!(
                        "default '{}' is not a valid {}",
                        default,
                        spec.param_type.describe()
                    ),
                ));
            }
        }
    }
    Ok(())
}

fn validate_template(
    descriptor: &OperationDescriptor,
    result_fields: &[&str],
) -> KubevoxResult<()> {
    let segments =
        template::parse(&descriptor.response_template).map_err(|reason| {
            KubevoxError::InvalidTemplate {
                operation: descriptor.name.clone(),
                reason,
            }
        })?;

    for placeholder in template::placeholders(&segments) {
        let is_result_field = result_fields.contains(&placeholder);
        let is_bound_param = descriptor
            .parameter(placeholder)
            .is_some_and(|p| p.always_bound());
        if !is_result_field && !is_bound_param {
            return Err(KubevoxError::InvalidTemplate {
                operation: descriptor.name.clone(),
                reason: format!(
                    "placeholder '{placeholder}' is neither a declared result field \
                     nor an always-bound parameter"
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kubevox_contracts::{
        error::KubevoxError,
        operation::{OperationDescriptor, ParamSpec, ParamType, ParamValue},
    };

    use super::OperationStore;
    use crate::test_support::MockInvoker;

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

    // ── register / lookup ────────────────────────────────────────────────────

    #[test]
    fn register_then_lookup() {
        let mut store = OperationStore::new();
        store
            .register(list_pods(), Arc::new(MockInvoker::new(&["podNames"])))
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("listPods").unwrap().name, "listPods");
    }

    #[test]
    fn lookup_is_exact_match() {
        let mut store = OperationStore::new();
        store
            .register(list_pods(), Arc::new(MockInvoker::new(&["podNames"])))
            .unwrap();

        match store.lookup("listpods") {
            Err(KubevoxError::NotFound { name }) => assert_eq!(name, "listpods"),
            other => panic!("expected NotFound, got {:?}", other.map(|d| &d.name)),
        }
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mut store = OperationStore::new();
        store
            .register(list_pods(), Arc::new(MockInvoker::new(&["podNames"])))
            .unwrap();
        let err = store
            .register(list_pods(), Arc::new(MockInvoker::new(&["podNames"])))
            .unwrap_err();

        assert!(matches!(err, KubevoxError::DuplicateOperation { name } if name == "listPods"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn all_preserves_registration_order() {
        let mut store = OperationStore::new();
        for name in ["b_op", "a_op", "c_op"] {
            store
                .register(
                    OperationDescriptor::new(name, "d", "ok"),
                    Arc::new(MockInvoker::new(&[])),
                )
                .unwrap();
        }
        let names: Vec<&str> = store.all().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b_op", "a_op", "c_op"]);
    }

    // ── template validation ──────────────────────────────────────────────────

    #[test]
    fn placeholder_unknown_to_invoker_is_rejected() {
        let mut store = OperationStore::new();
        // Invoker does not declare podNames.
        let err = store
            .register(list_pods(), Arc::new(MockInvoker::new(&["pod_count"])))
            .unwrap_err();

        match err {
            KubevoxError::InvalidTemplate { operation, reason } => {
                assert_eq!(operation, "listPods");
                assert!(reason.contains("podNames"), "reason: {reason}");
            }
            other => panic!("expected InvalidTemplate, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn placeholder_on_optional_param_without_default_is_rejected() {
        let desc = OperationDescriptor::new("count_pods", "d", "{pod_count} pods in {namespace}")
            .param(ParamSpec::optional("namespace", ParamType::String, "ns", None));

        let mut store = OperationStore::new();
        let err = store
            .register(desc, Arc::new(MockInvoker::new(&["pod_count"])))
            .unwrap_err();
        assert!(matches!(err, KubevoxError::InvalidTemplate { .. }));
    }

    #[test]
    fn placeholder_on_required_param_is_accepted() {
        let desc = OperationDescriptor::new("delete_pod", "d", "Deleted {pod_name}.")
            .param(ParamSpec::required("pod_name", ParamType::String, "pod"))
            .mutating();

        let mut store = OperationStore::new();
        store
            .register(desc, Arc::new(MockInvoker::new(&[])))
            .unwrap();
        assert!(store.lookup("delete_pod").unwrap().mutating);
    }

    #[test]
    fn malformed_template_is_rejected() {
        let desc = OperationDescriptor::new("broken", "d", "Count: {count");
        let mut store = OperationStore::new();
        let err = store
            .register(desc, Arc::new(MockInvoker::new(&["count"])))
            .unwrap_err();
        assert!(matches!(err, KubevoxError::InvalidTemplate { .. }));
    }

    // ── parameter validation ─────────────────────────────────────────────────

    #[test]
    fn default_of_wrong_type_is_rejected() {
        let desc = OperationDescriptor::new("events", "d", "ok").param(ParamSpec::optional(
            "count",
            ParamType::Integer,
            "n",
            Some(ParamValue::from("four")),
        ));
        let mut store = OperationStore::new();
        let err = store
            .register(desc, Arc::new(MockInvoker::new(&[])))
            .unwrap_err();
        assert!(matches!(
            err,
            KubevoxError::InvalidParameter { ref parameter, .. } if parameter == "count"
        ));
    }

    #[test]
    fn enum_default_outside_allowed_set_is_rejected() {
        let desc = OperationDescriptor::new("pods_by_phase", "d", "ok").param(ParamSpec::optional(
            "phase",
            ParamType::one_of(["Running", "Pending"]),
            "phase",
            Some(ParamValue::from("Failed")),
        ));
        let mut store = OperationStore::new();
        assert!(store
            .register(desc, Arc::new(MockInvoker::new(&[])))
            .is_err());
    }

    #[test]
    fn duplicate_parameter_name_is_rejected() {
        let desc = OperationDescriptor::new("dup", "d", "ok")
            .param(ParamSpec::required("name", ParamType::String, "a"))
            .param(ParamSpec::required("name", ParamType::String, "b"));
        let mut store = OperationStore::new();
        let err = store
            .register(desc, Arc::new(MockInvoker::new(&[])))
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn empty_enum_is_rejected() {
        let desc = OperationDescriptor::new("e", "d", "ok").param(ParamSpec::required(
            "mode",
            ParamType::Enum(vec![]),
            "m",
        ));
        let mut store = OperationStore::new();
        assert!(store
            .register(desc, Arc::new(MockInvoker::new(&[])))
            .is_err());
    }
}
