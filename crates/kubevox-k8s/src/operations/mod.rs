//! The built-in KubeVox operation catalog.
//!
//! Each `Builtin` variant is one operation: its descriptor (name, parameters,
//! response template, mutating flag) and the result fields its adapter
//! returns. `builtin_catalog` registers all of them, in declaration order,
//! behind a single `ClusterInvoker` type.

mod contexts;
mod events;
mod inventory;
mod logs;
mod workloads;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use kubevox_contracts::{
    error::KubevoxResult,
    failure::ExecutionFailure,
    invocation::{BoundArguments, ResultFields},
    operation::{OperationDescriptor, ParamSpec, ParamType, ParamValue},
};
use kubevox_core::{store::OperationStore, traits::Invoker};

use crate::{access::ClusterAccess, client::validate_name, error::ClusterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    NodeCount,
    PodCount,
    NamespaceCount,
    ListPods,
    AnalyzeDeploymentLogs,
    VersionInfo,
    LatestVersion,
    AvailableClusters,
    SwitchCluster,
    ClusterName,
    LastEvents,
    ClusterStatus,
    DeletePod,
    RestartDeployment,
    ScaleDeployment,
}

impl Builtin {
    /// Registration order.
    pub const ALL: [Builtin; 15] = [
        Builtin::NodeCount,
        Builtin::PodCount,
        Builtin::NamespaceCount,
        Builtin::ListPods,
        Builtin::AnalyzeDeploymentLogs,
        Builtin::VersionInfo,
        Builtin::LatestVersion,
        Builtin::AvailableClusters,
        Builtin::SwitchCluster,
        Builtin::ClusterName,
        Builtin::LastEvents,
        Builtin::ClusterStatus,
        Builtin::DeletePod,
        Builtin::RestartDeployment,
        Builtin::ScaleDeployment,
    ];

    pub fn result_fields(self) -> &'static [&'static str] {
        match self {
            Builtin::NodeCount => &["node_count"],
            Builtin::PodCount => &["pod_count", "namespace_info"],
            Builtin::NamespaceCount => &["namespace_count"],
            Builtin::ListPods => &["pod_names", "pod_count"],
            Builtin::AnalyzeDeploymentLogs => {
                &["critical_count", "error_count", "warning_count", "pods_analyzed"]
            }
            Builtin::VersionInfo => &["api_version", "node_versions"],
            Builtin::LatestVersion => &["latest_stable_version"],
            Builtin::AvailableClusters => &["total_clusters", "active_cluster", "cluster_names"],
            Builtin::SwitchCluster | Builtin::ClusterName => &["cluster_name"],
            Builtin::LastEvents => &["count", "event_summary"],
            Builtin::ClusterStatus => &["status_summary", "ready_nodes", "running_pods"],
            Builtin::DeletePod | Builtin::ScaleDeployment => &[],
            Builtin::RestartDeployment => &["restarted_at"],
        }
    }

    pub fn descriptor(self) -> OperationDescriptor {
        match self {
            Builtin::NodeCount => OperationDescriptor::new(
                "get_number_of_nodes",
                "Get the number of nodes in the Kubernetes cluster.",
                "The cluster has {node_count} nodes.",
            ),
            Builtin::PodCount => OperationDescriptor::new(
                "get_number_of_pods",
                "Get the number of pods in the Kubernetes cluster, \
                 optionally filtered by namespace.",
                "There are {pod_count} pods{namespace_info}.",
            )
            .param(ParamSpec::optional(
                "namespace",
                ParamType::String,
                "Namespace to filter pods. Omit to count pods across all namespaces.",
                None,
            )),
            Builtin::NamespaceCount => OperationDescriptor::new(
                "get_number_of_namespaces",
                "Get the number of namespaces in the Kubernetes cluster.",
                "The cluster contains {namespace_count} namespaces.",
            ),
            Builtin::ListPods => OperationDescriptor::new(
                "list_pods",
                "List the names of the pods in a namespace.",
                "Pods in {namespace}: {pod_names}.",
            )
            .param(namespace_param("Namespace to list pods in.")),
            Builtin::AnalyzeDeploymentLogs => OperationDescriptor::new(
                "analyze_deployment_logs",
                "Analyze the last hour of logs from all pods in a deployment \
                 for criticals, errors and warnings.",
                "Deployment '{deployment_name}' in namespace '{namespace}' logged \
                 {critical_count} critical, {error_count} error and {warning_count} warning \
                 lines across {pods_analyzed} pods in the last hour.",
            )
            .param(ParamSpec::required(
                "deployment_name",
                ParamType::String,
                "Name of the deployment to analyze.",
            ))
            .param(namespace_param("Namespace of the deployment.")),
            Builtin::VersionInfo => OperationDescriptor::new(
                "get_version_info",
                "Get version information for both the Kubernetes API server and the nodes.",
                "API server version is {api_version}. Node versions: {node_versions}.",
            ),
            Builtin::LatestVersion => OperationDescriptor::new(
                "get_kubernetes_latest_version_information",
                "Retrieve the latest stable Kubernetes release version.",
                "Latest Kubernetes stable version is {latest_stable_version}.",
            ),
            Builtin::AvailableClusters => OperationDescriptor::new(
                "get_available_clusters",
                "Get a list of all available Kubernetes clusters from the kubeconfig.",
                "Found {total_clusters} clusters: {cluster_names}. \
                 Active cluster is '{active_cluster}'.",
            ),
            Builtin::SwitchCluster => OperationDescriptor::new(
                "switch_cluster",
                "Switch to a different Kubernetes cluster context and persist the change.",
                "Switched to cluster '{cluster_name}'.",
            )
            .param(ParamSpec::required(
                "cluster_name",
                ParamType::String,
                "Name of the cluster context to switch to.",
            ))
            .mutating(),
            Builtin::ClusterName => OperationDescriptor::new(
                "get_cluster_name",
                "Get the name of the current Kubernetes cluster.",
                "Current cluster is '{cluster_name}'.",
            ),
            Builtin::LastEvents => OperationDescriptor::new(
                "get_last_events",
                "Retrieve the messages of the most recent events in the cluster.",
                "The last {count} events: {event_summary}.",
            )
            .param(ParamSpec::optional(
                "count",
                ParamType::Integer,
                "Number of events to retrieve.",
                Some(ParamValue::Integer(4)),
            )),
            Builtin::ClusterStatus => OperationDescriptor::new(
                "get_cluster_status",
                "Get detailed status information about the Kubernetes cluster.",
                "Cluster status: {status_summary}.",
            ),
            Builtin::DeletePod => OperationDescriptor::new(
                "delete_pod",
                "Delete a pod so its controller replaces it.",
                "Deleted pod '{pod_name}' in namespace '{namespace}'.",
            )
            .param(ParamSpec::required("pod_name", ParamType::String, "Name of the pod to delete."))
            .param(namespace_param("Namespace of the pod."))
            .mutating(),
            Builtin::RestartDeployment => OperationDescriptor::new(
                "restart_deployment",
                "Trigger a rolling restart of a deployment.",
                "Restarted deployment '{deployment_name}' in namespace '{namespace}' \
                 at {restarted_at}.",
            )
            .param(ParamSpec::required(
                "deployment_name",
                ParamType::String,
                "Name of the deployment to restart.",
            ))
            .param(namespace_param("Namespace of the deployment."))
            .mutating(),
            Builtin::ScaleDeployment => OperationDescriptor::new(
                "scale_deployment",
                "Scale a deployment to a number of replicas.",
                "Scaled deployment '{deployment_name}' in namespace '{namespace}' \
                 to {replicas} replicas.",
            )
            .param(ParamSpec::required(
                "deployment_name",
                ParamType::String,
                "Name of the deployment to scale.",
            ))
            .param(ParamSpec::required(
                "replicas",
                ParamType::Integer,
                "Desired number of replicas.",
            ))
            .param(namespace_param("Namespace of the deployment."))
            .mutating(),
        }
    }
}

fn namespace_param(description: &str) -> ParamSpec {
    ParamSpec::optional(
        "namespace",
        ParamType::String,
        description,
        Some(ParamValue::from("default")),
    )
}

/// The adapter behind every built-in operation.
pub struct ClusterInvoker {
    operation: Builtin,
    access: Arc<ClusterAccess>,
}

impl ClusterInvoker {
    pub fn new(operation: Builtin, access: Arc<ClusterAccess>) -> Self {
        Self { operation, access }
    }
}

#[async_trait]
impl Invoker for ClusterInvoker {
    fn result_fields(&self) -> &[&'static str] {
        self.operation.result_fields()
    }

    async fn invoke(&self, args: &BoundArguments) -> Result<ResultFields, ExecutionFailure> {
        let access = self.access.as_ref();
        let outcome = match self.operation {
            Builtin::NodeCount => inventory::node_count(access).await,
            Builtin::PodCount => inventory::pod_count(access, args).await,
            Builtin::NamespaceCount => inventory::namespace_count(access).await,
            Builtin::ListPods => inventory::list_pods(access, args).await,
            Builtin::AnalyzeDeploymentLogs => logs::analyze_deployment_logs(access, args).await,
            Builtin::VersionInfo => inventory::version_info(access).await,
            Builtin::LatestVersion => inventory::latest_version(access).await,
            Builtin::AvailableClusters => contexts::available_clusters(access).await,
            Builtin::SwitchCluster => contexts::switch_cluster(access, args).await,
            Builtin::ClusterName => contexts::cluster_name(access).await,
            Builtin::LastEvents => events::last_events(access, args).await,
            Builtin::ClusterStatus => inventory::cluster_status(access).await,
            Builtin::DeletePod => workloads::delete_pod(access, args).await,
            Builtin::RestartDeployment => workloads::restart_deployment(access, args).await,
            Builtin::ScaleDeployment => workloads::scale_deployment(access, args).await,
        };
        outcome.map_err(ExecutionFailure::from)
    }
}

/// Register every built-in operation against `access`.
pub fn builtin_catalog(access: Arc<ClusterAccess>) -> KubevoxResult<OperationStore> {
    let mut store = OperationStore::new();
    for op in Builtin::ALL {
        store.register(
            op.descriptor(),
            Arc::new(ClusterInvoker::new(op, Arc::clone(&access))),
        )?;
    }
    Ok(store)
}

// ── Argument helpers ─────────────────────────────────────────────────────────

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> ResultFields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn str_arg<'a>(args: &'a BoundArguments, name: &'static str) -> Result<&'a str, ClusterError> {
    args.get_str(name)
        .ok_or(ClusterError::MissingArgument { name })
}

/// The bound namespace, checked for use in a request path.
fn namespace_arg(args: &BoundArguments) -> Result<&str, ClusterError> {
    let namespace = str_arg(args, "namespace")?;
    validate_name("namespace", namespace)?;
    Ok(namespace)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kubevox_core::catalog;

    use super::{builtin_catalog, Builtin};
    use crate::access::{ClusterAccess, ClusterSettings};

    fn access() -> Arc<ClusterAccess> {
        Arc::new(ClusterAccess::new(ClusterSettings::default()).unwrap())
    }

    #[test]
    fn builtin_catalog_registers_cleanly_in_order() {
        let store = builtin_catalog(access()).unwrap();
        assert_eq!(store.len(), Builtin::ALL.len());

        let names: Vec<&str> = store.all().map(|d| d.name.as_str()).collect();
        assert_eq!(names[0], "get_number_of_nodes");
        assert_eq!(names[3], "list_pods");
        assert_eq!(names[14], "scale_deployment");
    }

    #[test]
    fn mutating_flags() {
        let store = builtin_catalog(access()).unwrap();
        let mutating: Vec<&str> = store
            .all()
            .filter(|d| d.mutating)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            mutating,
            vec!["switch_cluster", "delete_pod", "restart_deployment", "scale_deployment"]
        );
    }

    #[test]
    fn exported_catalog_marks_required_parameters() {
        let store = builtin_catalog(access()).unwrap();
        let specs = catalog::export(&store);
        let scale = specs.iter().find(|s| s.name == "scale_deployment").unwrap();
        assert_eq!(
            scale.parameters["required"],
            serde_json::json!(["deployment_name", "replicas"])
        );
        assert_eq!(
            scale.parameters["properties"]["namespace"]["default"],
            "default"
        );
    }
}
