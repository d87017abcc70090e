//! Read-only cluster inventory: counts, listings, versions, and status.

use serde_json::{json, Value};

use kubevox_contracts::invocation::{BoundArguments, ResultFields};

use super::{fields, namespace_arg};
use crate::{
    access::ClusterAccess,
    client::validate_name,
    error::ClusterError,
    models::{List, Namespace, Node, Pod, VersionInfo},
};

pub(crate) async fn node_count(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let (client, _) = access.connect().await?;
    let nodes: List<Node> = client.get_json("/api/v1/nodes", &[]).await?;
    Ok(fields([("node_count", json!(nodes.items.len()))]))
}

pub(crate) async fn pod_count(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let namespace = args.get_str("namespace").filter(|ns| !ns.is_empty());
    let (client, _) = access.connect().await?;

    let pods: List<Pod> = match namespace {
        Some(ns) => {
            validate_name("namespace", ns)?;
            client
                .get_json(&format!("/api/v1/namespaces/{ns}/pods"), &[])
                .await?
        }
        None => client.get_json("/api/v1/pods", &[]).await?,
    };

    Ok(fields([
        ("pod_count", json!(pods.items.len())),
        ("namespace_info", json!(namespace_info(namespace))),
    ]))
}

pub(crate) async fn namespace_count(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let (client, _) = access.connect().await?;
    let namespaces: List<Namespace> = client.get_json("/api/v1/namespaces", &[]).await?;
    Ok(fields([("namespace_count", json!(namespaces.items.len()))]))
}

pub(crate) async fn list_pods(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let namespace = namespace_arg(args)?;
    let (client, _) = access.connect().await?;
    let pods: List<Pod> = client
        .get_json(&format!("/api/v1/namespaces/{namespace}/pods"), &[])
        .await?;

    let mut names: Vec<String> = pods.items.into_iter().map(|p| p.metadata.name).collect();
    names.sort();
    Ok(fields([
        ("pod_count", json!(names.len())),
        ("pod_names", json!(names)),
    ]))
}

pub(crate) async fn version_info(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let (client, _) = access.connect().await?;
    let version: VersionInfo = client.get_json("/version", &[]).await?;
    let nodes: List<Node> = client.get_json("/api/v1/nodes", &[]).await?;

    Ok(fields([
        ("api_version", json!(version.git_version)),
        ("node_versions", node_versions(&nodes.items)),
    ]))
}

pub(crate) async fn latest_version(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let version = access
        .latest_stable_version()
        .await
        .unwrap_or_else(|| "Unknown".to_string());
    Ok(fields([("latest_stable_version", json!(version))]))
}

pub(crate) async fn cluster_status(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let (client, _) = access.connect().await?;
    let nodes: List<Node> = client.get_json("/api/v1/nodes", &[]).await?;
    let pods: List<Pod> = client.get_json("/api/v1/pods", &[]).await?;

    let status = StatusCounts::of(&nodes.items, &pods.items);
    Ok(fields([
        ("status_summary", json!(status.summary())),
        ("ready_nodes", json!(status.ready_nodes)),
        ("running_pods", json!(status.running_pods)),
    ]))
}

fn namespace_info(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!(" in namespace '{ns}'"),
        None => " across all namespaces".to_string(),
    }
}

/// Distinct kubelet versions, in first-seen order.
fn node_versions(nodes: &[Node]) -> Value {
    let mut versions: Vec<&str> = Vec::new();
    for node in nodes {
        let v = node.status.node_info.kubelet_version.as_str();
        if !v.is_empty() && !versions.contains(&v) {
            versions.push(v);
        }
    }
    json!(versions)
}

#[derive(Debug, PartialEq, Eq)]
struct StatusCounts {
    nodes: usize,
    ready_nodes: usize,
    pods: usize,
    running_pods: usize,
}

impl StatusCounts {
    fn of(nodes: &[Node], pods: &[Pod]) -> Self {
        Self {
            nodes: nodes.len(),
            ready_nodes: nodes.iter().filter(|n| n.is_ready()).count(),
            pods: pods.len(),
            running_pods: pods.iter().filter(|p| p.is_running()).count(),
        }
    }

    fn summary(&self) -> String {
        format!(
            "{} nodes ({} ready), {} pods ({} running)",
            self.nodes, self.ready_nodes, self.pods, self.running_pods
        )
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn nodes() -> Vec<Node> {
        serde_json::from_value(json!([
            { "metadata": { "name": "a" }, "status": {
                "conditions": [
                    { "type": "MemoryPressure", "status": "False" },
                    { "type": "Ready", "status": "True" }
                ],
                "nodeInfo": { "kubeletVersion": "v1.29.2" } } },
            { "metadata": { "name": "b" }, "status": {
                "conditions": [{ "type": "Ready", "status": "Unknown" }],
                "nodeInfo": { "kubeletVersion": "v1.29.2" } } },
            { "metadata": { "name": "c" }, "status": {
                "conditions": [{ "type": "Ready", "status": "True" }],
                "nodeInfo": { "kubeletVersion": "v1.28.7" } } }
        ]))
        .unwrap()
    }

    fn pods() -> Vec<Pod> {
        serde_json::from_value(json!([
            { "metadata": { "name": "web-1" }, "status": { "phase": "Running" } },
            { "metadata": { "name": "web-2" }, "status": { "phase": "Pending" } },
            { "metadata": { "name": "job-1" }, "status": {} }
        ]))
        .unwrap()
    }

    #[test]
    fn status_counts_ready_nodes_and_running_pods() {
        let counts = StatusCounts::of(&nodes(), &pods());
        assert_eq!(
            counts,
            StatusCounts {
                nodes: 3,
                ready_nodes: 2,
                pods: 3,
                running_pods: 1
            }
        );
        assert_eq!(counts.summary(), "3 nodes (2 ready), 3 pods (1 running)");
    }

    #[test]
    fn node_versions_are_deduplicated() {
        assert_eq!(node_versions(&nodes()), json!(["v1.29.2", "v1.28.7"]));
    }

    #[test]
    fn namespace_info_phrases() {
        assert_eq!(namespace_info(Some("web")), " in namespace 'web'");
        assert_eq!(namespace_info(None), " across all namespaces");
    }

    #[test]
    fn list_decodes_missing_items_as_empty() {
        let list: List<Pod> = serde_json::from_value(json!({ "kind": "PodList" })).unwrap();
        assert!(list.items.is_empty());
    }
}
