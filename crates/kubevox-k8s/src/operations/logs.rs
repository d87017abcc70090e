//! Deployment log analysis.

use serde_json::json;
use tracing::warn;

use kubevox_contracts::invocation::{BoundArguments, ResultFields};

use super::{fields, namespace_arg, str_arg};
use crate::{
    access::ClusterAccess,
    client::validate_name,
    error::ClusterError,
    models::{List, Pod},
};

/// Window of logs inspected per pod.
const SINCE_SECONDS: u64 = 3600;

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct LevelCounts {
    pub critical: usize,
    pub error: usize,
    pub warning: usize,
}

impl LevelCounts {
    /// Count raw occurrences of each marker, the way `grep -o` would.
    pub fn scan(logs: &str) -> Self {
        Self {
            critical: logs.matches("CRITICAL").count(),
            error: logs.matches("ERROR").count(),
            warning: logs.matches("WARNING").count(),
        }
    }

    fn add(&mut self, other: LevelCounts) {
        self.critical += other.critical;
        self.error += other.error;
        self.warning += other.warning;
    }
}

pub(crate) async fn analyze_deployment_logs(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let deployment = str_arg(args, "deployment_name")?;
    let namespace = namespace_arg(args)?;
    validate_name("deployment", deployment)?;

    let (client, _) = access.connect().await?;
    let pods: List<Pod> = client
        .get_json(
            &format!("/api/v1/namespaces/{namespace}/pods"),
            &[("labelSelector", format!("app={deployment}"))],
        )
        .await?;

    let mut totals = LevelCounts::default();
    let mut analyzed = 0usize;
    for pod in &pods.items {
        let path = format!("/api/v1/namespaces/{namespace}/pods/{}/log", pod.metadata.name);
        match client
            .get_text(&path, &[("sinceSeconds", SINCE_SECONDS.to_string())])
            .await
        {
            Ok(logs) => {
                totals.add(LevelCounts::scan(&logs));
                analyzed += 1;
            }
            Err(e) => warn!(
                pod = %pod.metadata.name,
                error = %e,
                "skipping pod whose logs cannot be read"
            ),
        }
    }

    Ok(fields([
        ("critical_count", json!(totals.critical)),
        ("error_count", json!(totals.error)),
        ("warning_count", json!(totals.warning)),
        ("pods_analyzed", json!(analyzed)),
    ]))
}

#[cfg(test)]
mod tests {
    use super::LevelCounts;

    #[test]
    fn scan_counts_each_marker() {
        let logs = "\
2024-05-01T10:00:00Z INFO started
2024-05-01T10:00:01Z WARNING cache cold
2024-05-01T10:00:02Z ERROR upstream timeout
2024-05-01T10:00:03Z ERROR upstream timeout
2024-05-01T10:00:04Z CRITICAL out of memory
";
        assert_eq!(
            LevelCounts::scan(logs),
            LevelCounts {
                critical: 1,
                error: 2,
                warning: 1
            }
        );
    }

    #[test]
    fn scan_is_case_sensitive() {
        assert_eq!(LevelCounts::scan("error warning critical"), LevelCounts::default());
    }

    #[test]
    fn add_accumulates() {
        let mut total = LevelCounts::scan("ERROR");
        total.add(LevelCounts::scan("ERROR WARNING"));
        assert_eq!(total.error, 2);
        assert_eq!(total.warning, 1);
    }
}
