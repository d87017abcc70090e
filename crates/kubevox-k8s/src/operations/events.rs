//! Recent cluster events.

use serde_json::json;

use kubevox_contracts::invocation::{BoundArguments, ResultFields};

use super::fields;
use crate::{
    access::ClusterAccess,
    error::ClusterError,
    models::{Event, List},
};

const MAX_EVENTS: i64 = 50;

pub(crate) async fn last_events(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let wanted = args.get_i64("count").unwrap_or(4).clamp(1, MAX_EVENTS) as usize;

    let (client, _) = access.connect().await?;
    let events: List<Event> = client.get_json("/api/v1/events", &[]).await?;
    let latest = newest_first(events.items, wanted);

    Ok(fields([
        ("count", json!(latest.len())),
        ("event_summary", json!(summarize(&latest))),
    ]))
}

/// The `limit` most recent events. Events without any timestamp sort last.
fn newest_first(mut events: Vec<Event>, limit: usize) -> Vec<Event> {
    events.sort_by(|a, b| b.when().cmp(&a.when()));
    events.truncate(limit);
    events
}

fn summarize(events: &[Event]) -> String {
    if events.is_empty() {
        return "none".to_string();
    }
    events
        .iter()
        .map(|e| {
            format!(
                "{}: {}",
                e.reason.as_deref().unwrap_or("Unknown"),
                e.message.as_deref().unwrap_or("").trim()
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn events() -> Vec<Event> {
        serde_json::from_value(json!([
            { "reason": "Pulled", "message": "Pulled image nginx",
              "lastTimestamp": "2024-05-01T10:00:00Z" },
            { "reason": "BackOff", "message": "Back-off restarting failed container\n",
              "lastTimestamp": "2024-05-01T10:05:00Z" },
            { "reason": "Scheduled", "message": "Assigned web-1 to node-a",
              "eventTime": "2024-05-01T10:03:00.123456Z" },
            { "reason": "Orphan", "message": "no time at all" }
        ]))
        .unwrap()
    }

    #[test]
    fn newest_first_orders_and_limits() {
        let latest = newest_first(events(), 2);
        let reasons: Vec<_> = latest.iter().map(|e| e.reason.clone().unwrap()).collect();
        assert_eq!(reasons, vec!["BackOff", "Scheduled"]);
    }

    #[test]
    fn untimed_events_sort_last() {
        let latest = newest_first(events(), 10);
        assert_eq!(latest.last().unwrap().reason.as_deref(), Some("Orphan"));
    }

    #[test]
    fn summary_joins_reason_and_message() {
        let latest = newest_first(events(), 2);
        assert_eq!(
            summarize(&latest),
            "BackOff: Back-off restarting failed container; Scheduled: Assigned web-1 to node-a"
        );
        assert_eq!(summarize(&[]), "none");
    }
}
