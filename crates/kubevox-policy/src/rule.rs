//! Gate rule types and configuration schema.
//!
//! A `GateConfig` is deserialized from TOML and holds an ordered list of
//! `GateRule`s. Rules are evaluated in declaration order; the first
//! matching rule wins. If no rule matches, the gate refuses by default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use kubevox_contracts::gate::GateContext;

/// The decision a rule produces when it matches a prepared call.
///
/// Expressed as a kebab-case string in TOML:
/// ```toml
/// verdict = "proceed"
/// verdict = "refuse"
/// verdict = "require-confirmation"
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleVerdict {
    Proceed,
    Refuse,
    RequireConfirmation,
}

/// A single gate rule loaded from TOML.
///
/// A rule matches when every filter it declares matches:
/// - `operation` is the exact operation name, or `"*"` for any operation;
/// - `mutating`, when present, must equal the operation's mutating flag;
/// - each `arguments` entry must equal the bound argument of that name
///   (rendered as text). An argument that is not bound never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateRule {
    /// Stable identifier used in log lines and default reasons.
    pub id: String,

    pub description: String,

    pub operation: String,

    #[serde(default)]
    pub mutating: Option<bool>,

    #[serde(default)]
    pub arguments: BTreeMap<String, String>,

    pub verdict: RuleVerdict,

    /// Spoken to the user on refusal, or shown in the confirmation prompt.
    #[serde(default)]
    pub reason: Option<String>,
}

impl GateRule {
    pub fn matches(&self, ctx: &GateContext<'_>) -> bool {
        if self.operation != "*" && self.operation != ctx.operation {
            return false;
        }
        if self.mutating.is_some_and(|m| m != ctx.mutating) {
            return false;
        }
        self.arguments.iter().all(|(name, expected)| {
            ctx.arguments
                .get(name)
                .is_some_and(|actual| actual.to_string() == *expected)
        })
    }
}

/// The top-level structure deserialized from a TOML gate policy file.
///
/// ```toml
/// [[rules]]
/// id = "confirm-deletes"
/// description = "Deleting a pod needs a spoken yes"
/// operation = "delete_pod"
/// verdict = "require-confirmation"
/// reason = "deleting a pod"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Ordered list of rules. First match wins.
    #[serde(default)]
    pub rules: Vec<GateRule>,
}
