//! TOML-driven gate policy implementation.
//!
//! `TomlGatePolicy` loads a `GateConfig` from a TOML string or file and
//! implements the `GatePolicy` trait from kubevox-core.
//!
//! Evaluation algorithm:
//!
//! 1. Iterate rules in declaration order.
//! 2. For the first rule whose filters match, convert its `RuleVerdict` to a
//!    `GateVerdict` and return.
//! 3. If no rule matched → `Refuse` with "refused by default".

use std::path::Path;

use tracing::{debug, warn};

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    gate::{GateContext, GateVerdict},
};
use kubevox_core::traits::GatePolicy;

use crate::rule::{GateConfig, RuleVerdict};

/// A `GatePolicy` implementation that reads rules from a TOML document.
///
/// ```rust,ignore
/// use kubevox_policy::TomlGatePolicy;
///
/// let gate = TomlGatePolicy::from_file(Path::new("policies/default.toml"))?;
/// ```
#[derive(Debug)]
pub struct TomlGatePolicy {
    config: GateConfig,
}

impl TomlGatePolicy {
    /// Parse `s` as TOML and build a `TomlGatePolicy`.
    ///
    /// Returns `KubevoxError::ConfigError` if the TOML is malformed or does
    /// not match the `GateConfig` schema.
    pub fn from_toml_str(s: &str) -> KubevoxResult<Self> {
        let config: GateConfig = toml::from_str(s).map_err(|e| KubevoxError::ConfigError {
            reason: format!("failed to parse gate policy TOML: {}", e),
        })?;
        Ok(Self { config })
    }

    pub fn from_file(path: &Path) -> KubevoxResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| KubevoxError::ConfigError {
            reason: format!("failed to read gate policy '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn rules(&self) -> usize {
        self.config.rules.len()
    }
}

impl GatePolicy for TomlGatePolicy {
    fn evaluate(&self, ctx: &GateContext<'_>) -> KubevoxResult<GateVerdict> {
        debug!(
            operation = %ctx.operation,
            mutating = ctx.mutating,
            "evaluating gate"
        );

        let Some(rule) = self.config.rules.iter().find(|rule| rule.matches(ctx)) else {
            warn!(
                operation = %ctx.operation,
                "no gate rule matched; refusing by default"
            );
            return Ok(GateVerdict::Refuse {
                reason: format!(
                    "refused by default: no gate rule matched operation '{}'",
                    ctx.operation
                ),
            });
        };

        debug!(rule_id = %rule.id, operation = %ctx.operation, "rule matched");

        Ok(match rule.verdict {
            RuleVerdict::Proceed => GateVerdict::Proceed,
            RuleVerdict::Refuse => GateVerdict::Refuse {
                reason: rule
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("refused by rule '{}'", rule.id)),
            },
            RuleVerdict::RequireConfirmation => GateVerdict::RequireConfirmation {
                reason: rule
                    .reason
                    .clone()
                    .unwrap_or_else(|| format!("confirmation required by rule '{}'", rule.id)),
            },
        })
    }
}
