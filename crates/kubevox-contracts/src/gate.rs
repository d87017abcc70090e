//! Confirmation gate verdict and context types.
//!
//! The orchestrator consults a gate policy between argument validation and
//! adapter invocation. The dispatcher itself never looks at these types; it
//! only carries the `mutating` flag the gate needs.

use serde::{Deserialize, Serialize};

use crate::invocation::BoundArguments;

/// The decision a gate policy emits for one prepared call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateVerdict {
    /// Run the operation.
    Proceed,

    /// Never run the operation.
    Refuse {
        /// Spoken back to the user.
        reason: String,
    },

    /// Ask the user before running the operation.
    RequireConfirmation {
        /// Included in the confirmation prompt.
        reason: String,
    },
}

/// Everything a gate policy may inspect.
///
/// Arguments are already typed and defaulted, so a rule can match on
/// `namespace = "default"` even when the model omitted the namespace.
#[derive(Debug, Clone)]
pub struct GateContext<'a> {
    pub operation: &'a str,
    pub mutating: bool,
    pub arguments: &'a BoundArguments,
}
