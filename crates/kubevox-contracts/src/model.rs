//! Language-model boundary types.

use serde::{Deserialize, Serialize};

use crate::invocation::InvocationRequest;

/// One exported catalog entry in function-calling form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the parameters.
    pub parameters: serde_json::Value,
}

/// What the model answered for one transcript.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// The model proposed a function call.
    Invocation(InvocationRequest),
    /// The model answered in plain text; no operation applies.
    Text(String),
}

/// One utterance of recorded audio handed to a transcriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// Encoded audio (WAV).
    pub bytes: Vec<u8>,
    /// File name reported to the transcription backend.
    pub file_name: String,
}
