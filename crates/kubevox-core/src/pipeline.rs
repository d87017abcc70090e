//! The pipeline orchestrator: one utterance in, one spoken answer out.
//!
//!   [transcribe] → propose → prepare → gate → [confirm] → execute → render → [speak]
//!
//! Only one utterance is processed at a time. A second utterance submitted
//! while one is in flight is rejected with `KubevoxError::Busy`.

use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    gate::{GateContext, GateVerdict},
    invocation::{BoundArguments, InvocationResult},
    model::{AudioClip, FunctionSpec, ModelReply},
};

use crate::{
    catalog,
    dispatch::Dispatcher,
    render::{failure_phrase, render},
    traits::{Confirmer, GatePolicy, LanguageModel, Speaker, Transcriber},
};

const RENDER_APOLOGY: &str = "Sorry, I could not put the answer into words.";

/// How one utterance was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The model answered in plain text; nothing was dispatched.
    Answered,
    /// The proposal went through dispatch (successfully or not).
    Dispatched(InvocationResult),
    /// The gate refused the prepared call.
    Refused { operation: String, reason: String },
    /// The user declined a confirmation prompt.
    Declined { operation: String },
}

/// The record of one processed utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub transcript: String,
    pub response: String,
    pub outcome: TurnOutcome,
}

/// Drives one utterance through the model, the gate, and the dispatcher.
pub struct Pipeline {
    dispatcher: Dispatcher,
    model: Box<dyn LanguageModel>,
    gate: Box<dyn GatePolicy>,
    confirmer: Box<dyn Confirmer>,
    transcriber: Option<Box<dyn Transcriber>>,
    speaker: Option<Box<dyn Speaker>>,
    catalog: Vec<FunctionSpec>,
    busy: Mutex<()>,
}

impl Pipeline {
    /// Build a text-only pipeline. The function catalog is exported once here.
    pub fn new(
        dispatcher: Dispatcher,
        model: Box<dyn LanguageModel>,
        gate: Box<dyn GatePolicy>,
        confirmer: Box<dyn Confirmer>,
    ) -> Self {
        let catalog = catalog::export(dispatcher.store());
        Self {
            dispatcher,
            model,
            gate,
            confirmer,
            transcriber: None,
            speaker: None,
            catalog,
            busy: Mutex::new(()),
        }
    }

    pub fn with_transcriber(mut self, transcriber: Box<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_speaker(mut self, speaker: Box<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    /// The function catalog handed to the model on every turn.
    pub fn catalog(&self) -> &[FunctionSpec] {
        &self.catalog
    }

    /// Process one text utterance. Blank transcripts yield `Ok(None)`.
    ///
    /// # Errors
    ///
    /// `Busy` when another utterance is in flight, and any error from the
    /// model backend or the gate policy. Dispatch failures are not errors;
    /// they come back as a spoken failure phrase inside the `Turn`.
    pub async fn handle_transcript(&self, transcript: &str) -> KubevoxResult<Option<Turn>> {
        let _guard = self.busy.try_lock().map_err(|_| KubevoxError::Busy)?;
        self.run(transcript).await
    }

    /// Transcribe one audio utterance, then process it as text.
    pub async fn handle_audio(&self, audio: &AudioClip) -> KubevoxResult<Option<Turn>> {
        let _guard = self.busy.try_lock().map_err(|_| KubevoxError::Busy)?;
        let transcriber = self.transcriber.as_ref().ok_or_else(|| KubevoxError::ConfigError {
            reason: "no transcriber configured".to_string(),
        })?;

        let started = Instant::now();
        let transcript = transcriber.transcribe(audio).await?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = transcript.len(),
            "transcription finished"
        );
        self.run(&transcript).await
    }

    async fn run(&self, transcript: &str) -> KubevoxResult<Option<Turn>> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            debug!("ignoring blank transcript");
            return Ok(None);
        }
        info!(transcript = %transcript, "processing utterance");

        let started = Instant::now();
        let reply = self.model.propose(transcript, &self.catalog).await?;
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model replied"
        );

        let (response, outcome) = match reply {
            ModelReply::Text(text) => (text, TurnOutcome::Answered),
            ModelReply::Invocation(request) => {
                debug!(operation = %request.operation_name, "model proposed a call");
                let call = match self.dispatcher.prepare(&request) {
                    Ok(call) => call,
                    Err(rejection) => {
                        let result = InvocationResult::from(rejection);
                        return Ok(Some(self.finish(transcript, result).await));
                    }
                };

                let verdict = self.gate.evaluate(&GateContext {
                    operation: &call.operation,
                    mutating: call.mutating,
                    arguments: &call.arguments,
                })?;

                match verdict {
                    GateVerdict::Proceed => {}
                    GateVerdict::Refuse { reason } => {
                        warn!(operation = %call.operation, reason = %reason, "gate refused call");
                        let response = format!("I can't do that: {reason}.");
                        let outcome = TurnOutcome::Refused {
                            operation: call.operation,
                            reason,
                        };
                        return Ok(Some(self.reply(transcript, response, outcome).await));
                    }
                    GateVerdict::RequireConfirmation { reason } => {
                        let prompt = confirmation_prompt(&call.operation, &call.arguments, &reason);
                        if !self.confirmer.confirm(&prompt).await {
                            info!(operation = %call.operation, "user declined confirmation");
                            let response = format!("Okay, I won't run {}.", call.operation);
                            let outcome = TurnOutcome::Declined {
                                operation: call.operation,
                            };
                            return Ok(Some(self.reply(transcript, response, outcome).await));
                        }
                        info!(operation = %call.operation, "user confirmed call");
                    }
                }

                let result = self.dispatcher.execute(call).await;
                return Ok(Some(self.finish(transcript, result).await));
            }
        };

        Ok(Some(self.reply(transcript, response, outcome).await))
    }

    async fn finish(&self, transcript: &str, result: InvocationResult) -> Turn {
        let response = self.respond(&result);
        self.reply(transcript, response, TurnOutcome::Dispatched(result))
            .await
    }

    fn respond(&self, result: &InvocationResult) -> String {
        if let Some(detail) = result.error_detail() {
            return failure_phrase(detail);
        }
        let rendered = self
            .dispatcher
            .store()
            .lookup(&result.operation)
            .and_then(|descriptor| render(descriptor, result));
        rendered.unwrap_or_else(|e| {
            error!(
                target: "kubevox::render",
                request_id = %result.request_id,
                operation = %result.operation,
                error = %e,
                "response template could not be rendered"
            );
            RENDER_APOLOGY.to_string()
        })
    }

    async fn reply(&self, transcript: &str, response: String, outcome: TurnOutcome) -> Turn {
        if let Some(speaker) = &self.speaker {
            let started = Instant::now();
            match speaker.speak(&response).await {
                Ok(()) => info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "response spoken"
                ),
                Err(e) => warn!(error = %e, "speech output failed"),
            }
        }
        Turn {
            transcript: transcript.to_string(),
            response,
            outcome,
        }
    }
}

fn confirmation_prompt(operation: &str, arguments: &BoundArguments, reason: &str) -> String {
    let args: Vec<String> = arguments.iter().map(|(k, v)| format!("{k}={v}")).collect();
    if args.is_empty() {
        format!("{reason}. Run {operation}?")
    } else {
        format!("{reason}. Run {operation} ({})?", args.join(", "))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
