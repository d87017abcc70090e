//! llama.cpp server client: maps a transcript onto the function catalog.
//!
//! Talks to the server's OpenAI-compatible `/v1/chat/completions` endpoint
//! with the exported catalog as `tools`. The reply is either a native tool
//! call, a Llama 3.x pythonic call written into the message content
//! (`[name(key="value")]`), or plain text.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    invocation::InvocationRequest,
    model::{FunctionSpec, ModelReply},
};
use kubevox_core::traits::LanguageModel;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are KubeVox, a voice assistant for a Kubernetes \
cluster. Answer every request by calling exactly one of the provided functions. \
Only use the functions and parameter names you were given. \
If no function fits the request, reply briefly in plain text without calling any function.";

#[derive(Debug, Clone)]
pub struct LlamaConfig {
    /// Server root, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Model name sent in the request body. llama.cpp ignores it.
    pub model: String,
    pub temperature: f32,
    pub request_timeout: Duration,
    pub system_prompt: String,
}

impl Default for LlamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            model: "local".to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(60),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlamaClient {
    http: reqwest::Client,
    cfg: LlamaConfig,
}

impl LlamaClient {
    pub fn new(cfg: LlamaConfig) -> KubevoxResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| KubevoxError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, cfg })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url.trim_end_matches('/'), path)
    }

    /// Query the server's `/health` endpoint.
    pub async fn check_health(&self) -> KubevoxResult<()> {
        let resp = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(|e| KubevoxError::Model {
                reason: format!("failed to connect to llama server at {}: {e}", self.cfg.base_url),
            })?;
        if resp.status().is_success() {
            debug!(url = %self.cfg.base_url, "llama server is healthy");
            Ok(())
        } else {
            Err(KubevoxError::Model {
                reason: format!("llama server returned status {}", resp.status().as_u16()),
            })
        }
    }

    /// The chat-completions request body for one transcript.
    pub fn request_body(&self, transcript: &str, catalog: &[FunctionSpec]) -> Value {
        json!({
            "model": self.cfg.model,
            "messages": [
                { "role": "system", "content": self.cfg.system_prompt },
                { "role": "user", "content": transcript },
            ],
            "tools": tools(catalog),
            "tool_choice": "auto",
            "temperature": self.cfg.temperature,
        })
    }
}

#[async_trait]
impl LanguageModel for LlamaClient {
    async fn propose(
        &self,
        transcript: &str,
        catalog: &[FunctionSpec],
    ) -> KubevoxResult<ModelReply> {
        let url = self.url("/v1/chat/completions");
        debug!(url = %url, functions = catalog.len(), "POST chat completion");

        let resp = self
            .http
            .post(&url)
            .json(&self.request_body(transcript, catalog))
            .send()
            .await
            .map_err(|e| KubevoxError::Model {
                reason: format!("chat completion request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(KubevoxError::Model {
                reason: format!(
                    "chat completion returned status {}: {}",
                    status.as_u16(),
                    body.trim()
                ),
            });
        }

        let body: Value = resp.json().await.map_err(|e| KubevoxError::Model {
            reason: format!("failed to parse chat completion JSON: {e}"),
        })?;
        parse_reply(&body)
    }
}

/// The catalog in OpenAI `tools` form.
pub fn tools(catalog: &[FunctionSpec]) -> Value {
    Value::Array(
        catalog
            .iter()
            .map(|f| {
                json!({
                    "type": "function",
                    "function": {
                        "name": f.name,
                        "description": f.description,
                        "parameters": f.parameters,
                    }
                })
            })
            .collect(),
    )
}

/// Interpret a chat-completions response body.
pub fn parse_reply(body: &Value) -> KubevoxResult<ModelReply> {
    let message = body
        .pointer("/choices/0/message")
        .ok_or_else(|| KubevoxError::Model {
            reason: "response has no choices[0].message".to_string(),
        })?;

    if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
        if let Some(first) = calls.first() {
            if calls.len() > 1 {
                warn!(count = calls.len(), "model proposed several calls; using the first");
            }
            return tool_call(first).map(ModelReply::Invocation);
        }
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if content.is_empty() {
        return Err(KubevoxError::Model {
            reason: "model returned neither a tool call nor text".to_string(),
        });
    }

    if let Some(request) = parse_pythonic_call(content) {
        debug!(operation = %request.operation_name, "parsed pythonic tool call from content");
        return Ok(ModelReply::Invocation(request));
    }
    Ok(ModelReply::Text(content.to_string()))
}

fn tool_call(call: &Value) -> KubevoxResult<InvocationRequest> {
    let function = call.get("function").ok_or_else(|| KubevoxError::Model {
        reason: "tool call has no function".to_string(),
    })?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| KubevoxError::Model {
            reason: "tool call has no function name".to_string(),
        })?;

    // Unparseable argument strings are kept raw so dispatch rejects them
    // as malformed instead of the turn failing here.
    let arguments = match function.get("arguments") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(raw)) if raw.trim().is_empty() => Value::Object(Map::new()),
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
    };
    Ok(InvocationRequest::new(name, arguments))
}

// ── Pythonic call syntax ─────────────────────────────────────────────────────

/// Parse `[name(key="value", n=3)]` (brackets optional). The whole content
/// must be a call; prose that merely mentions one is not parsed.
pub fn parse_pythonic_call(content: &str) -> Option<InvocationRequest> {
    let content = content.trim().trim_start_matches("<|python_tag|>").trim();
    let mut p = Cursor::new(content);

    let bracketed = p.eat('[');
    let request = p.call()?;
    if bracketed {
        let mut extra = 0;
        while p.eat(',') {
            p.call()?;
            extra += 1;
        }
        if !p.eat(']') {
            return None;
        }
        if extra > 0 {
            warn!(count = extra + 1, "model proposed several calls; using the first");
        }
    }
    p.skip_ws();
    p.at_end().then_some(request)
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Cursor<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if_eq(&expected).is_some()
    }

    fn at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }

    fn ident(&mut self) -> Option<String> {
        self.skip_ws();
        let mut out = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_alphanumeric() || *c == '_') {
            out.push(c);
        }
        (!out.is_empty() && !out.starts_with(|c: char| c.is_ascii_digit())).then_some(out)
    }

    fn call(&mut self) -> Option<InvocationRequest> {
        let name = self.ident()?;
        if !self.eat('(') {
            return None;
        }
        let mut arguments = Map::new();
        if !self.eat(')') {
            loop {
                let key = self.ident()?;
                if !self.eat('=') {
                    return None;
                }
                let value = self.value()?;
                arguments.insert(key, value);
                if self.eat(')') {
                    break;
                }
                if !self.eat(',') {
                    return None;
                }
            }
        }
        Some(InvocationRequest::new(name, Value::Object(arguments)))
    }

    fn value(&mut self) -> Option<Value> {
        self.skip_ws();
        match *self.chars.peek()? {
            q @ ('"' | '\'') => {
                self.chars.next();
                let mut out = String::new();
                loop {
                    match self.chars.next()? {
                        '\\' => out.push(self.chars.next()?),
                        c if c == q => break,
                        c => out.push(c),
                    }
                }
                Some(Value::String(out))
            }
            _ => {
                let mut raw = String::new();
                while let Some(c) = self
                    .chars
                    .next_if(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '+' | '.' | '_'))
                {
                    raw.push(c);
                }
                match raw.as_str() {
                    "" => None,
                    "True" | "true" => Some(Value::Bool(true)),
                    "False" | "false" => Some(Value::Bool(false)),
                    "None" | "null" => Some(Value::Null),
                    _ => {
                        if let Ok(n) = raw.parse::<i64>() {
                            Some(json!(n))
                        } else {
                            raw.parse::<f64>().ok().map(|f| json!(f))
                        }
                    }
                }
            }
        }
    }
}
