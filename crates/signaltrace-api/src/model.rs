//! Model backend client (OpenAI-compatible chat completions).
//!
//! The classification prompt renders the exact six-step policy from
//! [`signaltrace_core::rules`] so the model's output is expected to match the
//! local rule engine verbatim in precedence, not merely approximate it.

use futures_util::stream::{self, BoxStream};
use futures_util::{StreamExt, TryStreamExt};
use serde_json::json;
use signaltrace_core::{LogEntry, TraceError};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Client for a streaming chat-completions backend
#[derive(Clone)]
pub struct ModelClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ModelClient {
    /// Create a client for the given backend
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// Open a streaming completion and yield content deltas as they arrive.
    ///
    /// Chunks carry server-sent events with no alignment to token or line
    /// boundaries; [`SseDecoder`] reassembles them.
    pub async fn stream_tokens(
        &self,
        system: &str,
        prompt: &str,
    ) -> ApiResult<BoxStream<'static, Result<String, TraceError>>> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
                "stream": true,
            }))
            .send()
            .await
            .map_err(|err| ApiError::Model(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Model(format!("backend returned HTTP {status}")));
        }
        debug!(model = %self.model, "model token stream opened");

        let mut decoder = SseDecoder::default();
        let tokens = response
            .bytes_stream()
            .map_err(TraceError::from)
            .flat_map(move |chunk| {
                let items: Vec<Result<String, TraceError>> = match chunk {
                    Ok(bytes) => decoder.push(&bytes).into_iter().map(Ok).collect(),
                    Err(err) => vec![Err(err)],
                };
                stream::iter(items)
            });
        Ok(tokens.boxed())
    }

    /// Run a non-streaming completion and return the message content.
    pub async fn complete(&self, system: &str, prompt: &str) -> ApiResult<String> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": prompt },
                ],
            }))
            .send()
            .await
            .map_err(|err| ApiError::Model(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Model(format!("backend returned HTTP {status}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ApiError::Model(err.to_string()))?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Model("completion had no content".to_string()))
    }
}

/// Incremental decoder for `text/event-stream` chat-completion chunks.
///
/// Keeps a carry-over byte buffer, emits the `delta.content` of each complete
/// `data:` event, and ignores keepalives and the `[DONE]` sentinel.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Append a chunk and return the content deltas it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(delta) = parse_event_line(line.trim_end_matches('\r')) {
                deltas.push(delta);
            }
        }
        deltas
    }
}

fn parse_event_line(line: &str) -> Option<String> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return None;
    }
    let event: serde_json::Value = match serde_json::from_str(payload) {
        Ok(v) => v,
        Err(err) => {
            warn!(%err, "dropping malformed SSE event");
            return None;
        }
    };
    event["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_string)
}

/// System message for classification runs
pub const CLASSIFICATION_SYSTEM: &str =
    "You are a cybersecurity expert. Stream analysis results as NDJSON.";

/// System message for remediation runs
pub const REMEDIATION_SYSTEM: &str =
    "You are a security expert. Provide actionable remediation steps.";

/// Render the classification prompt for a batch of entries.
///
/// The decision tree here is the remote rendering of the local rule table;
/// the two must stay in lockstep.
pub fn classification_prompt(entries: &[LogEntry]) -> String {
    let logs = serde_json::to_string(entries).unwrap_or_default();
    format!(
        r#"You are a Senior SOC Analyst. Your job is to flag security anomalies in web proxy logs.

OUTPUT FORMAT REQUIREMENT:
- Return ONLY raw JSON objects separated by newlines (NDJSON).
- DO NOT use markdown code blocks.
- DO NOT include any introductory or concluding text.
- Each line must be a single, valid JSON object.

Analyze each log entry step-by-step:

STEP 1: CHECK MITIGATION (HIGHEST PRIORITY)
- If Action is "Block", the threat is MITIGATED.
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 0, "reason": "Threat mitigated by perimeter controls (CATEGORY). Action was blocked." }}
- Substitute CATEGORY with the entry's ThreatCategory, or "Policy" when it is "None".
- STOP.

STEP 2: CHECK SHADOW IT (CRITICAL)
- If AppName contains "Tor", "BitTorrent", "Psiphon" AND Action is "Allow".
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 100, "reason": "CRITICAL: Unauthorized Shadow IT application allowed through firewall." }}
- STOP.

STEP 3: CHECK DATA EXFILTRATION
- If BytesSent > 10,000,000 (10MB) AND Action is "Allow".
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 85, "reason": "Large outbound data transfer (>10MB) to unverified destination." }}
- STOP.

STEP 4: CHECK KNOWN THREATS
- If ThreatCategory is NOT "None" AND Action is "Allow".
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 95, "reason": "Known threat category allowed through firewall." }}
- STOP.

STEP 5: CHECK SUSPICIOUS CLIENTS
- If UserAgent contains "python", "curl", "powershell" AND Action is "Allow".
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 75, "reason": "Suspicious scripted access detected." }}
- STOP.

DEFAULT:
- Return {{ "id": "LOG_ENTRY_ID", "confidence": 0, "reason": "Traffic appears normal." }}

Logs to Analyze:
{logs}"#
    )
}

/// Render the remediation prompt for one flagged entry.
pub fn remediation_prompt(log: &LogEntry, reason: &str) -> String {
    let entry = serde_json::to_string(log).unwrap_or_default();
    format!(
        "You are a Senior Security Incident Responder.\n\
         Analyze the following security anomaly and provide a concise, actionable \
         1-2 paragraph remediation plan for a SOC team.\n\n\
         LOG ENTRY:\n{entry}\n\n\
         AI REASONING FOR ANOMALY:\n{reason}\n\n\
         Provide ONLY the remediation text. No introductory or concluding remarks."
    )
}
