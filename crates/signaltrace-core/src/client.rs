//! HTTP verdict source backed by the analysis service.

use async_trait::async_trait;
use futures_util::{StreamExt, TryStreamExt};
use serde_json::json;
use tracing::debug;

use crate::entry::LogEntry;
use crate::error::{TraceError, TraceResult};
use crate::session::{VerdictSource, VerdictStream};

/// Streams verdicts from `POST <endpoint>` (`application/x-ndjson` response).
pub struct HttpVerdictSource {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpVerdictSource {
    /// Create a source for the given analyze endpoint,
    /// e.g. `http://127.0.0.1:8088/api/analyze`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl VerdictSource for HttpVerdictSource {
    async fn open(&self, entries: &[LogEntry]) -> TraceResult<VerdictStream> {
        debug!(count = entries.len(), endpoint = %self.endpoint, "opening verdict stream");
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "logs": entries }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TraceError::SourceUnavailable(format!(
                "analysis endpoint returned HTTP {status}"
            )));
        }

        Ok(response
            .bytes_stream()
            .map_err(TraceError::from)
            .boxed())
    }
}
