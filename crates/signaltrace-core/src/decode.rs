//! Incremental NDJSON decode with carry-over buffering.
//!
//! Chunks arrive with no alignment to line or JSON boundaries; the decoder
//! buffers bytes until a full `\n`-terminated line is available and keeps the
//! trailing fragment for the next chunk. Splitting at newline bytes (never
//! mid-line) means UTF-8 sequences broken across chunks reassemble intact.
//!
//! This is a pure state machine with no I/O so it can be tested independently
//! of any transport; the async read loop lives in [`crate::consumer`].

use serde::Deserialize;
use tracing::warn;

use crate::verdict::Verdict;

/// Stream metadata record, always the first line of a well-formed stream.
///
/// `count` is the number of entries the backend will actually attempt; a
/// count smaller than the submitted batch means trailing entries will never
/// receive a verdict in this run.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct StreamMeta {
    /// Number of entries the backend will process
    pub count: usize,
}

/// One decoded NDJSON record
#[derive(Debug, Clone, PartialEq)]
pub enum StreamRecord {
    /// `{"type":"meta","count":N}`
    Meta(StreamMeta),
    /// A per-entry classification verdict
    Verdict(Verdict),
}

/// Incremental NDJSON line decoder
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every record completed by it.
    ///
    /// The final (possibly incomplete) fragment is retained as the new
    /// buffer.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(record) = parse_line(&line) {
                records.push(record);
            }
        }
        records
    }

    /// Flush the residual buffer as one final line at end of stream.
    pub fn finish(mut self) -> Option<StreamRecord> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        let line = String::from_utf8_lossy(&rest);
        parse_line(&line)
    }
}

/// Parse one NDJSON line into a record.
///
/// Blank lines, markdown fences and bare language tags are skipped silently
/// (model backends are told not to emit them; tolerated defensively). A line
/// that fails JSON parse is dropped with a warning — one bad line never
/// aborts the stream. Verdict identities are passed through unvalidated;
/// membership checks belong to the orchestrator.
fn parse_line(line: &str) -> Option<StreamRecord> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("```") || trimmed == "ndjson" {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(err) => {
            warn!(%err, line = trimmed, "dropping malformed NDJSON line");
            return None;
        }
    };

    // A meta record is never a verdict, even if it also fits the verdict shape.
    if value.get("type").and_then(|t| t.as_str()) == Some("meta") {
        return match serde_json::from_value::<StreamMeta>(value) {
            Ok(meta) => Some(StreamRecord::Meta(meta)),
            Err(err) => {
                warn!(%err, line = trimmed, "dropping malformed meta line");
                None
            }
        };
    }

    match serde_json::from_value::<Verdict>(value) {
        Ok(verdict) => Some(StreamRecord::Verdict(verdict)),
        Err(err) => {
            warn!(%err, line = trimmed, "dropping unrecognized NDJSON line");
            None
        }
    }
}
