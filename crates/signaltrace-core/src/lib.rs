//! SignalTrace Core - traffic log anomaly classification
//!
//! This crate provides the classification decision policy and the streaming
//! plumbing around it:
//! - Rule engine: one fixed priority policy mapping a log entry to a verdict
//! - Incremental NDJSON decode with carry-over buffering
//! - Async stream consumer with cooperative cancellation
//! - Analysis orchestration: fast-path split, result merge, one run at a time
//!
//! The same six-step policy is applied whether classification happens locally
//! or by the remote model backend; conformance tests in both crates validate
//! the two paths against shared fixtures.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod consumer;
pub mod decode;
pub mod entry;
pub mod error;
pub mod rules;
pub mod session;
pub mod verdict;

pub use client::HttpVerdictSource;
pub use consumer::{consume_stream, StreamOutcome};
pub use decode::{NdjsonDecoder, StreamMeta, StreamRecord};
pub use entry::{Action, LogEntry};
pub use error::{TraceError, TraceResult};
pub use rules::{classify, DISALLOWED_APPS, EXFIL_BYTES_THRESHOLD, SCRIPTED_AGENT_MARKERS};
pub use session::{AnalysisSession, RunHandle, RunReport, RunStatus, VerdictSource, VerdictStream};
pub use verdict::{Verdict, ANOMALY_THRESHOLD};
