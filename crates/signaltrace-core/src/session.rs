//! Analysis orchestration: fast-path split, result merging, cancellation.
//!
//! An [`AnalysisSession`] owns the verdict map and pending set for one caller
//! session. Blocked entries are resolved locally (their verdict depends only
//! on already-known fields); allowed entries go to a [`VerdictSource`] and
//! stream back incrementally. One run at a time: a second `start` is rejected
//! until the active run reaches a terminal state.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::consumer::{consume_stream, StreamOutcome};
use crate::entry::{Action, LogEntry};
use crate::error::{TraceError, TraceResult};
use crate::rules::classify;
use crate::verdict::Verdict;

/// Byte stream of NDJSON verdicts from a backend
pub type VerdictStream = BoxStream<'static, Result<Bytes, TraceError>>;

/// Transport abstraction over the streaming classification backend.
#[async_trait]
pub trait VerdictSource: Send + Sync {
    /// Open a verdict stream for the given entries.
    async fn open(&self, entries: &[LogEntry]) -> TraceResult<VerdictStream>;
}

/// How an analysis run terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Stream exhausted (possibly early; unclassified entries stay pending)
    Completed,
    /// Cancelled by the caller; merged results were kept
    Cancelled,
    /// The source could not be opened; the run is incomplete
    SourceFailed,
}

/// Summary of a finished analysis run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal status
    pub status: RunStatus,
    /// Entry count announced by the backend's meta record, if one arrived
    pub announced: Option<usize>,
    /// Verdicts merged from the stream (fast-path verdicts not included)
    pub merged: usize,
}

/// Handle to an in-flight analysis run
pub struct RunHandle {
    cancel: CancellationToken,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Signal cancellation. The read loop stops within one cycle, the
    /// pending set is cleared, and already-merged verdicts are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to reach its terminal state.
    pub async fn wait(self) -> TraceResult<RunReport> {
        self.join
            .await
            .map_err(|err| TraceError::Transport(err.to_string()))
    }
}

struct SessionState {
    results: Mutex<HashMap<String, Verdict>>,
    pending: Mutex<HashSet<String>>,
    in_flight: AtomicBool,
}

impl SessionState {
    /// Merge one verdict, keyed by entry identity. A later verdict for the
    /// same identity overwrites the earlier one; re-merging the same verdict
    /// is a no-op.
    fn merge(&self, verdict: Verdict) {
        self.pending.lock().remove(&verdict.id);
        self.results.lock().insert(verdict.id.clone(), verdict);
    }
}

/// One caller session's analysis state.
///
/// Cheap to clone; clones share the same result map.
#[derive(Clone)]
pub struct AnalysisSession {
    state: Arc<SessionState>,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSession {
    /// Create an empty session
    pub fn new() -> Self {
        Self {
            state: Arc::new(SessionState {
                results: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashSet::new()),
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Start an analysis run over `batch`.
    ///
    /// Blocked entries are classified immediately and merged before this
    /// returns; allowed entries become the pending set and are streamed from
    /// `source` on a background task. Returns [`TraceError::RunInProgress`]
    /// while a previous run has not reached a terminal state.
    pub fn start(
        &self,
        source: Arc<dyn VerdictSource>,
        batch: &[LogEntry],
    ) -> TraceResult<RunHandle> {
        if self.state.in_flight.swap(true, Ordering::SeqCst) {
            return Err(TraceError::RunInProgress);
        }

        let mut remote: Vec<LogEntry> = Vec::new();
        for entry in batch {
            match entry.action {
                Action::Block => self.state.merge(classify(entry)),
                Action::Allow => {
                    self.state.pending.lock().insert(entry.id.clone());
                    remote.push(entry.clone());
                }
            }
        }
        info!(
            total = batch.len(),
            fast_path = batch.len() - remote.len(),
            remote = remote.len(),
            "analysis run started"
        );

        let cancel = CancellationToken::new();
        let state = Arc::clone(&self.state);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            let report = run_remote(&state, source, remote, &token).await;
            // Cancellation abandons the wait for the remainder. An exhausted
            // or failed stream does not: entries that never received a
            // verdict stay pending, visibly unresolved for this run.
            if report.status == RunStatus::Cancelled {
                state.pending.lock().clear();
            }
            state.in_flight.store(false, Ordering::SeqCst);
            report
        });

        Ok(RunHandle { cancel, join })
    }

    /// Snapshot of all merged verdicts, keyed by entry identity
    pub fn results(&self) -> HashMap<String, Verdict> {
        self.state.results.lock().clone()
    }

    /// Verdict for one entry, if any
    pub fn verdict(&self, id: &str) -> Option<Verdict> {
        self.state.results.lock().get(id).cloned()
    }

    /// Identities submitted to a run that have not received a verdict.
    /// Survives run completion; cleared by cancellation or [`reset`](Self::reset).
    pub fn pending(&self) -> HashSet<String> {
        self.state.pending.lock().clone()
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.state.in_flight.load(Ordering::SeqCst)
    }

    /// Drop all verdicts and pending markers (caller-initiated reset).
    /// Rejected while a run is in flight.
    pub fn reset(&self) -> TraceResult<()> {
        if self.is_running() {
            return Err(TraceError::RunInProgress);
        }
        self.state.results.lock().clear();
        self.state.pending.lock().clear();
        Ok(())
    }
}

async fn run_remote(
    state: &SessionState,
    source: Arc<dyn VerdictSource>,
    remote: Vec<LogEntry>,
    cancel: &CancellationToken,
) -> RunReport {
    if remote.is_empty() {
        debug!("no remote-bound entries, run complete");
        return RunReport {
            status: RunStatus::Completed,
            announced: Some(0),
            merged: 0,
        };
    }

    let known: HashSet<&str> = remote.iter().map(|e| e.id.as_str()).collect();
    let stream = match source.open(&remote).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(%err, "verdict source failed to open");
            return RunReport {
                status: RunStatus::SourceFailed,
                announced: None,
                merged: 0,
            };
        }
    };

    let mut announced = None;
    let mut merged = 0usize;
    let outcome = consume_stream(
        stream,
        cancel,
        |meta| {
            debug!(count = meta.count, "backend announced batch size");
            announced = Some(meta.count);
        },
        |verdict| {
            // The decoder passes identities through unvalidated; membership
            // is checked here.
            if known.contains(verdict.id.as_str()) {
                state.merge(verdict);
                merged += 1;
            } else {
                warn!(id = %verdict.id, "dropping verdict for unknown identity");
            }
        },
    )
    .await;

    let status = match outcome {
        StreamOutcome::Completed => RunStatus::Completed,
        StreamOutcome::Cancelled => RunStatus::Cancelled,
    };
    info!(?status, merged, "analysis run finished");
    RunReport {
        status,
        announced,
        merged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn entry(id: &str, action: Action) -> LogEntry {
        LogEntry {
            id: id.to_string(),
            timestamp: "2026-08-23T10:00:00.000Z".to_string(),
            source_ip: "10.0.0.1".to_string(),
            dest_url: "https://example.com/".to_string(),
            action,
            threat_category: "None".to_string(),
            bytes_sent: 100,
            bytes_received: 100,
            user_agent: "Mozilla/5.0".to_string(),
            source_user: "user@tenex.com".to_string(),
            app_name: "General Browsing".to_string(),
        }
    }

    /// Source that replays a fixed NDJSON body in one chunk.
    struct FixedSource(String);

    #[async_trait]
    impl VerdictSource for FixedSource {
        async fn open(&self, _entries: &[LogEntry]) -> TraceResult<VerdictStream> {
            let body = Bytes::from(self.0.clone());
            Ok(futures_util::stream::iter(vec![Ok(body)]).boxed())
        }
    }

    /// Source that emits a meta line and then hangs until cancelled.
    struct StallingSource;

    #[async_trait]
    impl VerdictSource for StallingSource {
        async fn open(&self, entries: &[LogEntry]) -> TraceResult<VerdictStream> {
            let meta = format!("{{\"type\":\"meta\",\"count\":{}}}\n", entries.len());
            let stream = futures_util::stream::iter(vec![Ok(Bytes::from(meta))])
                .chain(futures_util::stream::pending());
            Ok(stream.boxed())
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let session = AnalysisSession::new();
        let v = Verdict::new("a", 85, "r");
        session.state.merge(v.clone());
        let once = session.results();
        session.state.merge(v);
        assert_eq!(session.results(), once);
    }

    #[test]
    fn test_later_merge_overwrites_earlier() {
        let session = AnalysisSession::new();
        session.state.merge(Verdict::new("a", 0, "first"));
        session.state.merge(Verdict::new("a", 95, "second"));
        assert_eq!(session.verdict("a").unwrap().reason, "second");
    }

    #[tokio::test]
    async fn test_blocked_entries_resolve_without_source() {
        let session = AnalysisSession::new();
        let batch = vec![entry("b1", Action::Block), entry("b2", Action::Block)];

        let handle = session
            .start(Arc::new(FixedSource(String::new())), &batch)
            .unwrap();

        // Fast-path verdicts are merged before start returns.
        assert_eq!(session.results().len(), 2);
        assert_eq!(session.verdict("b1").unwrap().confidence, 0);

        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.announced, Some(0));
        assert!(session.pending().is_empty());
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_allowed_entries_stream_and_merge() {
        let session = AnalysisSession::new();
        let batch = vec![entry("a1", Action::Allow), entry("a2", Action::Allow)];

        let body = "{\"type\":\"meta\",\"count\":2}\n\
                    {\"id\":\"a1\",\"confidence\":0,\"reason\":\"Traffic appears normal.\"}\n\
                    {\"id\":\"a2\",\"confidence\":85,\"reason\":\"exfil\"}\n";
        let handle = session
            .start(Arc::new(FixedSource(body.to_string())), &batch)
            .unwrap();

        assert_eq!(session.pending().len(), 2);

        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.announced, Some(2));
        assert_eq!(report.merged, 2);
        assert!(session.pending().is_empty());
        assert!(session.verdict("a2").unwrap().is_anomaly());
    }

    #[tokio::test]
    async fn test_short_stream_leaves_unresolved_entries_pending() {
        let session = AnalysisSession::new();
        let batch = vec![entry("a1", Action::Allow), entry("a2", Action::Allow)];

        // Backend only attempts one of the two submitted entries.
        let body = "{\"type\":\"meta\",\"count\":1}\n\
                    {\"id\":\"a1\",\"confidence\":0,\"reason\":\"ok\"}\n";
        let handle = session
            .start(Arc::new(FixedSource(body.to_string())), &batch)
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.announced, Some(1));
        assert!(session.verdict("a1").is_some());
        assert!(session.verdict("a2").is_none());
        // The unserved entry is still visibly unresolved, not silently clear.
        assert_eq!(
            session.pending(),
            HashSet::from(["a2".to_string()])
        );
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_unknown_identity_not_merged() {
        let session = AnalysisSession::new();
        let batch = vec![entry("a1", Action::Allow)];

        let body = "{\"type\":\"meta\",\"count\":1}\n\
                    {\"id\":\"intruder\",\"confidence\":99,\"reason\":\"r\"}\n\
                    {\"id\":\"a1\",\"confidence\":0,\"reason\":\"ok\"}\n";
        let handle = session
            .start(Arc::new(FixedSource(body.to_string())), &batch)
            .unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.merged, 1);
        assert!(session.verdict("intruder").is_none());
    }

    #[tokio::test]
    async fn test_second_start_rejected_while_running() {
        let session = AnalysisSession::new();
        let batch = vec![entry("a1", Action::Allow)];

        let handle = session
            .start(Arc::new(StallingSource), &batch)
            .unwrap();

        let second = session.start(Arc::new(StallingSource), &batch);
        assert!(matches!(second, Err(TraceError::RunInProgress)));

        handle.cancel();
        let report = handle.wait().await.unwrap();
        assert_eq!(report.status, RunStatus::Cancelled);

        // Terminal state reached: a new run is accepted.
        let handle = session
            .start(Arc::new(FixedSource(String::new())), &batch)
            .unwrap();
        handle.cancel();
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_after_meta_clears_pending_keeps_results() {
        let session = AnalysisSession::new();
        session.state.merge(Verdict::new("old", 95, "kept"));
        let before = session.results();

        let batch = vec![entry("a1", Action::Allow), entry("a2", Action::Allow)];
        let handle = session.start(Arc::new(StallingSource), &batch).unwrap();

        handle.cancel();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.status, RunStatus::Cancelled);
        assert!(session.pending().is_empty());
        assert_eq!(session.results(), before);
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_reset_rejected_while_running_allowed_after() {
        let session = AnalysisSession::new();
        let batch = vec![entry("a1", Action::Allow)];
        let handle = session.start(Arc::new(StallingSource), &batch).unwrap();

        assert!(matches!(session.reset(), Err(TraceError::RunInProgress)));

        handle.cancel();
        handle.wait().await.unwrap();
        session.reset().unwrap();
        assert!(session.results().is_empty());
    }
}
