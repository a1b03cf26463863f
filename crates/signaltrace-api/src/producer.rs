//! NDJSON stream producers.
//!
//! Both modes emit the identical wire shape: one metadata line, then one
//! verdict object per line. Fallback mode runs the rule engine per entry
//! with a small artificial delay; remote mode re-frames the model's token
//! stream into well-formed lines.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use serde::Serialize;
use signaltrace_core::{classify, LogEntry, TraceError};
use tracing::warn;

/// Carry-over line framer for the remote token stream.
///
/// Model text arrives in arbitrary-sized chunks with no alignment to JSON or
/// line boundaries. Text is buffered until a `\n`-terminated line is
/// complete; the trailing fragment is carried into the next push.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    /// Append text and return every line it completed.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let rest = self.buffer.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.buffer, rest);
            line.truncate(line.len() - 1);
            lines.push(line);
        }
        lines
    }

    /// Take the residual partial line, if any non-blank text remains.
    ///
    /// Called at end of stream so a final line without a trailing newline is
    /// still emitted.
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

fn ndjson_line<T: Serialize>(value: &T) -> Bytes {
    let mut line = serde_json::to_string(value).unwrap_or_default();
    line.push('\n');
    Bytes::from(line)
}

/// Wire shape of the stream's first line. Field order is part of the wire
/// format: `type` precedes `count`.
#[derive(Serialize)]
struct MetaLine {
    r#type: &'static str,
    count: usize,
}

fn meta_line(count: usize) -> Bytes {
    ndjson_line(&MetaLine {
        r#type: "meta",
        count,
    })
}

/// Rule-engine fallback stream: meta first, then one verdict per entry in
/// submission order, each after `delay`.
///
/// This is a conformance implementation of the classification policy, not an
/// approximation; it shares [`classify`] with the local fast path.
pub fn fallback_stream(
    entries: Vec<LogEntry>,
    delay: Duration,
) -> impl Stream<Item = Result<Bytes, TraceError>> + Send {
    let meta = meta_line(entries.len());
    let verdicts = stream::iter(entries).then(move |entry| async move {
        tokio::time::sleep(delay).await;
        Ok(ndjson_line(&classify(&entry)))
    });
    stream::once(async move { Ok(meta) }).chain(verdicts)
}

struct ReframeState<S> {
    tokens: S,
    framer: LineFramer,
    queue: VecDeque<Bytes>,
    done: bool,
}

/// Re-frame a model token stream into NDJSON: meta first, then every complete
/// line the tokens assemble.
///
/// Blank lines are not forwarded. A transport error mid-stream ends the
/// stream without error (the consumer treats early termination as "no more
/// results"). Any non-empty residue is flushed as a final line at end of
/// stream.
pub fn reframe_tokens<S>(
    count: usize,
    tokens: S,
) -> impl Stream<Item = Result<Bytes, TraceError>> + Send
where
    S: Stream<Item = Result<String, TraceError>> + Send + Unpin,
{
    let state = ReframeState {
        tokens,
        framer: LineFramer::default(),
        queue: VecDeque::new(),
        done: false,
    };

    let lines = stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some((Ok(line), state));
            }
            if state.done {
                return None;
            }

            match state.tokens.next().await {
                Some(Ok(text)) => {
                    for line in state.framer.push(&text) {
                        if !line.trim().is_empty() {
                            state.queue.push_back(Bytes::from(line + "\n"));
                        }
                    }
                }
                Some(Err(err)) => {
                    warn!(%err, "model token stream ended early");
                    state.done = true;
                    if let Some(rest) = state.framer.take_remainder() {
                        state.queue.push_back(Bytes::from(rest + "\n"));
                    }
                }
                None => {
                    state.done = true;
                    if let Some(rest) = state.framer.take_remainder() {
                        state.queue.push_back(Bytes::from(rest + "\n"));
                    }
                }
            }
        }
    });

    stream::once(async move { Ok(meta_line(count)) }).chain(lines)
}
