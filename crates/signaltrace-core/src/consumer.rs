//! Async read loop over an NDJSON byte stream.
//!
//! The loop is the run's only suspension point: it waits for the next chunk,
//! feeds it through [`NdjsonDecoder`] and dispatches callbacks for each
//! completed record. Cancellation is observed at the top of every iteration,
//! so a cancelled token terminates the loop within one read cycle and no
//! callback fires afterwards.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::decode::{NdjsonDecoder, StreamMeta, StreamRecord};
use crate::verdict::Verdict;

/// How a stream consumption ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The source was exhausted (including early termination by the backend)
    Completed,
    /// The cancellation token fired
    Cancelled,
}

/// Consume an NDJSON byte stream, invoking callbacks as records decode.
///
/// A transport error mid-stream is treated as end of stream, not corruption:
/// entries without a verdict simply stay pending. At normal end the residual
/// buffer is flushed as one final line.
pub async fn consume_stream<S, E, FM, FR>(
    stream: S,
    cancel: &CancellationToken,
    mut on_meta: FM,
    mut on_result: FR,
) -> StreamOutcome
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
    FM: FnMut(StreamMeta),
    FR: FnMut(Verdict),
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = NdjsonDecoder::new();

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream consumption cancelled");
                return StreamOutcome::Cancelled;
            }
            chunk = stream.next() => chunk,
        };

        let bytes = match chunk {
            Some(Ok(bytes)) => bytes,
            Some(Err(err)) => {
                // Backend failed mid-stream: no more results are coming.
                warn!(%err, "stream ended early");
                break;
            }
            None => break,
        };

        for record in decoder.push(&bytes) {
            dispatch(record, &mut on_meta, &mut on_result);
        }
    }

    if let Some(record) = decoder.finish() {
        dispatch(record, &mut on_meta, &mut on_result);
    }
    StreamOutcome::Completed
}

fn dispatch<FM, FR>(record: StreamRecord, on_meta: &mut FM, on_result: &mut FR)
where
    FM: FnMut(StreamMeta),
    FR: FnMut(Verdict),
{
    match record {
        StreamRecord::Meta(meta) => on_meta(meta),
        StreamRecord::Verdict(verdict) => on_result(verdict),
    }
}
