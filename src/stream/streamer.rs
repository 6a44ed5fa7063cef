//! Incremental JSON Array Streamer
//!
//! Serializes fan-out results as one syntactically valid JSON array
//! without ever holding the full batch in memory. Items from different
//! addresses interleave in completion order, so the comma separator is a
//! stream-wide two-state machine (nothing written yet / at least one item
//! written), never per-address bookkeeping.
//!
//! The streamer is the single consumer of the fan-out channel and the
//! single writer to the transport channel; transport writes are serialized
//! by construction.

use std::convert::Infallible;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::index::IndexError;
use crate::stream::cancel::StopFlag;
use crate::stream::fanout::FanOutItem;

/// Two-state comma separator for an incrementally written JSON array.
#[derive(Debug, Default)]
pub struct ArraySeparator {
    started: bool,
}

impl ArraySeparator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Separator to write before the next item: empty before the first
    /// item overall, a comma before every later one.
    pub fn lead(&mut self) -> &'static str {
        if self.started {
            ","
        } else {
            self.started = true;
            ""
        }
    }
}

/// Chunk type accepted by `axum::body::Body::from_stream`.
pub type BodyChunk = Result<String, Infallible>;

/// Drain `rx` into `out` as a single JSON array.
///
/// Emits `[`, then each item prefixed by the separator machine, then `]`.
/// The closing bracket is written even after a mid-stream aggregate error;
/// with headers already flushed the error cannot become a status code, so
/// it is logged, the array is closed structurally, and the error returned.
///
/// A failed transport send means the client disconnected: the stop flag is
/// tripped so the executor stops issuing work, and the remaining channel
/// contents are discarded.
pub async fn stream_json_array<A, T>(
    mut rx: mpsc::Receiver<FanOutItem<A, T>>,
    out: mpsc::Sender<BodyChunk>,
    stop: StopFlag,
) -> Result<usize, IndexError>
where
    A: std::fmt::Display,
    T: Serialize,
{
    let mut sep = ArraySeparator::new();
    let mut written = 0usize;
    let mut aggregate: Option<IndexError> = None;

    if out.send(Ok("[".to_string())).await.is_err() {
        stop.trip();
        return Ok(0);
    }

    'consume: while let Some(result) = rx.recv().await {
        match result {
            FanOutItem::Completed { items, .. } => {
                for item in items {
                    let json = match serde_json::to_string(&item) {
                        Ok(json) => json,
                        Err(e) => {
                            aggregate = Some(IndexError::Parse(e.to_string()));
                            break 'consume;
                        }
                    };
                    let chunk = format!("{}{}", sep.lead(), json);
                    if out.send(Ok(chunk)).await.is_err() {
                        stop.trip();
                        return Ok(written);
                    }
                    written += 1;
                }
            }
            FanOutItem::Failed { address, error } => {
                tracing::warn!(address = %address, error = %error, "address query failed mid-stream");
                aggregate = Some(error);
                break;
            }
        }
    }

    // Close the array structurally no matter what; the transport already
    // holds a 200 status and a partial body.
    let _ = out.send(Ok("]".to_string())).await;

    match aggregate {
        Some(error) => Err(error),
        None => Ok(written),
    }
}
