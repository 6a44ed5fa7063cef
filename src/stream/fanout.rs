//! Bounded Fan-Out Executor
//!
//! Runs per-address index queries with a fixed concurrency ceiling and
//! yields results over a bounded channel in completion order. Output order
//! deliberately reflects completion time, not submission order, so a slow
//! address never stalls fast ones; consumers must not assume batch order.
//!
//! Error policy: the first per-address failure latches, no further queries
//! are issued, in-flight queries drain, and the failure reaches the
//! consumer as an item. Results already delivered stand; the transport may
//! have flushed them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::index::IndexError;
use crate::stream::cancel::StopFlag;

/// Maximum concurrent per-address queries.
pub const FANOUT_CONCURRENCY: usize = 4;

/// One completed unit of fan-out work.
#[derive(Debug)]
pub enum FanOutItem<A, T> {
    /// A single address's query finished; items preserve index order.
    Completed { address: A, items: Vec<T> },
    /// A single address's query failed. Consumers treat the first of
    /// these as the aggregate error for the whole batch.
    Failed { address: A, error: IndexError },
}

/// Fan a batch of addresses out over `query`, at most
/// [`FANOUT_CONCURRENCY`] in flight.
///
/// Returns the consumer end of a bounded channel. The channel closes once
/// every issued query has drained. Before each query is issued the shared
/// `stop` flag and the failure latch are checked; once either is set no
/// new work starts and drained results are discarded rather than sent.
pub fn fan_out<A, T, Q, Fut>(
    addrs: Vec<A>,
    stop: StopFlag,
    query: Q,
) -> mpsc::Receiver<FanOutItem<A, T>>
where
    A: Clone + Send + Sync + 'static,
    T: Send + 'static,
    Q: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, IndexError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(FANOUT_CONCURRENCY);
    let semaphore = Arc::new(Semaphore::new(FANOUT_CONCURRENCY));
    let failed = Arc::new(AtomicBool::new(false));
    let query = Arc::new(query);

    tokio::spawn(async move {
        let mut tasks = JoinSet::new();

        for addr in addrs {
            if stop.is_tripped() || failed.load(Ordering::Acquire) {
                break;
            }

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            // A slot may have failed or the client may have gone away
            // while we waited for the permit.
            if stop.is_tripped() || failed.load(Ordering::Acquire) {
                break;
            }

            let tx = tx.clone();
            let stop = stop.clone();
            let failed = failed.clone();
            let query = query.clone();

            tasks.spawn(async move {
                let _permit = permit;

                let item = match query(addr.clone()).await {
                    Ok(items) => FanOutItem::Completed { address: addr, items },
                    Err(error) => {
                        failed.store(true, Ordering::Release);
                        FanOutItem::Failed { address: addr, error }
                    }
                };

                // Drain without emitting once the request is cancelled.
                if stop.is_tripped() {
                    return;
                }
                let _ = tx.send(item).await;
            });
        }

        drop(tx);
        while tasks.join_next().await.is_some() {}
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn addresses(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("addr{i}")).collect()
    }

    #[tokio::test]
    async fn test_emits_union_of_all_results() {
        let mut rx = fan_out(addresses(8), StopFlag::new(), |addr: String| async move {
            Ok(vec![format!("{addr}-u0"), format!("{addr}-u1")])
        });

        let mut seen = BTreeSet::new();
        while let Some(item) = rx.recv().await {
            match item {
                FanOutItem::Completed { items, .. } => seen.extend(items),
                FanOutItem::Failed { .. } => panic!("unexpected failure"),
            }
        }
        assert_eq!(seen.len(), 16);
        assert!(seen.contains("addr7-u1"));
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_ceiling() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let in_flight_q = in_flight.clone();
        let peak_q = peak.clone();
        let mut rx = fan_out(addresses(20), StopFlag::new(), move |_addr: String| {
            let in_flight = in_flight_q.clone();
            let peak = peak_q.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![1u32])
            }
        });

        let mut count = 0;
        while rx.recv().await.is_some() {
            count += 1;
        }
        assert_eq!(count, 20);
        assert!(peak.load(Ordering::SeqCst) <= FANOUT_CONCURRENCY);
    }

    #[tokio::test]
    async fn test_failure_stops_new_queries_and_terminates() {
        let started = Arc::new(AtomicUsize::new(0));

        let started_q = started.clone();
        let mut rx = fan_out(addresses(50), StopFlag::new(), move |addr: String| {
            let started = started_q.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if addr == "addr0" {
                    Err(IndexError::Transport("index went away".to_string()))
                } else {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Ok(vec![addr])
                }
            }
        });

        let mut saw_failure = false;
        while let Some(item) = rx.recv().await {
            if matches!(item, FanOutItem::Failed { .. }) {
                saw_failure = true;
            }
        }
        // Stream terminated (no hang) and most of the batch never started.
        assert!(saw_failure);
        assert!(started.load(Ordering::SeqCst) < 50);
    }

    #[tokio::test]
    async fn test_stop_flag_halts_issue_and_emission() {
        let stop = StopFlag::new();
        let started = Arc::new(AtomicUsize::new(0));

        let stop_q = stop.clone();
        let started_q = started.clone();
        let mut rx = fan_out(addresses(40), stop.clone(), move |addr: String| {
            let stop = stop_q.clone();
            let started = started_q.clone();
            async move {
                started.fetch_add(1, Ordering::SeqCst);
                if addr == "addr1" {
                    // Simulates the transport closing mid-batch.
                    stop.trip();
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
                Ok(vec![addr])
            }
        });

        let mut emitted_after_trip = 0;
        while let Some(_item) = rx.recv().await {
            if stop.is_tripped() {
                emitted_after_trip += 1;
            }
        }
        // In-flight work drains silently once the flag is set. Anything
        // received after the trip was already buffered in the channel.
        assert!(emitted_after_trip <= FANOUT_CONCURRENCY);
        assert!(started.load(Ordering::SeqCst) < 40);
    }
}
