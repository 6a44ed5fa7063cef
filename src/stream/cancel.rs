//! Cooperative Cancellation
//!
//! `StopFlag` is the only cancellation mechanism in the service: a
//! per-request, monotonic false-to-true flag shared between the transport
//! layer, the fan-out executor, and the index client. There is no timeout
//! and no explicit cancel API; work stops because the transport went away.
//!
//! Binding rules:
//! - HTTP streaming responses wrap their body in a [`StopGuard`]; hyper
//!   drops the body stream when the client disconnects, which trips the
//!   flag.
//! - Buffered handlers hold a guard across the index call; axum drops the
//!   handler future on disconnect.
//! - The WebSocket read loop trips the flag on a Close frame or socket
//!   error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, monotonic stop signal for one request.
///
/// Cloning shares the underlying flag. Once tripped it never resets.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Idempotent.
    pub fn trip(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`trip`](Self::trip) has been called on any clone.
    pub fn is_tripped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Guard that trips this flag when dropped.
    pub fn guard(&self) -> StopGuard {
        StopGuard { flag: self.clone() }
    }
}

/// Trips the wrapped [`StopFlag`] on drop.
///
/// The flag is request-scoped, so tripping on normal completion is
/// harmless; the request it governs is already over.
#[derive(Debug)]
pub struct StopGuard {
    flag: StopFlag,
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.flag.trip();
    }
}
