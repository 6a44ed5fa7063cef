//! addrstream - Multi-Address Aggregation & Streaming API
//!
//! Exposes blockchain address data (balances, UTXOs, transaction history)
//! over HTTP and WebSocket, backed by an external indexing service that
//! answers single-address queries.
//!
//! The core is the multi-address subsystem: bounded-concurrency fan-out
//! against the index, incremental serialization of the combined result as
//! one JSON stream, a resumable pagination cursor over out-of-order
//! results, and client-disconnect bound to cooperative cancellation.
//! Everything else is mapping code between the index collaborator and the
//! public API shapes.

pub mod address;
pub mod api;
pub mod common;
pub mod index;
pub mod stream;
pub mod transform;

// Re-exports: configuration and errors
pub use common::{ApiError, AppConfig, ConfigError, Network};

// Re-exports: address boundary
pub use address::{Address, AddressBatch, AddressCodec, AddrsParam};

// Re-exports: index collaborator
pub use index::{
    AddressIndex, AddressSummary, HistoryItem, HistoryPage, HttpAddressIndex, IndexError,
    StreamOptions, Utxo,
};

// Re-exports: streaming core
pub use stream::{
    fan_out, stream_json_array, Cursor, CursorTracker, FanOutItem, StopFlag, FANOUT_CONCURRENCY,
};

// Re-exports: API server
pub use api::{create_router, start_server, AppState, SharedAppState};

/// Satoshi conversion helpers
pub mod units {
    pub const SATS_PER_BTC: u64 = 100_000_000;

    pub fn sats_to_btc(sats: u64) -> f64 {
        sats as f64 / SATS_PER_BTC as f64
    }

    pub fn btc_to_sats(btc: f64) -> u64 {
        (btc * SATS_PER_BTC as f64).round() as u64
    }
}
