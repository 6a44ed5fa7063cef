//! Multi-Address Streaming Core
//!
//! The only part of the service with real concurrency:
//! - `fanout`: bounded-concurrency per-address queries, completion order
//! - `streamer`: incremental JSON array serialization to the transport
//! - `cursor`: resumable pagination cursor over out-of-order items
//! - `cancel`: transport-close to cooperative-stop binding

pub mod cancel;
pub mod cursor;
pub mod fanout;
pub mod streamer;

// Re-exports for convenience
pub use cancel::{StopFlag, StopGuard};
pub use cursor::{Cursor, CursorTracker};
pub use fanout::{fan_out, FanOutItem, FANOUT_CONCURRENCY};
pub use streamer::{stream_json_array, ArraySeparator, BodyChunk};
