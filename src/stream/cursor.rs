//! Resumable Pagination Cursor
//!
//! Stream output arrives in completion order, not chain order, so "last
//! item written" is not a valid resumption token. The tracker compares
//! every confirmed item against the best cursor seen so far, ordered by
//! `(height, id)` ascending, and exposes the winner at stream end for the
//! next request's `after` option.

use serde::Serialize;

/// Most-advanced confirmed position observed in a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cursor {
    pub height: u64,
    pub id: String,
}

/// Tracks the maximum `(height, id)` over confirmed items.
#[derive(Debug, Default)]
pub struct CursorTracker {
    best: Option<Cursor>,
}

impl CursorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one streamed item. Unconfirmed items never move the cursor.
    ///
    /// A later arrival only replaces the cursor when its height is
    /// strictly greater, or its id is lexicographically greater at equal
    /// height.
    pub fn observe(&mut self, confirmations: u32, height: u64, id: &str) {
        if confirmations == 0 {
            return;
        }
        let advanced = match &self.best {
            None => true,
            Some(best) => height > best.height || (height == best.height && id > best.id.as_str()),
        };
        if advanced {
            self.best = Some(Cursor {
                height,
                id: id.to_string(),
            });
        }
    }

    /// The tracked cursor, if any confirmed item was seen.
    pub fn cursor(&self) -> Option<&Cursor> {
        self.best.as_ref()
    }

    /// Resumption token for the next request's `after` option. The index
    /// accepts the bare id.
    pub fn into_last_item(self) -> Option<String> {
        self.best.map(|c| c.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_order_heights() {
        let mut tracker = CursorTracker::new();
        for (height, id) in [(5, "b"), (3, "a"), (5, "c"), (7, "d")] {
            tracker.observe(1, height, id);
        }
        assert_eq!(
            tracker.cursor(),
            Some(&Cursor {
                height: 7,
                id: "d".to_string()
            })
        );
    }

    #[test]
    fn test_equal_height_breaks_ties_on_id() {
        let mut tracker = CursorTracker::new();
        tracker.observe(1, 5, "a");
        tracker.observe(1, 5, "c");
        assert_eq!(
            tracker.cursor(),
            Some(&Cursor {
                height: 5,
                id: "c".to_string()
            })
        );

        // Superseded by a strictly greater height.
        tracker.observe(1, 7, "a");
        assert_eq!(tracker.cursor().unwrap().height, 7);
    }

    #[test]
    fn test_lower_id_at_equal_height_does_not_regress() {
        let mut tracker = CursorTracker::new();
        tracker.observe(1, 5, "c");
        tracker.observe(1, 5, "a");
        assert_eq!(tracker.cursor().unwrap().id, "c");
    }

    #[test]
    fn test_unconfirmed_items_are_ignored() {
        let mut tracker = CursorTracker::new();
        tracker.observe(0, 100, "mempool-tx");
        assert!(tracker.cursor().is_none());

        tracker.observe(3, 10, "confirmed-tx");
        tracker.observe(0, 999, "another-mempool-tx");
        assert_eq!(tracker.cursor().unwrap().id, "confirmed-tx");
    }

    #[test]
    fn test_into_last_item() {
        let mut tracker = CursorTracker::new();
        assert_eq!(CursorTracker::new().into_last_item(), None);
        tracker.observe(2, 12, "tx1");
        assert_eq!(tracker.into_last_item(), Some("tx1".to_string()));
    }
}
