//! Page ranges and the slice-width backoff state machine.
//!
//! [`Backoff`] holds no I/O: the driver asks it for the next range, runs the
//! engine, and reports the outcome back. Width only ever shrinks (halving,
//! floored at [`MIN_SLICE_WIDTH`]) and `start` only advances on success.

use serde::{Deserialize, Serialize};

pub const MIN_SLICE_WIDTH: u32 = 5;

/// Inclusive zero-based page interval, `start <= end < page_count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    pub fn pages(&self) -> u32 {
        self.end - self.start + 1
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceState {
    Advancing,
    Retrying,
    Succeeded,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct Backoff {
    start: u32,
    width: u32,
    total: u32,
    state: SliceState,
}

impl Backoff {
    pub fn new(total: u32, width: u32) -> Self {
        let width = width.max(1);
        let state = if total == 0 {
            SliceState::Succeeded
        } else {
            SliceState::Advancing
        };
        Self {
            start: 0,
            width,
            total,
            state,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn state(&self) -> SliceState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SliceState::Succeeded | SliceState::Aborted)
    }

    /// The range to attempt next, or `None` once the machine is terminal.
    pub fn next_range(&self) -> Option<PageRange> {
        if self.is_finished() {
            return None;
        }
        let end = self.start.saturating_add(self.width - 1).min(self.total - 1);
        Some(PageRange::new(self.start, end))
    }

    pub fn record_success(&mut self) {
        let Some(range) = self.next_range() else {
            return;
        };
        self.start = range.end + 1;
        self.state = if self.start >= self.total {
            SliceState::Succeeded
        } else {
            SliceState::Advancing
        };
    }

    /// Returns the new state: `Retrying` with a halved width, or `Aborted`
    /// when the failing width was already at or below the floor.
    pub fn record_failure(&mut self) -> SliceState {
        if self.is_finished() {
            return self.state;
        }
        if self.width <= MIN_SLICE_WIDTH {
            self.state = SliceState::Aborted;
        } else {
            self.width = (self.width / 2).max(MIN_SLICE_WIDTH);
            self.state = SliceState::Retrying;
        }
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_range_is_clamped_to_document() {
        let b = Backoff::new(7, 5);
        assert_eq!(b.next_range(), Some(PageRange::new(0, 4)));
        let mut b = b;
        b.record_success();
        assert_eq!(b.next_range(), Some(PageRange::new(5, 6)));
        b.record_success();
        assert_eq!(b.state(), SliceState::Succeeded);
        assert_eq!(b.next_range(), None);
    }

    #[test]
    fn failure_halves_then_floors() {
        let mut b = Backoff::new(100, 40);
        assert_eq!(b.record_failure(), SliceState::Retrying);
        assert_eq!(b.width(), 20);
        b.record_failure();
        assert_eq!(b.width(), 10);
        b.record_failure();
        assert_eq!(b.width(), 5);
        assert_eq!(b.record_failure(), SliceState::Aborted);
        assert_eq!(b.start(), 0);
        assert_eq!(b.next_range(), None);
    }

    #[test]
    fn odd_widths_floor_at_minimum() {
        let mut b = Backoff::new(100, 9);
        b.record_failure();
        assert_eq!(b.width(), 5);
        let mut b = Backoff::new(100, 11);
        b.record_failure();
        assert_eq!(b.width(), 5);
    }

    #[test]
    fn widths_below_floor_abort_on_first_failure() {
        let mut b = Backoff::new(10, 3);
        assert_eq!(b.next_range(), Some(PageRange::new(0, 2)));
        assert_eq!(b.record_failure(), SliceState::Aborted);
    }

    #[test]
    fn empty_document_is_immediately_done() {
        let b = Backoff::new(0, 40);
        assert_eq!(b.state(), SliceState::Succeeded);
        assert_eq!(b.next_range(), None);
    }

    #[test]
    fn retry_keeps_start() {
        let mut b = Backoff::new(30, 20);
        b.record_success();
        assert_eq!(b.start(), 20);
        b.record_failure();
        assert_eq!(b.start(), 20);
        assert_eq!(b.next_range(), Some(PageRange::new(20, 29)));
    }
}
