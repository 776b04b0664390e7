//! Core types for tick state streams.

use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position in a message stream (a message sequence number).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Tick(pub u64);

impl Tick {
    /// First tick of every stream; always completed.
    pub const MIN: Tick = Tick(0);

    /// Last representable tick.
    pub const MAX: Tick = Tick(u64::MAX);

    /// The following tick, or `None` at `Tick::MAX`.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Tick)
    }

    /// The preceding tick, or `None` at `Tick::MIN`.
    pub fn prev(self) -> Option<Self> {
        self.0.checked_sub(1).map(Tick)
    }
}

impl From<u64> for Tick {
    fn from(value: u64) -> Self {
        Tick(value)
    }
}

impl fmt::Debug for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick({})", self)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Tick::MAX {
            write!(f, "MAX")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// What the stream currently believes happened to a tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    Unknown,
    Requested,
    Uncommitted,
    Value,
    Discarded,
    Accepted,
    Rejected,
    Completed,
    /// Sentinel for an illegal transition. Never stored.
    Error,
}

impl State {
    /// Every state, in matrix order.
    pub const ALL: [State; 9] = [
        State::Unknown,
        State::Requested,
        State::Uncommitted,
        State::Value,
        State::Discarded,
        State::Accepted,
        State::Rejected,
        State::Completed,
        State::Error,
    ];

    /// Row/column of this state in the transition matrix.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Single-letter code used by compact dumps.
    pub fn code(self) -> char {
        match self {
            State::Unknown => 'U',
            State::Requested => 'Q',
            State::Uncommitted => 'N',
            State::Value => 'V',
            State::Discarded => 'D',
            State::Accepted => 'A',
            State::Rejected => 'R',
            State::Completed => 'C',
            State::Error => 'E',
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A contiguous run of ticks `[start, end]` sharing one state.
///
/// The optional payload is opaque to the stream: it is stored, cloned into
/// split fragments and handed back, but never inspected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Range<P> {
    pub(crate) state: State,
    pub(crate) start: Tick,
    pub(crate) end: Tick,
    pub(crate) payload: Option<P>,
}

impl<P> Range<P> {
    /// Create a range without a payload.
    pub fn new(state: State, start: impl Into<Tick>, end: impl Into<Tick>) -> Result<Self> {
        Self::with_payload(state, start, end, None)
    }

    /// Create a range carrying an optional payload.
    pub fn with_payload(
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
        payload: Option<P>,
    ) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start > end {
            return Err(StreamError::InvalidRange { start, end });
        }
        Ok(Self {
            state,
            start,
            end,
            payload,
        })
    }

    /// Create a single-tick range.
    pub fn tick(state: State, tick: impl Into<Tick>, payload: Option<P>) -> Self {
        let tick = tick.into();
        Self {
            state,
            start: tick,
            end: tick,
            payload,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn start(&self) -> Tick {
        self.start
    }

    pub fn end(&self) -> Tick {
        self.end
    }

    pub fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    /// Whether `tick` lies inside this range.
    pub fn contains(&self, tick: impl Into<Tick>) -> bool {
        let tick = tick.into();
        self.start <= tick && tick <= self.end
    }

    /// Signed distance from this range to `tick`.
    ///
    /// Zero when contained, negative when `tick` precedes `start`, positive
    /// when it follows `end`. Saturates at the `i64` bounds; only the sign
    /// matters to callers walking the list.
    pub fn distance_to(&self, tick: impl Into<Tick>) -> i64 {
        let tick = tick.into();
        if tick < self.start {
            -i64::try_from(self.start.0 - tick.0).unwrap_or(i64::MAX)
        } else if tick > self.end {
            i64::try_from(tick.0 - self.end.0).unwrap_or(i64::MAX)
        } else {
            0
        }
    }

    /// Reinitialize in place so a pooled instance can be reissued.
    pub fn reset(
        &mut self,
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
        payload: Option<P>,
    ) -> Result<()> {
        let (start, end) = (start.into(), end.into());
        if start > end {
            return Err(StreamError::InvalidRange { start, end });
        }
        self.state = state;
        self.start = start;
        self.end = end;
        self.payload = payload;
        Ok(())
    }
}

impl<P> fmt::Display for Range<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}] {}", self.start, self.end, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_navigation() {
        assert_eq!(Tick(5).next(), Some(Tick(6)));
        assert_eq!(Tick(5).prev(), Some(Tick(4)));
        assert_eq!(Tick::MIN.prev(), None);
        assert_eq!(Tick::MAX.next(), None);
    }

    #[test]
    fn test_tick_display() {
        assert_eq!(Tick(42).to_string(), "42");
        assert_eq!(Tick::MAX.to_string(), "MAX");
        assert_eq!(format!("{:?}", Tick(7)), "Tick(7)");
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        let result = Range::<()>::new(State::Value, 10, 9);
        assert!(matches!(
            result,
            Err(StreamError::InvalidRange { start: Tick(10), end: Tick(9) })
        ));
    }

    #[test]
    fn test_contains_and_distance() {
        let range = Range::<()>::new(State::Requested, 10, 20).unwrap();

        assert!(range.contains(10));
        assert!(range.contains(20));
        assert!(!range.contains(21));

        assert_eq!(range.distance_to(15), 0);
        assert_eq!(range.distance_to(7), -3);
        assert_eq!(range.distance_to(25), 5);
    }

    #[test]
    fn test_distance_saturates() {
        let range = Range::<()>::new(State::Unknown, 0, 0).unwrap();
        assert_eq!(range.distance_to(Tick::MAX), i64::MAX);

        let range = Range::<()>::new(State::Unknown, Tick::MAX, Tick::MAX).unwrap();
        assert_eq!(range.distance_to(0), -i64::MAX);
    }

    #[test]
    fn test_reset_reuses_instance() {
        let mut range = Range::with_payload(State::Value, 3, 3, Some("msg")).unwrap();
        range.reset(State::Completed, 0, 9, None).unwrap();

        assert_eq!(range.state(), State::Completed);
        assert_eq!(range.start(), Tick(0));
        assert_eq!(range.end(), Tick(9));
        assert_eq!(range.payload(), None);

        assert!(range.reset(State::Completed, 9, 0, None).is_err());
        // A rejected reset leaves the range alone.
        assert_eq!(range.end(), Tick(9));
    }

    #[test]
    fn test_range_display() {
        let range = Range::<()>::new(State::Unknown, 1, Tick::MAX).unwrap();
        assert_eq!(range.to_string(), "[1, MAX] Unknown");
    }

    #[test]
    fn test_state_codes_unique() {
        let mut codes: Vec<char> = State::ALL.iter().map(|s| s.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), State::ALL.len());
    }
}
