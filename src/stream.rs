//! Stream-level operations over a range list.

use crate::error::{Result, StreamError};
use crate::ranges::{Health, Iter, PoolStats, RangeList, DEFAULT_POOL_CAPACITY};
use crate::types::{Range, State, Tick};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stream configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Idle range slots kept for reuse.
    pub pool_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }
}

/// What one message stream believes about each of its ticks.
///
/// A fresh stream holds tick 0 as `Completed` and every other tick as
/// `Unknown`. Writes go through the transition matrix; the first illegal
/// write poisons the stream and every later write fails with
/// [`StreamError::Poisoned`]. Reads keep working on a poisoned stream but
/// describe whatever was stored when it failed.
///
/// Not synchronized: one owner performs all reads and writes. Use
/// [`SharedStateStream`](crate::SharedStateStream) to share one.
pub struct StateStream<P> {
    list: RangeList<P>,
    /// Set by `set_cursor`: the next step yields the covering range itself.
    cursor_armed: bool,
}

impl<P> StateStream<P> {
    /// Create a stream with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            list: RangeList::with_capacity(config.pool_capacity),
            cursor_armed: false,
        }
    }

    // --- Queries ---

    /// State of a single tick.
    pub fn get_state(&mut self, tick: impl Into<Tick>) -> State {
        self.cursor_armed = false;
        self.list.find_range(tick).state()
    }

    /// The range covering `tick`. Leaves the cursor on it.
    pub fn get_range(&mut self, tick: impl Into<Tick>) -> &Range<P> {
        self.cursor_armed = false;
        self.list.find_range(tick)
    }

    /// Position the cursor so the next [`get_next`](Self::get_next) or
    /// [`get_prev`](Self::get_prev) yields the range covering `tick`.
    pub fn set_cursor(&mut self, tick: impl Into<Tick>) {
        self.list.find_range(tick);
        self.cursor_armed = true;
    }

    /// Step forward. `None` once the range ending at `Tick::MAX` was seen.
    pub fn get_next(&mut self) -> Option<&Range<P>> {
        if self.cursor_armed {
            self.cursor_armed = false;
            return Some(self.list.cursor());
        }
        self.list.next()
    }

    /// Step backward. `None` once the genesis range was seen.
    pub fn get_prev(&mut self) -> Option<&Range<P>> {
        if self.cursor_armed {
            self.cursor_armed = false;
            return Some(self.list.cursor());
        }
        self.list.previous()
    }

    /// Whether any tick of the stream is in `state`.
    pub fn contains_state(&mut self, state: State) -> bool {
        self.contains_state_in(state, Tick::MIN, Tick::MAX)
    }

    /// Whether any tick in `[start, end]` is in `state`.
    pub fn contains_state_in(
        &mut self,
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
    ) -> bool {
        self.cursor_armed = false;
        self.list.contains_state(state, start, end)
    }

    /// Start of the completed run at or before `from`.
    ///
    /// If `from` is completed this is the start of its range; otherwise the
    /// start of the nearest completed range before it. Falls back to
    /// `Tick::MIN`, which cannot happen while the genesis tick stands.
    pub fn discover_prev_completed(&mut self, from: impl Into<Tick>) -> Tick {
        self.cursor_armed = false;
        let range = self.list.find_range(from);
        if range.state() == State::Completed {
            return range.start();
        }
        while let Some(range) = self.list.previous() {
            if range.state() == State::Completed {
                return range.start();
            }
        }
        Tick::MIN
    }

    /// Highest tick below which every tick is completed.
    pub fn completed_prefix(&self) -> Tick {
        let first = self.list.first();
        if first.state() == State::Completed {
            first.end()
        } else {
            Tick::MIN
        }
    }

    /// Number of stored ranges.
    pub fn range_count(&self) -> usize {
        self.list.len()
    }

    /// Ranges in tick order. Does not move the cursor.
    pub fn iter(&self) -> Iter<'_, P> {
        self.list.iter()
    }

    pub fn health(&self) -> &Health {
        self.list.health()
    }

    pub fn is_poisoned(&self) -> bool {
        self.list.is_poisoned()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.list.pool_stats()
    }

    /// Check the range list invariants.
    pub fn verify(&self) -> Result<()> {
        self.list.verify()
    }

    /// One line per range, from tick 0 up.
    pub fn state_string(&self) -> String {
        let mut out = String::new();
        for (i, range) in self.list.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&range.to_string());
        }
        out
    }

    /// Single-letter codes per range, e.g. `C[0-0] U[1-MAX]`.
    pub fn compact_string(&self) -> String {
        self.list
            .iter()
            .map(|r| format!("{}[{}-{}]", r.state().code(), r.start(), r.end()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<P: Clone> StateStream<P> {
    /// The range of `tick` widened over the completed runs on either side.
    ///
    /// After [`write_combined_range`](Self::write_combined_range) this is
    /// the value tick together with the silence around it. A side without
    /// a completed neighbour keeps the tick's own bound. State and payload
    /// are those of `tick`.
    pub fn find_completed_range(&mut self, tick: impl Into<Tick>) -> Range<P> {
        self.cursor_armed = false;
        let tick = tick.into();
        let (state, payload) = {
            let range = self.list.find_range(tick);
            (range.state(), range.payload().cloned())
        };

        let start = match tick.prev() {
            Some(prev) => {
                let before = self.list.find_range(prev);
                if before.state() == State::Completed {
                    before.start()
                } else {
                    tick
                }
            }
            None => tick,
        };
        let end = match tick.next() {
            Some(next) => {
                let after = self.list.find_range(next);
                if after.state() == State::Completed {
                    after.end()
                } else {
                    tick
                }
            }
            None => tick,
        };

        self.list.find_range(tick);
        Range {
            state,
            start,
            end,
            payload,
        }
    }

    // --- Writes ---

    /// Write `state` over `[start, end]`.
    ///
    /// With `error_check` an illegal transition anywhere in the span fails
    /// the call, leaves the ranges untouched and poisons the stream. Without
    /// it the state is forced in. Returns whether any tick changed.
    pub fn write_range(
        &mut self,
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
        payload: Option<P>,
        error_check: bool,
    ) -> Result<bool> {
        self.list.ensure_healthy()?;
        self.cursor_armed = false;
        let range = Range::with_payload(state, start, end, payload)?;
        self.list.set_range(range, error_check)
    }

    /// Record a value for a single tick.
    pub fn write_value_range(&mut self, tick: impl Into<Tick>, payload: Option<P>) -> Result<bool> {
        let tick = tick.into();
        self.write_range(State::Value, tick, tick, payload, true)
    }

    /// Complete `[start, end]` and return the merged completed range.
    pub fn write_completed_range(
        &mut self,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
    ) -> Result<Range<P>> {
        self.write_completed(start.into(), end.into(), true)
    }

    /// Complete `[start, end]` even over values, e.g. when a message is
    /// removed. Returns the merged completed range.
    pub fn write_completed_range_forced(
        &mut self,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
    ) -> Result<Range<P>> {
        self.write_completed(start.into(), end.into(), false)
    }

    fn write_completed(&mut self, start: Tick, end: Tick, error_check: bool) -> Result<Range<P>> {
        self.write_range(State::Completed, start, end, None, error_check)?;
        Ok(self.list.find_range(start).clone())
    }

    /// Write a message tick together with the silence around it.
    ///
    /// `[start, value_tick - 1]` and `[value_tick + 1, end]` become
    /// completed and `value_tick` takes `state` (normally `Value` or
    /// `Uncommitted`). All three parts are checked before any is written.
    pub fn write_combined_range(
        &mut self,
        state: State,
        value_tick: impl Into<Tick>,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
        payload: Option<P>,
    ) -> Result<bool> {
        self.list.ensure_healthy()?;
        self.cursor_armed = false;
        let (value_tick, start, end) = (value_tick.into(), start.into(), end.into());
        if value_tick < start {
            return Err(StreamError::InvalidRange {
                start,
                end: value_tick,
            });
        }
        if value_tick > end {
            return Err(StreamError::InvalidRange {
                start: value_tick,
                end,
            });
        }

        let before = match value_tick.prev() {
            Some(prev) if start <= prev => Some(Range::new(State::Completed, start, prev)?),
            _ => None,
        };
        let after = match value_tick.next() {
            Some(next) if next <= end => Some(Range::new(State::Completed, next, end)?),
            _ => None,
        };
        let value = Range::tick(state, value_tick, payload);

        for part in before.iter().chain(after.iter()) {
            self.list.check_range(part, true)?;
        }
        self.list.check_range(&value, true)?;

        let mut changed = false;
        for part in before.into_iter().chain(after) {
            changed |= self.list.set_range(part, true)?;
        }
        changed |= self.list.set_range(value, true)?;
        Ok(changed)
    }

    /// Raise the completed prefix to `prefix`, completing `[0, prefix]`.
    ///
    /// The owner asserts everything up to `prefix` is done, so the write is
    /// forced. A prefix at or below the current one is ignored. Returns
    /// whether the prefix moved.
    pub fn set_completed_prefix(&mut self, prefix: impl Into<Tick>) -> Result<bool> {
        self.list.ensure_healthy()?;
        let prefix = prefix.into();
        let current = self.completed_prefix();
        if prefix <= current {
            return Ok(false);
        }
        self.write_range(State::Completed, Tick::MIN, prefix, None, false)?;
        tracing::debug!("Completed prefix advanced from {} to {}", current, prefix);
        Ok(true)
    }
}

impl<P> Default for StateStream<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> fmt::Display for StateStream<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.state_string())
    }
}

impl<P> fmt::Debug for StateStream<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStream")
            .field("ranges", &self.compact_string())
            .field("health", self.list.health())
            .finish()
    }
}
