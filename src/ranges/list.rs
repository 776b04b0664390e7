//! Ordered range list covering every tick from `Tick::MIN` to `Tick::MAX`.

use super::pool::{PoolStats, RangePool, SlotId, DEFAULT_POOL_CAPACITY};
use crate::error::{Result, StreamError};
use crate::state::transition;
use crate::types::{Range, State, Tick};

/// Whether a list still accepts mutations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Health {
    Ok,
    /// Latched by the first fatal failure; carries its description.
    Poisoned(String),
}

/// Run-length encoded map from ticks to states.
///
/// The ranges partition `[Tick::MIN, Tick::MAX]` with no gaps or overlaps,
/// the list starts with the completed genesis tick `[0, 0]`, and no two
/// neighbouring ranges are both `Completed`.
///
/// Lookups walk from a cursor that stays where the last operation left it,
/// which is cheap for the mostly sequential traffic of a message stream.
/// The cursor is shared by reads and writes: any write invalidates an
/// iteration in progress through [`RangeList::next`] / [`RangeList::previous`].
/// A list is meant for a single owner; wrap it in a lock to share it.
#[derive(Debug)]
pub struct RangeList<P> {
    pool: RangePool<P>,
    head: SlotId,
    tail: SlotId,
    cursor: SlotId,
    len: usize,
    health: Health,
    /// Reused segment buffer for `set_range`.
    scratch: Vec<(Tick, Tick)>,
}

impl<P> RangeList<P> {
    /// Create a list holding `[0, 0] Completed` and `[1, MAX] Unknown`.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Create a list whose pool keeps up to `capacity` idle slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut pool = RangePool::new(capacity);
        let head = pool.allocate(Range::tick(State::Completed, Tick::MIN, None));
        let tail = pool.allocate(Range {
            state: State::Unknown,
            start: Tick(1),
            end: Tick::MAX,
            payload: None,
        });

        let mut list = Self {
            pool,
            head,
            tail,
            cursor: head,
            len: 0,
            health: Health::Ok,
            scratch: Vec::new(),
        };
        list.link_between(None, head, None);
        list.link_between(Some(head), tail, None);
        list
    }

    /// Number of ranges in the list.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: the list covers every tick.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn health(&self) -> &Health {
        &self.health
    }

    pub fn is_poisoned(&self) -> bool {
        matches!(self.health, Health::Poisoned(_))
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// The range starting at `Tick::MIN`.
    pub fn first(&self) -> &Range<P> {
        self.pool.range(self.head)
    }

    /// The range ending at `Tick::MAX`.
    pub fn last(&self) -> &Range<P> {
        self.pool.range(self.tail)
    }

    /// The range under the cursor.
    pub fn cursor(&self) -> &Range<P> {
        self.pool.range(self.cursor)
    }

    /// Move the cursor to the range covering `tick` and return it.
    pub fn find_range(&mut self, tick: impl Into<Tick>) -> &Range<P> {
        let id = self.seek(tick.into());
        self.pool.range(id)
    }

    pub fn move_cursor_to_start(&mut self) -> &Range<P> {
        self.cursor = self.head;
        self.pool.range(self.cursor)
    }

    pub fn move_cursor_to_end(&mut self) -> &Range<P> {
        self.cursor = self.tail;
        self.pool.range(self.cursor)
    }

    /// Step the cursor forward. `None` (and no move) at the last range.
    pub fn next(&mut self) -> Option<&Range<P>> {
        let next = self.pool.slot(self.cursor).next?;
        self.cursor = next;
        Some(self.pool.range(next))
    }

    /// Step the cursor backward. `None` (and no move) at the first range.
    pub fn previous(&mut self) -> Option<&Range<P>> {
        let prev = self.pool.slot(self.cursor).prev?;
        self.cursor = prev;
        Some(self.pool.range(prev))
    }

    /// Whether any tick in `[start, end]` is in `state`. An inverted
    /// window holds no ticks.
    pub fn contains_state(
        &mut self,
        state: State,
        start: impl Into<Tick>,
        end: impl Into<Tick>,
    ) -> bool {
        let (start, end) = (start.into(), end.into());
        if start > end {
            return false;
        }
        let mut id = self.seek(start);
        loop {
            let slot = self.pool.slot(id);
            if slot.range.start > end {
                return false;
            }
            if slot.range.state == state {
                return true;
            }
            match slot.next {
                Some(next) => {
                    id = next;
                    self.cursor = next;
                }
                None => return false,
            }
        }
    }

    /// Iterate over the ranges in tick order without touching the cursor.
    pub fn iter(&self) -> Iter<'_, P> {
        Iter {
            pool: &self.pool,
            next: Some(self.head),
        }
    }

    /// Check the structural invariants, reporting the first violation.
    pub fn verify(&self) -> Result<()> {
        let first = self.first();
        if first.start != Tick::MIN {
            return Err(StreamError::Corrupted(format!(
                "first range {} does not start at 0",
                first
            )));
        }
        if self.last().end != Tick::MAX {
            return Err(StreamError::Corrupted(format!(
                "last range {} does not end at MAX",
                self.last()
            )));
        }

        let mut count = 0;
        let mut prev: Option<&Range<P>> = None;
        for range in self.iter() {
            count += 1;
            if range.state == State::Error {
                return Err(StreamError::Corrupted(format!("stored error range {}", range)));
            }
            if let Some(prev) = prev {
                if prev.end.next() != Some(range.start) {
                    return Err(StreamError::Corrupted(format!(
                        "{} is not followed contiguously by {}",
                        prev, range
                    )));
                }
                if prev.state == State::Completed && range.state == State::Completed {
                    return Err(StreamError::Corrupted(format!(
                        "adjacent completed ranges {} and {}",
                        prev, range
                    )));
                }
            }
            prev = Some(range);
        }

        if count != self.len {
            return Err(StreamError::Corrupted(format!(
                "walked {} ranges but length is {}",
                count, self.len
            )));
        }
        Ok(())
    }

    /// Hill-climb from the cursor to the range covering `tick`.
    ///
    /// The terminal ranges are checked first so jumps back to the completed
    /// prefix or out to the unknown tail are O(1).
    fn seek(&mut self, tick: Tick) -> SlotId {
        let mut id = if self.pool.range(self.head).contains(tick) {
            self.head
        } else if self.pool.range(self.tail).contains(tick) {
            self.tail
        } else {
            self.cursor
        };

        loop {
            let slot = self.pool.slot(id);
            let distance = slot.range.distance_to(tick);
            let step = if distance > 0 {
                slot.next
            } else if distance < 0 {
                slot.prev
            } else {
                None
            };
            match step {
                Some(next) => id = next,
                None => break,
            }
        }

        tracing::trace!("seek {} stopped at {}", tick, self.pool.range(id));
        self.cursor = id;
        id
    }

    /// Seek and insist the stop really covers `tick`.
    fn locate(&mut self, tick: Tick) -> Result<SlotId> {
        let id = self.seek(tick);
        if self.pool.range(id).contains(tick) {
            Ok(id)
        } else {
            Err(StreamError::Corrupted(format!(
                "no range covers tick {} (stopped at {})",
                tick,
                self.pool.range(id)
            )))
        }
    }

    /// Fail with [`StreamError::Poisoned`] once the list is latched.
    pub fn ensure_healthy(&self) -> Result<()> {
        match &self.health {
            Health::Ok => Ok(()),
            Health::Poisoned(cause) => Err(StreamError::Poisoned(cause.clone())),
        }
    }

    /// Latch the list on a fatal error and hand the error back.
    fn poison(&mut self, error: StreamError) -> StreamError {
        if error.is_fatal() && !self.is_poisoned() {
            tracing::error!("Range list poisoned: {}", error);
            self.health = Health::Poisoned(error.to_string());
        }
        error
    }

    fn link_between(&mut self, prev: Option<SlotId>, id: SlotId, next: Option<SlotId>) {
        let slot = self.pool.slot_mut(id);
        slot.prev = prev;
        slot.next = next;
        slot.linked = true;

        match prev {
            Some(prev) => self.pool.slot_mut(prev).next = Some(id),
            None => self.head = id,
        }
        match next {
            Some(next) => self.pool.slot_mut(next).prev = Some(id),
            None => self.tail = id,
        }
        self.len += 1;
    }

    /// Detach a node whose neighbours are relinked by the caller.
    fn detach(&mut self, id: SlotId) -> Result<()> {
        let slot = self.pool.slot_mut(id);
        slot.linked = false;
        slot.prev = None;
        slot.next = None;
        self.len -= 1;
        self.pool.release(id)
    }

    /// Unlink a node and stitch its neighbours together.
    fn remove(&mut self, id: SlotId) -> Result<()> {
        let (prev, next) = {
            let slot = self.pool.slot(id);
            (slot.prev, slot.next)
        };
        match prev {
            Some(prev) => self.pool.slot_mut(prev).next = next,
            None => {
                self.head = next.ok_or_else(|| {
                    StreamError::Corrupted("removal would empty the range list".into())
                })?
            }
        }
        match next {
            Some(next) => self.pool.slot_mut(next).prev = prev,
            None => {
                self.tail = prev.ok_or_else(|| {
                    StreamError::Corrupted("removal would empty the range list".into())
                })?
            }
        }
        if self.cursor == id {
            self.cursor = prev.or(next).unwrap_or(self.head);
        }
        self.detach(id)
    }
}

impl<P: Clone> RangeList<P> {
    /// Write `candidate` into the list.
    ///
    /// Every range the candidate overlaps is checked against the transition
    /// matrix before anything changes. With `error_check` an illegal
    /// overwrite poisons the list and leaves it untouched; without it the
    /// candidate state is forced in. Parts whose transition keeps the stored
    /// state (same state, or an absorbing `Completed` tick) are left alone.
    ///
    /// Returns whether any tick changed.
    pub fn set_range(&mut self, candidate: Range<P>, error_check: bool) -> Result<bool> {
        self.ensure_healthy()?;
        tracing::trace!(
            "set_range {} error_check={} ({} ranges)",
            candidate,
            error_check,
            self.len
        );

        let mut segments = std::mem::take(&mut self.scratch);
        let result = self
            .plan(&candidate, error_check, &mut segments)
            .and_then(|()| self.apply(candidate, &segments));
        segments.clear();
        self.scratch = segments;

        match result {
            Ok(changed) => {
                tracing::trace!("set_range changed={} ({} ranges)", changed, self.len);
                Ok(changed)
            }
            Err(e) => Err(self.poison(e)),
        }
    }

    /// Validate `candidate` exactly as [`RangeList::set_range`] would,
    /// without writing it. A failure poisons the list just the same.
    pub fn check_range(&mut self, candidate: &Range<P>, error_check: bool) -> Result<()> {
        self.ensure_healthy()?;

        let mut segments = std::mem::take(&mut self.scratch);
        let result = self.plan(candidate, error_check, &mut segments);
        segments.clear();
        self.scratch = segments;

        result.map_err(|e| self.poison(e))
    }

    /// Collect the sub-ranges of `candidate` that would change.
    fn plan(
        &mut self,
        candidate: &Range<P>,
        error_check: bool,
        segments: &mut Vec<(Tick, Tick)>,
    ) -> Result<()> {
        segments.clear();
        let mut id = self.locate(candidate.start)?;

        if candidate.state == State::Error {
            return Err(StreamError::InvalidTransition {
                tick: candidate.start,
                from: self.pool.range(id).state,
                to: State::Error,
            });
        }

        loop {
            let slot = self.pool.slot(id);
            let range = &slot.range;
            let start = range.start.max(candidate.start);
            let end = range.end.min(candidate.end);

            let result = transition(candidate.state, range.state);
            if result == State::Error && error_check {
                return Err(StreamError::InvalidTransition {
                    tick: start,
                    from: range.state,
                    to: candidate.state,
                });
            }

            // A forced write stores the candidate state where the matrix
            // says error, so anything not keeping the old state changes.
            if result != range.state {
                match segments.last_mut() {
                    Some(last) if last.1.next() == Some(start) => last.1 = end,
                    _ => segments.push((start, end)),
                }
            }

            if range.end >= candidate.end {
                return Ok(());
            }

            let next = slot.next.ok_or_else(|| {
                StreamError::Corrupted(format!(
                    "range list ends at {} before covering {}",
                    range.end, candidate.end
                ))
            })?;
            if range.end.next() != Some(self.pool.range(next).start) {
                return Err(StreamError::Corrupted(format!(
                    "gap or overlap between {} and {}",
                    range,
                    self.pool.range(next)
                )));
            }
            id = next;
        }
    }

    fn apply(&mut self, candidate: Range<P>, segments: &[(Tick, Tick)]) -> Result<bool> {
        let Range {
            state, mut payload, ..
        } = candidate;

        for (i, &(start, end)) in segments.iter().enumerate() {
            let segment_payload = if i + 1 == segments.len() {
                payload.take()
            } else {
                payload.clone()
            };
            self.splice(state, start, end, segment_payload)?;
        }
        Ok(!segments.is_empty())
    }

    /// Replace `[start, end]` with a single new range.
    ///
    /// The range covering `start` is either split around the new one,
    /// trimmed to end just before it, or swallowed. Ranges after it are
    /// swallowed until one reaches past `end`, which is trimmed to start
    /// just after it. Completed neighbours are then merged in.
    fn splice(&mut self, state: State, start: Tick, end: Tick, payload: Option<P>) -> Result<()> {
        let covered = self.locate(start)?;
        let (covered_state, covered_start, covered_end) = {
            let range = self.pool.range(covered);
            (range.state, range.start, range.end)
        };
        let new_id = self.pool.acquire(state, start, end, payload)?;

        if covered_start < start && end < covered_end {
            // Strictly interior: [covered_start, start-1] new [end+1, covered_end].
            let tail_payload = self.pool.range(covered).payload.clone();
            let tail = self
                .pool
                .acquire(covered_state, Tick(end.0 + 1), covered_end, tail_payload)?;
            let after = self.pool.slot(covered).next;
            self.pool.range_mut(covered).end = Tick(start.0 - 1);
            self.link_between(Some(covered), tail, after);
            self.link_between(Some(covered), new_id, Some(tail));
        } else {
            let splice_after = if covered_start < start {
                self.pool.range_mut(covered).end = Tick(start.0 - 1);
                Some(covered)
            } else {
                self.pool.slot(covered).prev
            };

            let mut next = match splice_after {
                Some(id) => self.pool.slot(id).next,
                None => Some(self.head),
            };
            while let Some(id) = next {
                let (range_start, range_end) = {
                    let range = self.pool.range(id);
                    (range.start, range.end)
                };
                if range_end > end {
                    if range_start <= end {
                        self.pool.range_mut(id).start = Tick(end.0 + 1);
                    }
                    break;
                }
                next = self.pool.slot(id).next;
                self.detach(id)?;
            }

            if next.is_none() && end != Tick::MAX {
                return Err(StreamError::Corrupted(format!(
                    "no range follows the write ending at {}",
                    end
                )));
            }
            self.link_between(splice_after, new_id, next);
        }

        self.cursor = new_id;
        if state == State::Completed {
            self.merge_completed(new_id)?;
        }
        Ok(())
    }

    /// Fold completed neighbours of `id` into it.
    fn merge_completed(&mut self, id: SlotId) -> Result<()> {
        if let Some(prev) = self.pool.slot(id).prev {
            if self.pool.range(prev).state == State::Completed {
                let start = self.pool.range(prev).start;
                self.remove(prev)?;
                self.pool.range_mut(id).start = start;
            }
        }
        if let Some(next) = self.pool.slot(id).next {
            if self.pool.range(next).state == State::Completed {
                let end = self.pool.range(next).end;
                self.remove(next)?;
                self.pool.range_mut(id).end = end;
            }
        }
        self.cursor = id;
        Ok(())
    }
}

impl<P> Default for RangeList<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the ranges of a [`RangeList`].
pub struct Iter<'a, P> {
    pool: &'a RangePool<P>,
    next: Option<SlotId>,
}

impl<'a, P> Iterator for Iter<'a, P> {
    type Item = &'a Range<P>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let slot = self.pool.slot(id);
        self.next = slot.next;
        Some(&slot.range)
    }
}
