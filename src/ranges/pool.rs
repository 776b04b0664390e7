//! Slot arena with free-list recycling for range nodes.

use crate::error::{Result, StreamError};
use crate::types::{Range, State, Tick};

/// Default number of idle slots kept for reuse.
pub const DEFAULT_POOL_CAPACITY: usize = 64;

/// Stable handle to a slot in a [`RangePool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

/// A pooled range plus its list links.
#[derive(Debug)]
pub(crate) struct Slot<P> {
    pub(crate) range: Range<P>,
    pub(crate) prev: Option<SlotId>,
    pub(crate) next: Option<SlotId>,
    /// Set while the slot is part of a range list.
    pub(crate) linked: bool,
    /// Set between `acquire` and `release`.
    in_use: bool,
}

/// Pool usage counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Slots created because the free list was empty.
    pub allocated: u64,
    /// Acquisitions served from the free list.
    pub reused: u64,
    /// Slots handed back.
    pub released: u64,
    /// Released slots dropped instead of kept idle.
    pub trimmed: u64,
    /// Slots currently acquired.
    pub live: usize,
    /// Slots waiting on the free list.
    pub idle: usize,
}

/// Arena of range nodes addressed by [`SlotId`].
///
/// Released slots go onto a free list and are reset in place on the next
/// acquisition. `capacity` bounds how many idle slots are worth keeping: a
/// release that would exceed it drops the slot when it sits at the end of
/// the arena. Exceeding the capacity never fails; it only allocates.
#[derive(Debug)]
pub struct RangePool<P> {
    slots: Vec<Slot<P>>,
    free: Vec<SlotId>,
    capacity: usize,
    stats: PoolStats,
}

impl<P> RangePool<P> {
    /// Create a pool that keeps up to `capacity` idle slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Issue a slot holding `[start, end]` in `state`.
    ///
    /// An idle slot is reset in place; only an empty free list allocates.
    /// Inverted bounds fail without consuming a slot.
    pub fn acquire(
        &mut self,
        state: State,
        start: Tick,
        end: Tick,
        payload: Option<P>,
    ) -> Result<SlotId> {
        let Some(&id) = self.free.last() else {
            return Ok(self.allocate(Range::with_payload(state, start, end, payload)?));
        };

        let slot = &mut self.slots[id.0];
        slot.range.reset(state, start, end, payload)?;
        slot.prev = None;
        slot.next = None;
        slot.linked = false;
        slot.in_use = true;
        self.free.pop();
        self.stats.reused += 1;
        Ok(id)
    }

    /// Push a fresh slot for an already validated range.
    pub(crate) fn allocate(&mut self, range: Range<P>) -> SlotId {
        let id = SlotId(self.slots.len());
        self.slots.push(Slot {
            range,
            prev: None,
            next: None,
            linked: false,
            in_use: true,
        });
        self.stats.allocated += 1;
        if self.slots.len() > self.capacity && self.slots.len().is_power_of_two() {
            tracing::debug!("Range pool grew to {} slots", self.slots.len());
        }
        id
    }

    /// Return a slot to the pool, dropping its payload.
    ///
    /// Releasing a slot that is still linked into a list, or that is not
    /// currently acquired, is an internal consistency failure.
    pub fn release(&mut self, id: SlotId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id.0)
            .ok_or_else(|| StreamError::Corrupted(format!("release of unknown slot {}", id.0)))?;

        if slot.linked {
            return Err(StreamError::Corrupted(format!(
                "release of slot {} still linked as {}",
                id.0, slot.range
            )));
        }
        if !slot.in_use {
            return Err(StreamError::Corrupted(format!(
                "slot {} released twice",
                id.0
            )));
        }

        slot.in_use = false;
        slot.prev = None;
        slot.next = None;
        slot.range.payload = None;
        self.stats.released += 1;

        if self.free.len() >= self.capacity && id.0 + 1 == self.slots.len() {
            self.slots.pop();
            self.stats.trimmed += 1;
            tracing::debug!(
                "Range pool trimmed slot {} ({} idle kept)",
                id.0,
                self.free.len()
            );
        } else {
            self.free.push(id);
        }
        Ok(())
    }

    /// Snapshot of the usage counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            live: self.slots.len() - self.free.len(),
            idle: self.free.len(),
            ..self.stats.clone()
        }
    }

    // Internal accessors. Ids handed out by `acquire` stay valid until
    // `release`, and the list never keeps a released id.

    pub(crate) fn slot(&self, id: SlotId) -> &Slot<P> {
        &self.slots[id.0]
    }

    pub(crate) fn slot_mut(&mut self, id: SlotId) -> &mut Slot<P> {
        &mut self.slots[id.0]
    }

    pub(crate) fn range(&self, id: SlotId) -> &Range<P> {
        &self.slots[id.0].range
    }

    pub(crate) fn range_mut(&mut self, id: SlotId) -> &mut Range<P> {
        &mut self.slots[id.0].range
    }
}

impl<P> Default for RangePool<P> {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}
