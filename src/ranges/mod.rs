//! Range list implementation.
//!
//! Ranges live in a slot arena ([`RangePool`]) and are linked into an
//! ordered list ([`RangeList`]) that covers every tick exactly once.
//! Superseded ranges go back to the pool's free list, so steady-state
//! writes allocate nothing.

mod list;
mod pool;

pub use list::{Health, Iter, RangeList};
pub use pool::{PoolStats, RangePool, SlotId, DEFAULT_POOL_CAPACITY};
