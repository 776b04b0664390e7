//! # Tick Streams
//!
//! A compact map from message sequence numbers ("ticks") to what a
//! guaranteed-delivery message processor believes happened to each of them.
//!
//! ## Core Concepts
//!
//! - **Ticks**: Positions `0..=u64::MAX` in one message stream
//! - **Ranges**: Runs of ticks sharing a state, stored run-length encoded
//! - **Transitions**: A fixed matrix deciding which overwrites are legal
//! - **Poisoning**: The first illegal write latches the stream read-only
//!
//! ## Example
//!
//! ```
//! use tickstream::{State, StateStream, Tick};
//!
//! let mut stream = StateStream::<&str>::new();
//!
//! // A message arrives for tick 10
//! stream.write_value_range(10, Some("order-created"))?;
//! assert_eq!(stream.get_state(10), State::Value);
//! assert_eq!(stream.get_state(9), State::Unknown);
//!
//! // Everything up to 20 is done
//! stream.set_completed_prefix(20)?;
//! assert_eq!(stream.completed_prefix(), Tick(20));
//! # Ok::<(), tickstream::StreamError>(())
//! ```

pub mod error;
pub mod ranges;
pub mod shared;
pub mod state;
pub mod stream;
pub mod types;

// Re-exports
pub use error::{Result, StreamError};
pub use ranges::{Health, PoolStats, RangeList, RangePool, SlotId};
pub use shared::SharedStateStream;
pub use state::{is_valid_transition, transition};
pub use stream::{StateStream, StreamConfig};
pub use types::{Range, State, Tick};
