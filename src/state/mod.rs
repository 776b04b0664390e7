//! Tick states and the transition protocol between them.
//!
//! Every write into a stream is checked cell by cell against a fixed
//! transition matrix. The matrix is total over all 81 `(new, old)` pairs and
//! returns [`State::Error`] for overwrites the protocol forbids.

mod transition;

pub use transition::{is_valid_transition, transition};
