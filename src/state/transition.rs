//! The transition matrix.

use crate::types::State;

use crate::types::State::{
    Accepted as Acc, Completed as Com, Discarded as Dis, Error as Bad, Rejected as Rej,
    Requested as Req, Uncommitted as Unc, Unknown as Unk, Value as Val,
};

/// Indexed `[new][old]`, in the order of [`State::ALL`].
const MATRIX: [[State; 9]; 9] = [
    //            Unk  Req  Unc  Val  Dis  Acc  Rej  Com  Bad
    /* Unk */    [Unk, Bad, Bad, Bad, Bad, Bad, Bad, Com, Bad],
    /* Req */    [Req, Req, Bad, Bad, Bad, Bad, Bad, Com, Bad],
    /* Unc */    [Unc, Unc, Unc, Bad, Bad, Bad, Bad, Com, Bad],
    /* Val */    [Val, Val, Val, Val, Bad, Bad, Bad, Com, Bad],
    /* Dis */    [Dis, Dis, Dis, Bad, Dis, Bad, Bad, Com, Bad],
    /* Acc */    [Acc, Acc, Bad, Acc, Bad, Acc, Bad, Com, Bad],
    /* Rej */    [Rej, Rej, Bad, Rej, Bad, Bad, Rej, Com, Bad],
    /* Com */    [Com, Com, Com, Bad, Com, Com, Com, Com, Bad],
    /* Bad */    [Bad, Bad, Bad, Bad, Bad, Bad, Bad, Bad, Bad],
];

/// Resulting state when `new` is written over a tick currently in `old`.
///
/// Returns [`State::Error`] when the overwrite is illegal. Completed ticks
/// absorb every legal write; a value can only be completed by a forced
/// write.
pub fn transition(new: State, old: State) -> State {
    MATRIX[new.index()][old.index()]
}

/// Whether writing `new` over `old` is allowed.
pub fn is_valid_transition(new: State, old: State) -> bool {
    transition(new, old) != State::Error
}
