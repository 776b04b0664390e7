//! Property tests: random write sequences checked against a per-tick model.

use proptest::prelude::*;
use tickstream::{transition, State, StateStream, StreamError, Tick};

/// Writes stay inside `[0, LIMIT]`; everything above stays unknown.
const LIMIT: u64 = 250;

const STORABLE: [State; 8] = [
    State::Unknown,
    State::Requested,
    State::Uncommitted,
    State::Value,
    State::Discarded,
    State::Accepted,
    State::Rejected,
    State::Completed,
];

#[derive(Clone, Debug)]
struct Write {
    state: State,
    start: u64,
    end: u64,
    error_check: bool,
}

fn write_strategy() -> impl Strategy<Value = Write> {
    (
        0..STORABLE.len(),
        0..=LIMIT,
        0u64..20,
        prop::bool::weighted(0.3),
    )
        .prop_map(|(state, start, len, error_check)| Write {
            state: STORABLE[state],
            start,
            end: (start + len).min(LIMIT),
            error_check,
        })
}

/// One entry per tick in `[0, LIMIT]`.
struct Model {
    ticks: Vec<(State, Option<u32>)>,
}

impl Model {
    fn new() -> Self {
        let mut ticks = vec![(State::Unknown, None); LIMIT as usize + 1];
        ticks[0].0 = State::Completed;
        Self { ticks }
    }

    /// `None` when a checked write hits an illegal transition, otherwise
    /// whether any tick changed.
    fn apply(&mut self, write: &Write, payload: Option<u32>) -> Option<bool> {
        let span = write.start as usize..=write.end as usize;
        if write.error_check
            && self.ticks[span.clone()]
                .iter()
                .any(|(old, _)| transition(write.state, *old) == State::Error)
        {
            return None;
        }

        let mut changed = false;
        for tick in &mut self.ticks[span] {
            if transition(write.state, tick.0) != tick.0 {
                *tick = (write.state, payload);
                changed = true;
            }
        }
        Some(changed)
    }

    fn completed_prefix(&self) -> u64 {
        let run = self
            .ticks
            .iter()
            .take_while(|(state, _)| *state == State::Completed)
            .count();
        run as u64 - 1
    }
}

/// Completed writes carry no payload, so merged completed runs agree
/// with the model tick by tick.
fn payload_for(write: &Write, index: usize) -> Option<u32> {
    if write.state == State::Completed {
        None
    } else {
        Some(index as u32)
    }
}

fn forced_stream(writes: &[Write]) -> StateStream<u32> {
    let mut stream = StateStream::new();
    for (i, write) in writes.iter().enumerate() {
        stream
            .write_range(write.state, write.start, write.end, payload_for(write, i), false)
            .unwrap();
    }
    stream
}

proptest! {
    /// Every tick reads back what the model predicts after every write.
    #[test]
    fn stream_matches_tick_model(writes in prop::collection::vec(write_strategy(), 1..40)) {
        let mut stream = StateStream::<u32>::new();
        let mut model = Model::new();

        for (i, write) in writes.iter().enumerate() {
            let payload = payload_for(write, i);
            let expected = model.apply(write, payload);
            let result = stream.write_range(write.state, write.start, write.end, payload, write.error_check);

            match expected {
                Some(changed) => {
                    prop_assert_eq!(result.ok(), Some(changed));
                }
                None => {
                    let rejected = matches!(result, Err(StreamError::InvalidTransition { .. }));
                    prop_assert!(rejected);
                    prop_assert!(stream.is_poisoned());
                }
            }

            prop_assert!(stream.verify().is_ok());
            for (tick, (state, payload)) in model.ticks.iter().enumerate() {
                let range = stream.get_range(tick as u64);
                prop_assert_eq!(range.state(), *state, "tick {}", tick);
                prop_assert_eq!(range.payload().copied(), *payload, "tick {}", tick);
            }
            prop_assert_eq!(stream.get_state(LIMIT + 1), State::Unknown);
            prop_assert_eq!(stream.get_state(Tick::MAX), State::Unknown);
            prop_assert_eq!(stream.completed_prefix(), Tick(model.completed_prefix()));

            if expected.is_none() {
                break;
            }
        }
    }

    /// Repeating a successful write is a no-op.
    #[test]
    fn repeated_write_changes_nothing(writes in prop::collection::vec(write_strategy(), 1..40)) {
        let mut stream = StateStream::<u32>::new();

        for write in &writes {
            if stream.write_range(write.state, write.start, write.end, None, write.error_check).is_err() {
                break;
            }
            let before = stream.compact_string();
            let again = stream.write_range(write.state, write.start, write.end, None, write.error_check);
            prop_assert_eq!(again.ok(), Some(false));
            prop_assert_eq!(stream.compact_string(), before);
        }
    }

    /// Forced writes never fail and never leave a range list out of shape.
    #[test]
    fn forced_writes_keep_invariants(writes in prop::collection::vec(write_strategy(), 1..60)) {
        let stream = forced_stream(&writes);

        prop_assert!(!stream.is_poisoned());
        prop_assert!(stream.verify().is_ok());

        let ranges: Vec<_> = stream.iter().collect();
        prop_assert_eq!(ranges[0].start(), Tick::MIN);
        prop_assert_eq!(ranges[0].state(), State::Completed);
        prop_assert_eq!(ranges[ranges.len() - 1].end(), Tick::MAX);
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end().next(), Some(pair[1].start()));
            prop_assert!(
                !(pair[0].state() == State::Completed && pair[1].state() == State::Completed)
            );
        }
    }

    /// Stepping from any tick visits the same ranges as iteration.
    #[test]
    fn cursor_walks_agree_with_iteration(
        writes in prop::collection::vec(write_strategy(), 1..30),
        from in 0..=LIMIT,
    ) {
        let mut stream = forced_stream(&writes);
        let ranges: Vec<(Tick, Tick, State)> = stream
            .iter()
            .map(|r| (r.start(), r.end(), r.state()))
            .collect();
        let covering = ranges
            .iter()
            .position(|&(start, end, _)| start <= Tick(from) && Tick(from) <= end)
            .unwrap();

        let mut forward = Vec::new();
        stream.set_cursor(from);
        while let Some(r) = stream.get_next() {
            forward.push((r.start(), r.end(), r.state()));
        }
        prop_assert_eq!(&forward[..], &ranges[covering..]);

        let mut backward = Vec::new();
        stream.set_cursor(from);
        while let Some(r) = stream.get_prev() {
            backward.push((r.start(), r.end(), r.state()));
        }
        backward.reverse();
        prop_assert_eq!(&backward[..], &ranges[..=covering]);
    }
}
