//! Deterministic total ordering of tickets within a group.
//!
//! Both the user's drag gesture and the server's authoritative data must
//! agree on one canonical sequence, so the comparator is a strict total
//! order over any set of distinct tickets. Tie-break chain, each level only
//! consulted when the previous one is equal:
//!
//! 1. Positioned tickets sort before unpositioned ones.
//! 2. Explicit `position`, ascending.
//! 3. `priority_rank`, more urgent first; which end of the scale is urgent
//!    is a per-deployment constant ([`PriorityDirection`]).
//! 4. `id` descending (most recently created first).
//!
//! Distinct tickets always have distinct ids, so level 4 guarantees the
//! order is never ambiguous: sorting a shuffled copy of any set reconstructs
//! the same sequence.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::ticket::Ticket;

/// Which end of the numeric priority scale is "more urgent".
///
/// The backlog convention is `LowerFirst` (priority value 1 outranks 3);
/// deployments that feed an inverted scale configure `HigherFirst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityDirection {
    #[default]
    LowerFirst,
    HigherFirst,
}

/// Strict total order between two tickets of the same group.
#[must_use]
pub fn compare(a: &Ticket, b: &Ticket, direction: PriorityDirection) -> Ordering {
    positional(a, b)
        .then_with(|| match direction {
            PriorityDirection::LowerFirst => a.priority_rank.cmp(&b.priority_rank),
            PriorityDirection::HigherFirst => b.priority_rank.cmp(&a.priority_rank),
        })
        .then_with(|| b.id.cmp(&a.id))
}

/// Levels 1 and 2: positioned-ness, then explicit position ascending.
fn positional(a: &Ticket, b: &Ticket) -> Ordering {
    match (a.position, b.position) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Index at which `candidate` belongs within `members`: the first member the
/// candidate sorts before, or `members.len()` to append.
///
/// `members` must already be in comparator order.
pub fn insertion_index<'a, I>(members: I, candidate: &Ticket, direction: PriorityDirection) -> usize
where
    I: IntoIterator<Item = &'a Ticket>,
{
    let mut index = 0;
    for member in members {
        if compare(candidate, member, direction) == Ordering::Less {
            return index;
        }
        index += 1;
    }
    index
}
