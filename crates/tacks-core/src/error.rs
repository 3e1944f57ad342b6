//! Errors raised by the model layer.

use crate::group::GroupName;
use crate::ticket::TicketId;

/// Errors from [`crate::collection::GroupedCollection`] operations.
///
/// All of these are local contract violations; none involve the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectionError {
    /// The named group is not registered on this board.
    #[error("unknown group '{0}'")]
    UnknownGroup(GroupName),

    /// No ticket with this id is present anywhere on the board.
    #[error("unknown ticket {0}")]
    UnknownTicket(TicketId),

    /// The ticket id is already present; one instance per id, board-wide.
    #[error("ticket {0} is already on the board")]
    DuplicateTicket(TicketId),

    /// Showing another group would exceed the simultaneous-group cap.
    /// Rejected locally, without a network round-trip.
    #[error("cannot show more than {limit} groups at once")]
    CapacityExceeded { limit: usize },

    /// The reorder anchor is not a member of the moved ticket's group.
    #[error("anchor ticket {0} is not in the same group")]
    AnchorOutsideGroup(TicketId),
}
