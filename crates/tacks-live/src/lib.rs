//! tacks-live: the async layer that keeps a board alive.
//!
//! Wraps a [`tacks_core::GroupedCollection`] with everything that touches a
//! server or a clock: the polling scheduler, the optimistic move
//! controller, and the board session that ties both to a transport. The
//! transport trait is the only networking seam; all policy above it is
//! value-in, value-out and unit-testable.

pub mod error;
pub mod moves;
pub mod schedule;
pub mod session;
pub mod transport;

pub use error::{FailureKind, MoveError, TransportError};
pub use moves::{MoveController, MoveIntent, MoveLedger, StagedEntry};
pub use schedule::{FetchPlan, PollSchedule};
pub use session::{BoardSession, Notice};
pub use transport::{BoardTransport, MoveRequest, MoveResponse, PositionHint, TicketRef};
