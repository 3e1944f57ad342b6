//! tacks-core: the model layer for live, collaborative ticket boards.
//!
//! Pure and synchronous: the ticket/group data model, the deterministic
//! in-group ordering, the grouped collection with running aggregates, and
//! the reconciliation engine that merges server change feeds into local
//! state. Networking and scheduling live in `tacks-live`.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums on fallible operations; `anyhow`
//!   only at the configuration boundary.
//! - **Logging**: `tracing` macros (`debug!`, `warn!`) at merge and
//!   eviction points.

pub mod collection;
pub mod config;
pub mod error;
pub mod group;
pub mod order;
pub mod payload;
pub mod reconcile;
pub mod strategy;
pub mod ticket;

pub use collection::{Anchor, GroupedCollection, MovedFrom};
pub use config::BoardConfig;
pub use error::CollectionError;
pub use group::{Group, GroupName, GroupStats};
pub use order::PriorityDirection;
pub use payload::{BoardPayload, TicketData};
pub use reconcile::{MergeOrigin, MergeOutcome};
pub use strategy::{ChangeSet, GroupingStrategy};
pub use ticket::{ChangeStamp, Ticket, TicketId};
