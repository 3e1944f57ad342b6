//! Wire shapes for snapshot and incremental-diff payloads.
//!
//! The server reports board state as nested maps:
//!
//! ```text
//! { "tickets": { <group>: { <id>: <ticket data> } },
//!   "otherChanges": [<id>, ...],
//!   "groups": [<group>, ...] }              // full snapshots only
//! ```
//!
//! When the board is grouped by status, `tickets` and `groups` carry one
//! extra workflow layer (`{ <workflow>: { <group>: ... } }`); the grouping
//! strategy flattens that away before reconciliation. `otherChanges` lists
//! ids that changed but fall outside the current query scope and must be
//! evicted if locally present.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::group::GroupName;
use crate::ticket::{ChangeStamp, Ticket, TicketId};

/// One ticket as reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketData {
    pub id: TicketId,
    /// Server change stamp; the key to "already seen" detection.
    #[serde(rename = "changetime")]
    pub stamp: ChangeStamp,
    #[serde(default)]
    pub position: Option<u64>,
    #[serde(rename = "priority_value", default)]
    pub priority: i64,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub hours: f64,
    #[serde(default)]
    pub effort: f64,
    /// Allowed target groups when grouping by status (workflow actions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<BTreeSet<GroupName>>,
    /// Remaining display fields, passed through untyped. Custom fields may
    /// carry any JSON value, not just strings.
    #[serde(default, flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl TicketData {
    /// Convert to the in-memory model.
    #[must_use]
    pub fn into_ticket(self) -> Ticket {
        Ticket {
            id: self.id,
            stamp: self.stamp,
            position: self.position,
            priority_rank: self.priority,
            summary: self.summary,
            hours: self.hours,
            effort: self.effort,
            fields: self.fields,
            allowed_targets: self.actions,
        }
    }

    /// Server-shape view of an in-memory ticket (echoed move responses).
    #[must_use]
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id,
            stamp: ticket.stamp.clone(),
            position: ticket.position,
            priority: ticket.priority_rank,
            summary: ticket.summary.clone(),
            hours: ticket.hours,
            effort: ticket.effort,
            actions: ticket.allowed_targets.clone(),
            fields: ticket.fields.clone(),
        }
    }
}

/// Tickets keyed by group, optionally nested one level deeper by workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TicketTree {
    /// `{ group: { id: data } }`, every grouping except status.
    Flat(BTreeMap<GroupName, BTreeMap<TicketId, TicketData>>),
    /// `{ workflow: { group: { id: data } } }`, status grouping.
    Nested(BTreeMap<String, BTreeMap<GroupName, BTreeMap<TicketId, TicketData>>>),
}

impl TicketTree {
    /// True when the tree carries no ticket data at all. An empty tree is
    /// ambiguous between the two variants (a quiet diff window serializes as
    /// `{}`), so callers must not read nesting intent into one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(groups) => groups.values().all(BTreeMap::is_empty),
            Self::Nested(workflows) => workflows
                .values()
                .all(|groups| groups.values().all(BTreeMap::is_empty)),
        }
    }
}

/// Authoritative group listing in a full snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GroupListing {
    Flat(Vec<GroupName>),
    Nested(BTreeMap<String, Vec<GroupName>>),
}

impl GroupListing {
    /// True when the listing names no group; like an empty [`TicketTree`],
    /// its variant carries no nesting intent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(groups) => groups.is_empty(),
            Self::Nested(workflows) => workflows.values().all(Vec::is_empty),
        }
    }
}

/// A snapshot or incremental-diff payload, as fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BoardPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets: Option<TicketTree>,
    /// Ids that changed but left the query scope; evict if present.
    #[serde(default, rename = "otherChanges", skip_serializing_if = "Vec::is_empty")]
    pub other_changes: Vec<TicketId>,
    /// Authoritative group set. Present on full snapshots only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<GroupListing>,
}
