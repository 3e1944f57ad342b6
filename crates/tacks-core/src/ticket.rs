//! Ticket identity and the in-memory ticket model.
//!
//! A [`Ticket`] is the client's view of one work item. Exactly one instance
//! exists per [`TicketId`] across the whole board; the owning
//! [`crate::collection::GroupedCollection`] enforces that invariant.
//!
//! The [`ChangeStamp`] is the server-assigned version marker. The client
//! never interprets it beyond equality: a differing stamp means "changed
//! since last observed", an equal stamp means "already seen".

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::group::GroupName;

/// Stable, server-assigned ticket identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TicketId(pub u64);

impl Serialize for TicketId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

// Ids arrive both as numbers and as JSON map keys, which are strings; the
// untagged payload enums buffer their content and hand keys over uncoerced,
// so both forms must be accepted here.
impl<'de> Deserialize<'de> for TicketId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl serde::de::Visitor<'_> for IdVisitor {
            type Value = TicketId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a ticket id as an integer or numeric string")
            }

            fn visit_u64<E: serde::de::Error>(self, raw: u64) -> Result<Self::Value, E> {
                Ok(TicketId(raw))
            }

            fn visit_i64<E: serde::de::Error>(self, raw: i64) -> Result<Self::Value, E> {
                u64::try_from(raw).map(TicketId).map_err(E::custom)
            }

            fn visit_str<E: serde::de::Error>(self, raw: &str) -> Result<Self::Value, E> {
                raw.parse().map(TicketId).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

impl TicketId {
    /// Raw numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for TicketId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Opaque server version marker used for optimistic-concurrency checks.
///
/// Monotonically meaningful on the server; the client only compares stamps
/// for equality to decide whether an update has already been seen, and sends
/// the last-known stamp with a move so the server can reject a stale base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ChangeStamp(String);

impl ChangeStamp {
    /// Wrap a raw stamp value.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw stamp string, as received from the server.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ChangeStamp {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for ChangeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One work item as held by the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    /// Server version marker at the time this ticket was last merged.
    pub stamp: ChangeStamp,
    /// Explicit ordinal within the backlog; `None` means unordered, and the
    /// tie-break fields decide placement.
    pub position: Option<u64>,
    /// Numeric priority used only as an ordering tie-break. Whether lower or
    /// higher means "more urgent" is a per-board constant
    /// ([`crate::order::PriorityDirection`]).
    pub priority_rank: i64,
    pub summary: String,
    /// Remaining hours, aggregated per group.
    pub hours: f64,
    /// Effort points, aggregated per group.
    pub effort: f64,
    /// Open map of additional display fields (owner, component, custom
    /// fields of any JSON type).
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// When grouping by status, the set of groups this ticket may legally
    /// move to (from the server's workflow actions). `None` = unrestricted.
    #[serde(default)]
    pub allowed_targets: Option<BTreeSet<GroupName>>,
}

impl Ticket {
    /// Minimal ticket with the given identity and stamp; display and
    /// aggregate fields start empty.
    #[must_use]
    pub fn new(id: TicketId, stamp: ChangeStamp) -> Self {
        Self {
            id,
            stamp,
            position: None,
            priority_rank: 0,
            summary: String::new(),
            hours: 0.0,
            effort: 0.0,
            fields: BTreeMap::new(),
            allowed_targets: None,
        }
    }

    /// True when the ticket has no explicit backlog position.
    #[must_use]
    pub const fn position_unset(&self) -> bool {
        self.position.is_none()
    }

    /// Whether a move into `target` is permitted by the ticket's workflow
    /// actions. Unrestricted tickets may move anywhere.
    #[must_use]
    pub fn may_move_to(&self, target: &GroupName) -> bool {
        self.allowed_targets
            .as_ref()
            .is_none_or(|allowed| allowed.contains(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_id_displays_with_hash_prefix() {
        assert_eq!(TicketId(42).to_string(), "#42");
    }

    #[test]
    fn ticket_id_parses_from_numbers_and_map_key_strings() {
        let id: TicketId = serde_json::from_str("42").expect("number form");
        assert_eq!(id, TicketId(42));
        let id: TicketId = serde_json::from_str("\"42\"").expect("string form");
        assert_eq!(id, TicketId(42));
    }

    #[test]
    fn change_stamp_compares_by_value_only() {
        assert_eq!(ChangeStamp::from("T1"), ChangeStamp::new("T1"));
        assert_ne!(ChangeStamp::from("T1"), ChangeStamp::from("T2"));
    }

    #[test]
    fn unrestricted_ticket_may_move_anywhere() {
        let ticket = Ticket::new(TicketId(1), ChangeStamp::from("T1"));
        assert!(ticket.may_move_to(&GroupName::from("review")));
    }

    #[test]
    fn restricted_ticket_checks_allowed_targets() {
        let mut ticket = Ticket::new(TicketId(1), ChangeStamp::from("T1"));
        ticket.allowed_targets = Some([GroupName::from("closed")].into_iter().collect());
        assert!(ticket.may_move_to(&GroupName::from("closed")));
        assert!(!ticket.may_move_to(&GroupName::from("accepted")));
    }
}
