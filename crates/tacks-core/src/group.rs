//! Groups: named buckets of tickets with running aggregates.
//!
//! A group owns an *ordered* sequence of ticket ids (order imposed by
//! [`crate::order`], never by arrival) plus aggregates that must always equal
//! the sum over current members. Membership and aggregates change in the
//! same step; there is no observable state where they disagree.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketId};

/// A group's name. The reserved empty string is the default/"no value"
/// bucket (unassigned owner, no milestone, ...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct GroupName(String);

impl GroupName {
    /// The reserved "no value" bucket.
    #[must_use]
    pub const fn unset() -> Self {
        Self(String::new())
    }

    /// True for the reserved "no value" bucket.
    #[must_use]
    pub fn is_unset(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw name as used on the wire.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Human-facing name. The unset bucket renders as "Unassigned" when the
    /// board is grouped by a user-valued field, otherwise "Unset".
    #[must_use]
    pub fn display_name(&self, group_field: &str) -> &str {
        if !self.is_unset() {
            return &self.0;
        }
        match group_field {
            "owner" | "reporter" | "qualityassurancecontact" => "Unassigned",
            _ => "Unset",
        }
    }
}

impl From<&str> for GroupName {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for GroupName {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Running aggregates for one group. Must equal the sum over members after
/// every operation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupStats {
    pub tickets: usize,
    pub hours: f64,
    pub effort: f64,
}

impl GroupStats {
    pub(crate) fn absorb(&mut self, ticket: &Ticket) {
        self.tickets += 1;
        self.hours += ticket.hours;
        self.effort += ticket.effort;
    }

    pub(crate) fn release(&mut self, ticket: &Ticket) {
        self.tickets = self.tickets.saturating_sub(1);
        self.hours -= ticket.hours;
        self.effort -= ticket.effort;
    }
}

/// One named bucket of tickets, in comparator order.
#[derive(Debug, Clone)]
pub struct Group {
    name: GroupName,
    order: Vec<TicketId>,
    stats: GroupStats,
    /// Optional WIP cap, shown as `n/limit`. Informational only; the server
    /// is the authority on whether a move past the limit is accepted.
    limit: Option<usize>,
    /// Whether the group is currently shown (group filtering).
    visible: bool,
}

impl Group {
    #[must_use]
    pub(crate) fn new(name: GroupName) -> Self {
        Self {
            name,
            order: Vec::new(),
            stats: GroupStats::default(),
            limit: None,
            visible: true,
        }
    }

    #[must_use]
    pub fn name(&self) -> &GroupName {
        &self.name
    }

    /// Member ids in display order.
    #[must_use]
    pub fn tickets(&self) -> &[TicketId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: TicketId) -> bool {
        self.order.contains(&id)
    }

    /// Index of `id` in display order.
    #[must_use]
    pub fn position_of(&self, id: TicketId) -> Option<usize> {
        self.order.iter().position(|member| *member == id)
    }

    #[must_use]
    pub const fn stats(&self) -> &GroupStats {
        &self.stats
    }

    #[must_use]
    pub const fn limit(&self) -> Option<usize> {
        self.limit
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Headline ticket count, rendered as `n` or `n/limit`.
    #[must_use]
    pub fn headline_count(&self) -> String {
        self.limit.map_or_else(
            || self.order.len().to_string(),
            |limit| format!("{}/{limit}", self.order.len()),
        )
    }

    pub(crate) fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn insert_at(&mut self, index: usize, ticket: &Ticket) {
        let index = index.min(self.order.len());
        self.order.insert(index, ticket.id);
        self.stats.absorb(ticket);
    }

    /// Remove a member, returning its previous index.
    pub(crate) fn remove(&mut self, ticket: &Ticket) -> Option<usize> {
        let index = self.position_of(ticket.id)?;
        self.order.remove(index);
        self.stats.release(ticket);
        Some(index)
    }

    /// Re-splice a member to a new index without touching aggregates.
    pub(crate) fn resplice(&mut self, id: TicketId, index: usize) -> bool {
        let Some(current) = self.position_of(id) else {
            return false;
        };
        self.order.remove(current);
        let index = index.min(self.order.len());
        self.order.insert(index, id);
        true
    }

    pub(crate) fn drain(&mut self) -> Vec<TicketId> {
        self.stats = GroupStats::default();
        std::mem::take(&mut self.order)
    }
}

/// Render fractional hours as `3h05m`-style text.
#[must_use]
pub fn format_hours(hours: f64) -> String {
    if hours < 1.0 {
        return "0h".to_owned();
    }
    let whole = hours.floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let minutes = ((hours - whole) * 60.0).floor() as u64;
    if minutes == 0 {
        format!("{whole:.0}h")
    } else {
        format!("{whole:.0}h{minutes:02}m")
    }
}
