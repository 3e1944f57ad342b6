//! The owned board state: groups, the ticket arena, and the reverse index.
//!
//! [`GroupedCollection`] is the single owned context for one board. All
//! mutation flows through its operations; nothing reaches into a group or
//! ticket from outside. Three structures are kept in agreement at every
//! step:
//!
//! - the per-group ordered membership (comparator order),
//! - the id → [`Ticket`] arena (exactly one instance per id, board-wide),
//! - the id → group reverse index (O(1) lookup during reconciliation).
//!
//! # Invariants
//!
//! - An id is a member of exactly one group, and the reverse index names it.
//! - Group aggregates equal the sum over current members after every
//!   operation; membership and aggregates change in the same step.
//! - `move_ticket` never exposes a state where the id belongs to no group.

use std::collections::BTreeMap;

use crate::error::CollectionError;
use crate::group::{Group, GroupName};
use crate::order::{self, PriorityDirection};
use crate::ticket::{Ticket, TicketId};

/// Where a ticket sat before a move; enough to roll the move back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedFrom {
    pub group: GroupName,
    pub index: usize,
}

/// Placement target for a reorder that does not change groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Splice immediately before this member.
    Before(TicketId),
    /// Splice immediately after this member.
    After(TicketId),
    /// Splice to the end of the group.
    Append,
}

/// All groups and tickets of one board.
#[derive(Debug, Clone, Default)]
pub struct GroupedCollection {
    direction: PriorityDirection,
    group_cap: Option<usize>,
    group_order: Vec<GroupName>,
    groups: BTreeMap<GroupName, Group>,
    tickets: BTreeMap<TicketId, Ticket>,
    index: BTreeMap<TicketId, GroupName>,
}

impl GroupedCollection {
    #[must_use]
    pub fn new(direction: PriorityDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }

    /// Cap the number of simultaneously shown groups (the backlog board
    /// shows at most four milestones at once).
    #[must_use]
    pub const fn with_group_cap(mut self, cap: usize) -> Self {
        self.group_cap = Some(cap);
        self
    }

    #[must_use]
    pub const fn direction(&self) -> PriorityDirection {
        self.direction
    }

    #[must_use]
    pub const fn group_cap(&self) -> Option<usize> {
        self.group_cap
    }

    // -----------------------------------------------------------------------
    // Group lifecycle
    // -----------------------------------------------------------------------

    /// Register a group. Returns `Ok(false)` if it was already open.
    ///
    /// # Errors
    ///
    /// [`CollectionError::CapacityExceeded`] when a cap is configured and
    /// already reached. Purely local; no network round-trip is involved.
    pub fn open_group(&mut self, name: GroupName) -> Result<bool, CollectionError> {
        if self.groups.contains_key(&name) {
            return Ok(false);
        }
        if let Some(limit) = self.group_cap {
            if self.groups.len() >= limit {
                return Err(CollectionError::CapacityExceeded { limit });
            }
        }
        self.insert_group(name);
        Ok(true)
    }

    /// Close a group, evicting and returning its members.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownGroup`] when the group is not registered.
    pub fn close_group(&mut self, name: &GroupName) -> Result<Vec<Ticket>, CollectionError> {
        let Some(mut group) = self.groups.remove(name) else {
            return Err(CollectionError::UnknownGroup(name.clone()));
        };
        self.group_order.retain(|open| open != name);

        let mut evicted = Vec::with_capacity(group.len());
        for id in group.drain() {
            self.index.remove(&id);
            if let Some(ticket) = self.tickets.remove(&id) {
                evicted.push(ticket);
            }
        }
        tracing::debug!(group = %name, evicted = evicted.len(), "closed group");
        Ok(evicted)
    }

    /// Register a group regardless of the cap. Reserved for authoritative
    /// snapshots, where the server dictates the group set.
    pub(crate) fn ensure_group(&mut self, name: &GroupName) {
        if !self.groups.contains_key(name) {
            self.insert_group(name.clone());
        }
    }

    fn insert_group(&mut self, name: GroupName) {
        self.group_order.push(name.clone());
        self.groups.insert(name.clone(), Group::new(name));
    }

    /// Set or clear a group's informational WIP limit.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownGroup`] when the group is not registered.
    pub fn set_group_limit(
        &mut self,
        name: &GroupName,
        limit: Option<usize>,
    ) -> Result<(), CollectionError> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| CollectionError::UnknownGroup(name.clone()))?
            .set_limit(limit);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    #[must_use]
    pub fn group(&self, name: &GroupName) -> Option<&Group> {
        self.groups.get(name)
    }

    #[must_use]
    pub fn has_group(&self, name: &GroupName) -> bool {
        self.groups.contains_key(name)
    }

    /// Groups in board order.
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.group_order.iter().filter_map(|name| self.groups.get(name))
    }

    /// Group names in board order.
    #[must_use]
    pub fn group_order(&self) -> &[GroupName] {
        &self.group_order
    }

    /// The group immediately after `name` in board order, if any.
    #[must_use]
    pub fn neighbor_of(&self, name: &GroupName) -> Option<&GroupName> {
        let at = self.group_order.iter().position(|open| open == name)?;
        self.group_order.get(at + 1)
    }

    #[must_use]
    pub fn ticket(&self, id: TicketId) -> Option<&Ticket> {
        self.tickets.get(&id)
    }

    /// Owning group of `id`, via the reverse index.
    #[must_use]
    pub fn group_of(&self, id: TicketId) -> Option<&GroupName> {
        self.index.get(&id)
    }

    #[must_use]
    pub fn ticket_count(&self) -> usize {
        self.tickets.len()
    }

    /// All ticket ids on the board, in id order.
    pub fn ticket_ids(&self) -> impl Iterator<Item = TicketId> + '_ {
        self.tickets.keys().copied()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    // -----------------------------------------------------------------------
    // Membership operations
    // -----------------------------------------------------------------------

    /// Insert a new ticket at its comparator-determined position.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownGroup`] for an unregistered group,
    /// [`CollectionError::DuplicateTicket`] when the id is already present
    /// anywhere on the board.
    pub fn add_ticket(&mut self, group: &GroupName, ticket: Ticket) -> Result<(), CollectionError> {
        if self.tickets.contains_key(&ticket.id) {
            return Err(CollectionError::DuplicateTicket(ticket.id));
        }
        if !self.groups.contains_key(group) {
            return Err(CollectionError::UnknownGroup(group.clone()));
        }
        let slot = self.slot_for(group, &ticket);
        if let Some(open) = self.groups.get_mut(group) {
            open.insert_at(slot, &ticket);
        }
        self.index.insert(ticket.id, group.clone());
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    /// Remove a ticket from the board entirely.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownTicket`] when the id is absent.
    pub fn remove_ticket(&mut self, id: TicketId) -> Result<Ticket, CollectionError> {
        let group_name = self
            .index
            .remove(&id)
            .ok_or(CollectionError::UnknownTicket(id))?;
        let ticket = self
            .tickets
            .remove(&id)
            .ok_or(CollectionError::UnknownTicket(id))?;
        if let Some(group) = self.groups.get_mut(&group_name) {
            group.remove(&ticket);
        }
        Ok(ticket)
    }

    /// Move a ticket to another group, re-inserting at the comparator
    /// position. Atomic from the caller's perspective: the target group is
    /// validated before anything is touched, so no observer ever sees the id
    /// belonging to neither group.
    ///
    /// Returns where the ticket came from, for rollback.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownTicket`] / [`CollectionError::UnknownGroup`].
    pub fn move_ticket(
        &mut self,
        id: TicketId,
        target: &GroupName,
    ) -> Result<MovedFrom, CollectionError> {
        if !self.groups.contains_key(target) {
            return Err(CollectionError::UnknownGroup(target.clone()));
        }
        let source_name = self
            .index
            .get(&id)
            .cloned()
            .ok_or(CollectionError::UnknownTicket(id))?;

        let source_index = self
            .groups
            .get(&source_name)
            .and_then(|group| group.position_of(id))
            .ok_or(CollectionError::UnknownTicket(id))?;

        if source_name == *target {
            return Ok(MovedFrom {
                group: source_name,
                index: source_index,
            });
        }

        let slot = {
            let Some(ticket) = self.tickets.get(&id) else {
                return Err(CollectionError::UnknownTicket(id));
            };
            self.slot_for(target, ticket)
        };

        if let (Some(ticket), Some(source)) = (self.tickets.get(&id), self.groups.get_mut(&source_name))
        {
            source.remove(ticket);
        }
        if let (Some(ticket), Some(dest)) = (self.tickets.get(&id), self.groups.get_mut(target)) {
            dest.insert_at(slot, ticket);
        }
        self.index.insert(id, target.clone());

        Ok(MovedFrom {
            group: source_name,
            index: source_index,
        })
    }

    /// Move a ticket to an explicit index within `target`, bypassing the
    /// comparator. Used to restore a rolled-back move to its exact prior
    /// place, and to realize a user's drop position before the server
    /// assigns authoritative ordinals.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownTicket`] / [`CollectionError::UnknownGroup`].
    pub fn place_ticket_at(
        &mut self,
        id: TicketId,
        target: &GroupName,
        index: usize,
    ) -> Result<(), CollectionError> {
        if !self.groups.contains_key(target) {
            return Err(CollectionError::UnknownGroup(target.clone()));
        }
        let source_name = self
            .index
            .get(&id)
            .cloned()
            .ok_or(CollectionError::UnknownTicket(id))?;

        if source_name == *target {
            if let Some(group) = self.groups.get_mut(target) {
                group.resplice(id, index);
            }
            return Ok(());
        }

        if let (Some(ticket), Some(source)) = (self.tickets.get(&id), self.groups.get_mut(&source_name))
        {
            source.remove(ticket);
        }
        if let (Some(ticket), Some(dest)) = (self.tickets.get(&id), self.groups.get_mut(target)) {
            dest.insert_at(index, ticket);
        }
        self.index.insert(id, target.clone());
        Ok(())
    }

    /// Re-splice a ticket within its group relative to an anchor member.
    /// Aggregates are untouched.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownTicket`] for an absent id,
    /// [`CollectionError::AnchorOutsideGroup`] when the anchor is not a
    /// member of the same group.
    pub fn reorder_within_group(
        &mut self,
        id: TicketId,
        anchor: Anchor,
    ) -> Result<(), CollectionError> {
        let group_name = self
            .index
            .get(&id)
            .cloned()
            .ok_or(CollectionError::UnknownTicket(id))?;
        let Some(group) = self.groups.get_mut(&group_name) else {
            return Err(CollectionError::UnknownTicket(id));
        };
        let current = group
            .position_of(id)
            .ok_or(CollectionError::UnknownTicket(id))?;

        let raw = match anchor {
            Anchor::Append => group.len(),
            Anchor::Before(other) | Anchor::After(other) if other == id => return Ok(()),
            Anchor::Before(other) => group
                .position_of(other)
                .ok_or(CollectionError::AnchorOutsideGroup(other))?,
            Anchor::After(other) => {
                group
                    .position_of(other)
                    .ok_or(CollectionError::AnchorOutsideGroup(other))?
                    + 1
            }
        };
        // The splice index is relative to the order without the moved id.
        let adjusted = if current < raw { raw - 1 } else { raw };
        group.resplice(id, adjusted);
        Ok(())
    }

    /// Replace a ticket's data in place, keeping aggregates and ordering
    /// coherent (hours/effort deltas, possible re-sort on position or
    /// priority change). The group membership is unchanged.
    ///
    /// Returns the previous data.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownTicket`] when the id is absent.
    pub fn update_ticket(&mut self, new: Ticket) -> Result<Ticket, CollectionError> {
        let id = new.id;
        let group_name = self
            .index
            .get(&id)
            .cloned()
            .ok_or(CollectionError::UnknownTicket(id))?;
        let old = self
            .tickets
            .get(&id)
            .cloned()
            .ok_or(CollectionError::UnknownTicket(id))?;

        if let Some(group) = self.groups.get_mut(&group_name) {
            group.remove(&old);
        }
        self.tickets.insert(id, new);

        let slot = {
            let Some(candidate) = self.tickets.get(&id) else {
                return Err(CollectionError::UnknownTicket(id));
            };
            self.slot_for(&group_name, candidate)
        };
        if let (Some(ticket), Some(group)) = (self.tickets.get(&id), self.groups.get_mut(&group_name))
        {
            group.insert_at(slot, ticket);
        }
        Ok(old)
    }

    // -----------------------------------------------------------------------
    // Group filtering
    // -----------------------------------------------------------------------

    /// Show only the `keep` most populated groups (ties keep board order),
    /// hiding the rest. Membership is untouched; this is a display flag.
    pub fn auto_filter_groups(&mut self, keep: usize) {
        let mut by_count: Vec<(GroupName, usize)> = self
            .group_order
            .iter()
            .filter_map(|name| self.groups.get(name).map(|g| (name.clone(), g.len())))
            .collect();
        by_count.sort_by(|a, b| b.1.cmp(&a.1));

        for (rank, (name, _)) in by_count.into_iter().enumerate() {
            if let Some(group) = self.groups.get_mut(&name) {
                group.set_visible(rank < keep);
            }
        }
    }

    /// Show exactly the named groups; hide all others.
    pub fn set_visible_groups(&mut self, shown: &[GroupName]) {
        for (name, group) in &mut self.groups {
            group.set_visible(shown.contains(name));
        }
    }

    // -----------------------------------------------------------------------
    // Diagnostics
    // -----------------------------------------------------------------------

    /// Check all structural invariants: reverse index agrees with group
    /// membership, every id is in exactly one group, and aggregates equal
    /// the sum over members. Debugging and test aid.
    #[must_use]
    pub fn is_coherent(&self) -> bool {
        let mut seen = 0usize;
        for group in self.groups.values() {
            let mut hours = 0.0f64;
            let mut effort = 0.0f64;
            for id in group.tickets() {
                seen += 1;
                if self.index.get(id) != Some(group.name()) {
                    return false;
                }
                let Some(ticket) = self.tickets.get(id) else {
                    return false;
                };
                hours += ticket.hours;
                effort += ticket.effort;
            }
            let stats = group.stats();
            if stats.tickets != group.len()
                || (stats.hours - hours).abs() > 1e-6
                || (stats.effort - effort).abs() > 1e-6
            {
                return false;
            }
        }
        seen == self.tickets.len() && seen == self.index.len()
    }

    fn slot_for(&self, group: &GroupName, candidate: &Ticket) -> usize {
        let Some(open) = self.groups.get(group) else {
            return 0;
        };
        let members = open.tickets().iter().filter_map(|id| self.tickets.get(id));
        order::insertion_index(members, candidate, self.direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::ChangeStamp;

    fn ticket(id: u64, priority: i64) -> Ticket {
        let mut t = Ticket::new(TicketId(id), ChangeStamp::from("T1"));
        t.priority_rank = priority;
        t.hours = 1.0;
        t
    }

    fn board() -> GroupedCollection {
        let mut collection = GroupedCollection::new(PriorityDirection::LowerFirst);
        collection
            .open_group(GroupName::from("a"))
            .expect("open group a");
        collection
            .open_group(GroupName::from("b"))
            .expect("open group b");
        collection
    }

    #[test]
    fn add_orders_by_comparator_not_arrival() {
        let mut collection = board();
        let a = GroupName::from("a");
        collection.add_ticket(&a, ticket(7, 3)).expect("add #7");
        collection.add_ticket(&a, ticket(9, 1)).expect("add #9");

        let group = collection.group(&a).expect("group a");
        assert_eq!(group.tickets(), &[TicketId(9), TicketId(7)]);
        assert!(collection.is_coherent());
    }

    #[test]
    fn duplicate_ids_are_rejected_board_wide() {
        let mut collection = board();
        let a = GroupName::from("a");
        let b = GroupName::from("b");
        collection.add_ticket(&a, ticket(1, 1)).expect("add #1");
        assert_eq!(
            collection.add_ticket(&b, ticket(1, 1)),
            Err(CollectionError::DuplicateTicket(TicketId(1)))
        );
    }

    #[test]
    fn move_reports_prior_location() {
        let mut collection = board();
        let a = GroupName::from("a");
        let b = GroupName::from("b");
        collection.add_ticket(&a, ticket(1, 2)).expect("add #1");
        collection.add_ticket(&a, ticket(2, 1)).expect("add #2");

        let from = collection.move_ticket(TicketId(1), &b).expect("move #1");
        assert_eq!(from, MovedFrom { group: a.clone(), index: 1 });
        assert_eq!(collection.group_of(TicketId(1)), Some(&b));
        assert!(collection.is_coherent());
    }

    #[test]
    fn move_to_unknown_group_leaves_state_untouched() {
        let mut collection = board();
        let a = GroupName::from("a");
        collection.add_ticket(&a, ticket(1, 1)).expect("add #1");
        let err = collection
            .move_ticket(TicketId(1), &GroupName::from("nope"))
            .expect_err("unknown group");
        assert!(matches!(err, CollectionError::UnknownGroup(_)));
        assert_eq!(collection.group_of(TicketId(1)), Some(&a));
        assert!(collection.is_coherent());
    }

    #[test]
    fn reorder_respects_anchor_and_skips_aggregates() {
        let mut collection = board();
        let a = GroupName::from("a");
        collection.add_ticket(&a, ticket(1, 1)).expect("add");
        collection.add_ticket(&a, ticket(2, 2)).expect("add");
        collection.add_ticket(&a, ticket(3, 3)).expect("add");
        let before = *collection.group(&a).expect("group").stats();

        collection
            .reorder_within_group(TicketId(1), Anchor::After(TicketId(3)))
            .expect("reorder");
        let group = collection.group(&a).expect("group");
        assert_eq!(group.tickets(), &[TicketId(2), TicketId(3), TicketId(1)]);
        assert_eq!(group.stats(), &before);
    }

    #[test]
    fn reorder_anchor_in_other_group_is_an_error() {
        let mut collection = board();
        collection
            .add_ticket(&GroupName::from("a"), ticket(1, 1))
            .expect("add");
        collection
            .add_ticket(&GroupName::from("b"), ticket(2, 1))
            .expect("add");
        assert_eq!(
            collection.reorder_within_group(TicketId(1), Anchor::Before(TicketId(2))),
            Err(CollectionError::AnchorOutsideGroup(TicketId(2)))
        );
    }

    #[test]
    fn group_cap_is_enforced_locally() {
        let mut collection =
            GroupedCollection::new(PriorityDirection::LowerFirst).with_group_cap(2);
        collection.open_group(GroupName::from("a")).expect("open");
        collection.open_group(GroupName::from("b")).expect("open");
        assert_eq!(
            collection.open_group(GroupName::from("c")),
            Err(CollectionError::CapacityExceeded { limit: 2 })
        );
        // Closing one frees a slot.
        collection.close_group(&GroupName::from("a")).expect("close");
        assert_eq!(collection.open_group(GroupName::from("c")), Ok(true));
    }

    #[test]
    fn close_group_evicts_members_everywhere() {
        let mut collection = board();
        let a = GroupName::from("a");
        collection.add_ticket(&a, ticket(1, 1)).expect("add");
        let evicted = collection.close_group(&a).expect("close");
        assert_eq!(evicted.len(), 1);
        assert!(collection.ticket(TicketId(1)).is_none());
        assert!(collection.group_of(TicketId(1)).is_none());
        assert!(collection.is_coherent());
    }

    #[test]
    fn auto_filter_keeps_most_populated() {
        let mut collection = board();
        collection.open_group(GroupName::from("c")).expect("open");
        let b = GroupName::from("b");
        let c = GroupName::from("c");
        collection.add_ticket(&b, ticket(1, 1)).expect("add");
        collection.add_ticket(&c, ticket(2, 1)).expect("add");
        collection.add_ticket(&c, ticket(3, 1)).expect("add");

        collection.auto_filter_groups(2);
        assert!(collection.group(&c).expect("c").is_visible());
        assert!(collection.group(&b).expect("b").is_visible());
        assert!(!collection.group(&GroupName::from("a")).expect("a").is_visible());
    }
}
