//! Merging server-reported changes into the local board.
//!
//! The reconciliation engine consumes a flattened [`ChangeSet`] (from the
//! grouping strategy) and decides, per ticket, whether it is new, changed,
//! moved, unchanged, or gone:
//!
//! - unknown id → created at its comparator position;
//! - known id, differing stamp → updated in place, moving groups when the
//!   server says so (both groups' aggregates adjust);
//! - known id, equal stamp → untouched, so re-applying a diff is a no-op;
//! - id listed for eviction → removed if locally present;
//! - a diff naming a group we do not have → the local filtered/limited
//!   group-set assumption is broken, and the caller must fall back to a
//!   full refresh ([`MergeOutcome::needs_full_refresh`]).
//!
//! Reconciliation performs no I/O and cannot fail at runtime; a malformed
//! payload shape is a contract error caught upstream by the strategy.

use crate::collection::GroupedCollection;
use crate::group::GroupName;
use crate::strategy::ChangeSet;
use crate::ticket::TicketId;

/// Who caused the changes being merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOrigin {
    /// The current client's own just-confirmed move: already settled, no
    /// "changed remotely" indication is recorded.
    LocalConfirm,
    /// Another client's edit, reported by the change feed.
    Remote,
}

/// What happened to one ticket during a remote merge (drives the "changed
/// remotely" indication in the view layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Updated,
    Moved { from: GroupName, to: GroupName },
}

/// Summary of one merge.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub created: Vec<TicketId>,
    pub updated: Vec<TicketId>,
    pub moved: Vec<TicketId>,
    pub evicted: Vec<TicketId>,
    /// Per-ticket markers for remote-origin changes only.
    pub remote_changes: Vec<(TicketId, ChangeKind)>,
    /// Set when the payload referenced a group unknown locally; the caller
    /// must escalate to a full refresh instead of trusting a partial merge.
    pub needs_full_refresh: bool,
}

impl MergeOutcome {
    /// True when the merge changed nothing and requires no follow-up.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.moved.is_empty()
            && self.evicted.is_empty()
            && !self.needs_full_refresh
    }
}

/// Merge an incremental change set into the collection.
///
/// Merging stops at the first entry naming an unregistered group: the rest
/// of the payload cannot be trusted against a broken group-set assumption,
/// and the full refresh the caller escalates to settles everything.
/// Evictions still apply; they are idempotent under the refresh.
pub fn apply_change_set(
    collection: &mut GroupedCollection,
    set: ChangeSet,
    origin: MergeOrigin,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for (group, data) in set.tickets {
        if !collection.has_group(&group) {
            tracing::warn!(group = %group, ticket = %data.id,
                "change feed references a group not shown locally; full refresh required");
            outcome.needs_full_refresh = true;
            break;
        }

        let id = data.id;
        let known_stamp = collection.ticket(id).map(|held| held.stamp.clone());
        match known_stamp {
            None => {
                if let Err(err) = collection.add_ticket(&group, data.into_ticket()) {
                    tracing::warn!(ticket = %id, %err, "skipping unmergeable ticket");
                    continue;
                }
                outcome.created.push(id);
                if origin == MergeOrigin::Remote {
                    outcome.remote_changes.push((id, ChangeKind::Created));
                }
            }
            // Stamp already seen: re-applying the same diff is a no-op.
            Some(stamp) if stamp == data.stamp => {}
            Some(_) => {
                let from = collection
                    .group_of(id)
                    .filter(|current| **current != group)
                    .cloned();
                if let Some(from) = from {
                    if let Err(err) = collection.move_ticket(id, &group) {
                        tracing::warn!(ticket = %id, %err, "skipping unmergeable move");
                        continue;
                    }
                    if let Err(err) = collection.update_ticket(data.into_ticket()) {
                        tracing::warn!(ticket = %id, %err, "skipping unmergeable update");
                        continue;
                    }
                    outcome.moved.push(id);
                    if origin == MergeOrigin::Remote {
                        outcome
                            .remote_changes
                            .push((id, ChangeKind::Moved { from, to: group.clone() }));
                    }
                } else {
                    if let Err(err) = collection.update_ticket(data.into_ticket()) {
                        tracing::warn!(ticket = %id, %err, "skipping unmergeable update");
                        continue;
                    }
                    outcome.updated.push(id);
                    if origin == MergeOrigin::Remote {
                        outcome.remote_changes.push((id, ChangeKind::Updated));
                    }
                }
            }
        }
    }

    for id in set.evict {
        if collection.ticket(id).is_some() {
            if let Err(err) = collection.remove_ticket(id) {
                tracing::warn!(ticket = %id, %err, "eviction failed");
                continue;
            }
            tracing::debug!(ticket = %id, "evicted out-of-scope ticket");
            outcome.evicted.push(id);
        }
    }

    outcome
}

/// Rebuild the collection from an authoritative snapshot: align the group
/// set, drop tickets the snapshot no longer contains, then merge the rest.
///
/// A rebuild never records remote-change markers; the whole board redraws.
pub fn apply_snapshot(collection: &mut GroupedCollection, set: ChangeSet) -> MergeOutcome {
    // Align the group registry with the server's listing, when present.
    if let Some(authoritative) = &set.groups {
        for name in authoritative {
            collection.ensure_group(name);
        }
        let stale: Vec<GroupName> = collection
            .group_order()
            .iter()
            .filter(|open| !authoritative.contains(open))
            .cloned()
            .collect();
        for name in stale {
            if let Err(err) = collection.close_group(&name) {
                tracing::warn!(group = %name, %err, "failed to close stale group");
            }
        }
    } else {
        // No listing: the groups named by the payload are authoritative.
        for (group, _) in &set.tickets {
            collection.ensure_group(group);
        }
    }

    // A snapshot is scoped to include everything: prune local tickets that
    // the payload does not mention.
    let present: std::collections::BTreeSet<TicketId> =
        set.tickets.iter().map(|(_, data)| data.id).collect();
    let absent: Vec<TicketId> = collection
        .ticket_ids()
        .filter(|id| !present.contains(id))
        .collect();

    let mut outcome = apply_change_set(collection, set, MergeOrigin::LocalConfirm);
    for id in absent {
        if collection.ticket(id).is_some() {
            if let Err(err) = collection.remove_ticket(id) {
                tracing::warn!(ticket = %id, %err, "snapshot prune failed");
                continue;
            }
            outcome.evicted.push(id);
        }
    }
    debug_assert!(collection.is_coherent());
    outcome
}
