//! Optimistic drag-and-drop moves.
//!
//! A move applies locally the instant the card is dropped; the server
//! confirms or rejects it afterwards. [`MoveController::stage`] validates a
//! selection and applies it, capturing enough state to roll each entry
//! back; [`MoveController::resolve`] settles the staged intent against the
//! server's verdict.
//!
//! # Invariants
//!
//! - A selection is validated in full before anything moves; a rejected
//!   stage leaves the board untouched.
//! - A rollback restores an entry to its captured origin only while the
//!   ticket still carries the stamp it was staged with. When a newer remote
//!   update landed in between, the merged server state stands and the
//!   failure is classified as a stale base.

use std::collections::BTreeMap;

use tacks_core::reconcile::{self, MergeOrigin};
use tacks_core::{
    Anchor, ChangeSet, ChangeStamp, GroupName, GroupedCollection, GroupingStrategy, TicketData,
    TicketId,
};

use crate::error::{FailureKind, MoveError, TransportError};
use crate::transport::{MoveRequest, MoveResponse, PositionHint, TicketRef};

/// One staged entry: what moved, under which stamp, and where it came from.
#[derive(Debug, Clone)]
pub struct StagedEntry {
    pub id: TicketId,
    /// Stamp at staging time; submitted with the request and used to guard
    /// the rollback.
    pub stamp: ChangeStamp,
    pub from: GroupName,
    pub index: usize,
}

/// An optimistically applied move awaiting the server's verdict.
#[derive(Debug, Clone)]
pub struct MoveIntent {
    pub target: GroupName,
    pub hint: PositionHint,
    pub entries: Vec<StagedEntry>,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Per-ticket move failures, kept until the user dismisses them.
#[derive(Debug, Default)]
pub struct MoveLedger {
    errors: BTreeMap<TicketId, MoveError>,
}

impl MoveLedger {
    pub fn record(&mut self, error: MoveError) {
        self.errors.insert(error.ticket, error);
    }

    #[must_use]
    pub fn error_for(&self, id: TicketId) -> Option<&MoveError> {
        self.errors.get(&id)
    }

    /// Drop the recorded failure for `id`, returning it.
    pub fn dismiss(&mut self, id: TicketId) -> Option<MoveError> {
        self.errors.remove(&id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// All recorded failures, in ticket-id order.
    pub fn errors(&self) -> impl Iterator<Item = &MoveError> {
        self.errors.values()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Stages selections, builds requests, and settles server verdicts.
#[derive(Debug, Default)]
pub struct MoveController {
    ledger: MoveLedger,
}

impl MoveController {
    #[must_use]
    pub const fn ledger(&self) -> &MoveLedger {
        &self.ledger
    }

    pub const fn ledger_mut(&mut self) -> &mut MoveLedger {
        &mut self.ledger
    }

    /// Validate a selection and apply it optimistically.
    ///
    /// All entries are validated before any is applied: the selection must
    /// be non-empty, every id must be on the board, the target must be an
    /// open group the ticket's workflow permits, and a relative hint must
    /// anchor on a member of the target group. No network is involved; a
    /// workflow-forbidden target fails here with
    /// [`FailureKind::NotAllowed`].
    ///
    /// # Errors
    ///
    /// The first failing entry's [`MoveError`], also recorded in the
    /// ledger. The board is untouched on error.
    pub fn stage(
        &mut self,
        collection: &mut GroupedCollection,
        ids: &[TicketId],
        target: &GroupName,
        hint: PositionHint,
    ) -> Result<MoveIntent, MoveError> {
        match Self::validate(collection, ids, target, hint) {
            Ok(entries) => {
                Self::apply(collection, ids, target, hint);
                Ok(MoveIntent {
                    target: target.clone(),
                    hint,
                    entries,
                })
            }
            Err(error) => {
                self.ledger.record(error.clone());
                Err(error)
            }
        }
    }

    fn validate(
        collection: &GroupedCollection,
        ids: &[TicketId],
        target: &GroupName,
        hint: PositionHint,
    ) -> Result<Vec<StagedEntry>, MoveError> {
        let reject = |id: TicketId, kind: FailureKind, message: String| MoveError {
            ticket: id,
            kind,
            messages: vec![message],
        };
        let Some(&first) = ids.first() else {
            return Err(reject(
                TicketId::default(),
                FailureKind::Validation,
                "selection is empty".to_owned(),
            ));
        };

        if !collection.has_group(target) {
            return Err(reject(
                first,
                FailureKind::Validation,
                format!("group {target} is not shown"),
            ));
        }
        if let PositionHint::Before(anchor) | PositionHint::After(anchor) = hint {
            if collection.group_of(anchor) != Some(target) {
                return Err(reject(
                    first,
                    FailureKind::Validation,
                    format!("drop anchor {anchor} is not in {target}"),
                ));
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            let Some(ticket) = collection.ticket(id) else {
                return Err(reject(
                    id,
                    FailureKind::Validation,
                    format!("{id} is not on the board"),
                ));
            };
            if !ticket.may_move_to(target) {
                return Err(reject(
                    id,
                    FailureKind::NotAllowed,
                    format!("workflow does not permit moving {id} to {target}"),
                ));
            }
            let (Some(from), Some(index)) = (
                collection.group_of(id).cloned(),
                collection
                    .group_of(id)
                    .and_then(|group| collection.group(group))
                    .and_then(|group| group.position_of(id)),
            ) else {
                return Err(reject(
                    id,
                    FailureKind::Validation,
                    format!("{id} is not on the board"),
                ));
            };
            entries.push(StagedEntry {
                id,
                stamp: ticket.stamp.clone(),
                from,
                index,
            });
        }
        Ok(entries)
    }

    /// Apply a validated selection. The anchor rolls forward so a dropped
    /// selection keeps its own order.
    fn apply(
        collection: &mut GroupedCollection,
        ids: &[TicketId],
        target: &GroupName,
        hint: PositionHint,
    ) {
        let mut anchor = match hint {
            PositionHint::Before(other) => Some(Anchor::Before(other)),
            PositionHint::After(other) => Some(Anchor::After(other)),
            PositionHint::At(_) => None,
            PositionHint::Append => Some(Anchor::Append),
        };
        for &id in ids {
            if let Err(err) = collection.move_ticket(id, target) {
                tracing::warn!(ticket = %id, %err, "staged move failed after validation");
                continue;
            }
            let placed = match (anchor, hint) {
                (Some(anchor), _) => collection.reorder_within_group(id, anchor),
                // The first entry of a jump-to-position drop lands at the
                // explicit ordinal; the rest follow it.
                (None, PositionHint::At(ordinal)) => collection.place_ticket_at(
                    id,
                    target,
                    usize::try_from(ordinal).unwrap_or(usize::MAX),
                ),
                (None, _) => collection.reorder_within_group(id, Anchor::Append),
            };
            if let Err(err) = placed {
                tracing::warn!(ticket = %id, %err, "staged placement failed after validation");
            }
            anchor = Some(Anchor::After(id));
        }
    }

    /// The wire request for a staged intent.
    #[must_use]
    pub fn build_request(intent: &MoveIntent, strategy: &GroupingStrategy) -> MoveRequest {
        MoveRequest {
            tickets: intent
                .entries
                .iter()
                .map(|entry| TicketRef {
                    id: entry.id,
                    stamp: entry.stamp.clone(),
                })
                .collect(),
            target: intent.target.clone(),
            hint: intent.hint,
            group_field: strategy.group_field().to_owned(),
        }
    }

    /// Settle a staged intent against the transport outcome.
    ///
    /// Confirmed tickets merge their echoed server data (fresh stamps and
    /// ordinals) as the client's own settled change. Rejected and failed
    /// entries roll back, stamp-guarded, and their failures are returned
    /// and recorded in the ledger.
    pub fn resolve(
        &mut self,
        collection: &mut GroupedCollection,
        intent: MoveIntent,
        verdict: Result<MoveResponse, TransportError>,
    ) -> Vec<MoveError> {
        let mut failures = Vec::new();
        match verdict {
            Err(err) => {
                tracing::warn!(%err, target = %intent.target, "move batch failed in transit");
                for entry in intent.entries.iter().rev() {
                    Self::roll_back(collection, entry);
                    failures.push(MoveError {
                        ticket: entry.id,
                        kind: FailureKind::Transport,
                        messages: vec![err.to_string()],
                    });
                }
            }
            Ok(response) => {
                let confirmed: Vec<(GroupName, TicketData)> = response
                    .tickets
                    .into_iter()
                    .map(|data| (intent.target.clone(), data))
                    .collect();
                let set = ChangeSet {
                    tickets: confirmed,
                    evict: Vec::new(),
                    groups: None,
                };
                let outcome =
                    reconcile::apply_change_set(collection, set, MergeOrigin::LocalConfirm);
                tracing::debug!(
                    target = %intent.target,
                    confirmed = outcome.updated.len() + outcome.moved.len(),
                    rejected = response.errors.len(),
                    "move batch settled"
                );

                for (id, messages) in response.errors {
                    let Some(entry) = intent.entries.iter().find(|entry| entry.id == id) else {
                        tracing::warn!(ticket = %id, "server rejected a ticket not in the batch");
                        continue;
                    };
                    let kind = if Self::roll_back(collection, entry) {
                        FailureKind::Validation
                    } else {
                        FailureKind::StaleBase
                    };
                    failures.push(MoveError {
                        ticket: id,
                        kind,
                        messages,
                    });
                }
            }
        }
        for failure in &failures {
            self.ledger.record(failure.clone());
        }
        failures
    }

    /// Restore an entry to its captured origin if the ticket still carries
    /// the staged stamp. Returns whether the rollback applied; when it did
    /// not, a newer remote update owns the ticket's placement.
    fn roll_back(collection: &mut GroupedCollection, entry: &StagedEntry) -> bool {
        let still_staged = collection
            .ticket(entry.id)
            .is_some_and(|ticket| ticket.stamp == entry.stamp);
        if still_staged {
            if let Err(err) = collection.place_ticket_at(entry.id, &entry.from, entry.index) {
                tracing::warn!(ticket = %entry.id, group = %entry.from, %err, "rollback failed");
            }
        }
        still_staged
    }
}
