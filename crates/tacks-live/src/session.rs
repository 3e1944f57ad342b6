//! One live board: collection, strategy, schedule, moves, and a transport.
//!
//! [`BoardSession`] owns the whole client-side state of a board and drives
//! it against a [`BoardTransport`]: scheduled ticks fetch diffs or
//! snapshots and merge them, moves apply optimistically and settle against
//! the server's verdict, and group filtering stays a purely local concern.
//!
//! Changing the shown group set invalidates fetches scoped to the old set;
//! the session tracks that with an epoch counter, and results captured
//! under a previous epoch are discarded instead of merged.

use chrono::{DateTime, Utc};
use tacks_core::reconcile::{self, MergeOrigin, MergeOutcome};
use tacks_core::{
    BoardConfig, BoardPayload, CollectionError, GroupName, GroupedCollection, GroupingStrategy,
    TicketId,
};
use tokio::sync::watch;

use crate::error::{FailureKind, MoveError};
use crate::moves::MoveController;
use crate::schedule::{FetchPlan, PollSchedule};
use crate::transport::{BoardTransport, PositionHint};

/// Out-of-band conditions for the view layer to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Opening another group was refused by the local cap; nothing was
    /// fetched or persisted.
    GroupCapReached { limit: usize },
    /// A fetch failed; shown data may be stale until the next tick.
    RefreshFailed,
}

/// The live client-side state of one board.
pub struct BoardSession<T> {
    collection: GroupedCollection,
    strategy: GroupingStrategy,
    schedule: PollSchedule,
    moves: MoveController,
    transport: T,
    epoch: u64,
    notices: Vec<Notice>,
}

impl<T: BoardTransport> BoardSession<T> {
    #[must_use]
    pub fn new(
        transport: T,
        strategy: GroupingStrategy,
        config: &BoardConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let mut collection = GroupedCollection::new(config.priority_direction);
        if let Some(cap) = config.group_cap {
            collection = collection.with_group_cap(cap);
        }
        Self {
            collection,
            strategy,
            schedule: PollSchedule::new(config, now),
            moves: MoveController::default(),
            transport,
            epoch: 0,
            notices: Vec::new(),
        }
    }

    #[must_use]
    pub const fn collection(&self) -> &GroupedCollection {
        &self.collection
    }

    #[must_use]
    pub const fn strategy(&self) -> &GroupingStrategy {
        &self.strategy
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Drain accumulated notices for display.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // -----------------------------------------------------------------------
    // Fetch cycle
    // -----------------------------------------------------------------------

    /// Run one scheduler tick: fetch if one is due, merge the result, and
    /// settle the schedule. Returns the merge outcome when a fetch ran and
    /// its result was applied.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<MergeOutcome> {
        let plan = self.schedule.plan_tick(now)?;
        let epoch = self.epoch;
        let fetched = match plan {
            FetchPlan::Full => self.transport.fetch_snapshot().await,
            FetchPlan::Diff { from, to } => self.transport.fetch_diff(from, to).await,
        };
        match fetched {
            Ok(payload) => {
                let applied = self.apply_fetched(epoch, plan, payload);
                let applied = match applied {
                    Some(outcome) if outcome.needs_full_refresh => {
                        // The diff referenced groups outside the local
                        // scope; only a snapshot settles the board.
                        tracing::debug!("change feed outran local scope; fetching snapshot");
                        let settled = self.fetch_full_fallback(epoch).await;
                        if settled.is_none() {
                            // The board stays partially merged until a
                            // snapshot lands; retry it on the next tick
                            // rather than resuming diffs.
                            self.schedule.demand_full();
                        }
                        settled.or(Some(outcome))
                    }
                    other => other,
                };
                self.schedule.complete(now);
                applied
            }
            Err(err) => {
                tracing::warn!(%err, "scheduled fetch failed");
                self.notices.push(Notice::RefreshFailed);
                self.schedule.fail(now);
                None
            }
        }
    }

    /// Fetch a full snapshot immediately, outside the tick cadence. The
    /// next scheduled tick is pushed out by a full interval.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> Option<MergeOutcome> {
        let epoch = self.epoch;
        match self.transport.fetch_snapshot().await {
            Ok(payload) => {
                let applied = self.apply_fetched(epoch, FetchPlan::Full, payload);
                self.schedule.note_manual_refresh(now);
                applied
            }
            Err(err) => {
                tracing::warn!(%err, "manual refresh failed");
                self.notices.push(Notice::RefreshFailed);
                None
            }
        }
    }

    /// Drive the tick cadence until `stop` flips to `true` or its sender
    /// goes away.
    pub async fn run_until(&mut self, mut stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }
            let wait = self.schedule.due_in(Utc::now()).to_std().unwrap_or_default();
            tokio::select! {
                () = tokio::time::sleep(wait) => {
                    self.tick(Utc::now()).await;
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    }

    /// Merge a fetched payload, unless the shown group set changed while
    /// the fetch was in flight; a result from a previous epoch is discarded
    /// and the next tick re-fetches under the current scope.
    pub(crate) fn apply_fetched(
        &mut self,
        epoch: u64,
        plan: FetchPlan,
        payload: BoardPayload,
    ) -> Option<MergeOutcome> {
        if epoch != self.epoch {
            tracing::debug!(
                stale = epoch,
                current = self.epoch,
                "discarding fetch result from a previous scope"
            );
            return None;
        }
        let set = self.strategy.flatten(payload);
        let outcome = match plan {
            FetchPlan::Full => reconcile::apply_snapshot(&mut self.collection, set),
            FetchPlan::Diff { .. } => {
                reconcile::apply_change_set(&mut self.collection, set, MergeOrigin::Remote)
            }
        };
        Some(outcome)
    }

    async fn fetch_full_fallback(&mut self, epoch: u64) -> Option<MergeOutcome> {
        match self.transport.fetch_snapshot().await {
            Ok(payload) => self.apply_fetched(epoch, FetchPlan::Full, payload),
            Err(err) => {
                tracing::warn!(%err, "snapshot fallback failed");
                self.notices.push(Notice::RefreshFailed);
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // Group filtering
    // -----------------------------------------------------------------------

    /// Show a group. A cap refusal is recorded as a notice; no network is
    /// involved either way. Returns whether the group was newly opened.
    pub fn open_group(&mut self, name: GroupName) -> bool {
        match self.collection.open_group(name) {
            Ok(opened) => {
                if opened {
                    self.epoch += 1;
                }
                opened
            }
            Err(CollectionError::CapacityExceeded { limit }) => {
                self.notices.push(Notice::GroupCapReached { limit });
                false
            }
            Err(err) => {
                tracing::warn!(%err, "open_group refused");
                false
            }
        }
    }

    /// Hide a group, evicting its tickets locally. Fetches already in
    /// flight were scoped to the old group set; bumping the epoch keeps
    /// their results from resurrecting the group.
    ///
    /// # Errors
    ///
    /// [`CollectionError::UnknownGroup`] when the group is not shown.
    pub fn close_group(&mut self, name: &GroupName) -> Result<(), CollectionError> {
        self.collection.close_group(name)?;
        self.epoch += 1;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Stage and persist a move of `ids` into `target`. The board updates
    /// optimistically; rejected entries roll back and their failures are
    /// returned and kept until dismissed.
    pub async fn move_tickets(
        &mut self,
        ids: &[TicketId],
        target: &GroupName,
        hint: PositionHint,
    ) -> Vec<MoveError> {
        let intent = match self.moves.stage(&mut self.collection, ids, target, hint) {
            Ok(intent) => intent,
            Err(error) => return vec![error],
        };
        let request = MoveController::build_request(&intent, &self.strategy);
        let verdict = self.transport.persist_move(&request).await;
        self.moves.resolve(&mut self.collection, intent, verdict)
    }

    /// Move a selection to the group after its current one in board order.
    pub async fn promote_selection(&mut self, ids: &[TicketId]) -> Vec<MoveError> {
        let Some(&first) = ids.first() else {
            return Vec::new();
        };
        let reject = |message: String| {
            vec![MoveError {
                ticket: first,
                kind: FailureKind::Validation,
                messages: vec![message],
            }]
        };
        let Some(current) = self.collection.group_of(first) else {
            return reject(format!("{first} is not on the board"));
        };
        let Some(next) = self.collection.neighbor_of(current).cloned() else {
            return reject(format!("no group after {current}"));
        };
        self.move_tickets(ids, &next, PositionHint::Append).await
    }

    #[must_use]
    pub fn error_for(&self, id: TicketId) -> Option<&MoveError> {
        self.moves.ledger().error_for(id)
    }

    /// Drop the recorded failure for `id`, returning it.
    pub fn dismiss_error(&mut self, id: TicketId) -> Option<MoveError> {
        self.moves.ledger_mut().dismiss(id)
    }
}
