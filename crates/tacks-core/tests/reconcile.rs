//! Merging change feeds and snapshots into a live collection.
//!
//! Covers the per-ticket merge decisions (create, update, move, skip,
//! evict), the idempotence guarantee for re-delivered diffs, the
//! unknown-group escalation to a full refresh, and snapshot rebuilds that
//! align the group registry and prune absent tickets.

use std::collections::BTreeMap;

use tacks_core::reconcile::{apply_change_set, apply_snapshot, ChangeKind};
use tacks_core::{
    BoardPayload, ChangeSet, ChangeStamp, GroupName, GroupedCollection, GroupingStrategy,
    MergeOrigin, PriorityDirection, Ticket, TicketData, TicketId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn data(id: u64, stamp: &str, priority: i64, hours: f64) -> TicketData {
    TicketData {
        id: TicketId(id),
        stamp: ChangeStamp::from(stamp),
        position: None,
        priority,
        summary: format!("ticket {id}"),
        hours,
        effort: 1.0,
        actions: None,
        fields: BTreeMap::new(),
    }
}

fn seeded_board() -> GroupedCollection {
    let mut collection = GroupedCollection::new(PriorityDirection::LowerFirst);
    collection.open_group(GroupName::from("new")).expect("open");
    collection
        .open_group(GroupName::from("accepted"))
        .expect("open");

    let mut seed = Ticket::new(TicketId(1), ChangeStamp::from("T1"));
    seed.priority_rank = 2;
    seed.hours = 4.0;
    seed.effort = 1.0;
    collection
        .add_ticket(&GroupName::from("new"), seed)
        .expect("seed ticket");
    collection
}

fn entries(items: Vec<(&str, TicketData)>) -> Vec<(GroupName, TicketData)> {
    items
        .into_iter()
        .map(|(group, data)| (GroupName::from(group), data))
        .collect()
}

// ---------------------------------------------------------------------------
// Incremental diffs
// ---------------------------------------------------------------------------

#[test]
fn diff_creates_updates_and_moves() {
    let mut collection = seeded_board();

    let set = ChangeSet {
        tickets: entries(vec![
            // Known id, new stamp, new group: a cross-group move.
            ("accepted", data(1, "T2", 2, 4.0)),
            // Unknown id: created at its comparator slot.
            ("new", data(2, "T2", 1, 2.0)),
        ]),
        evict: Vec::new(),
        groups: None,
    };
    let outcome = apply_change_set(&mut collection, set, MergeOrigin::Remote);

    assert_eq!(outcome.created, vec![TicketId(2)]);
    assert_eq!(outcome.moved, vec![TicketId(1)]);
    assert!(!outcome.needs_full_refresh);
    assert!(outcome.remote_changes.contains(&(
        TicketId(1),
        ChangeKind::Moved {
            from: GroupName::from("new"),
            to: GroupName::from("accepted"),
        }
    )));

    let new = collection.group(&GroupName::from("new")).expect("new");
    let accepted = collection
        .group(&GroupName::from("accepted"))
        .expect("accepted");
    assert_eq!(new.tickets(), &[TicketId(2)]);
    assert_eq!(accepted.tickets(), &[TicketId(1)]);
    assert!((new.stats().hours - 2.0).abs() < 1e-9);
    assert!((accepted.stats().hours - 4.0).abs() < 1e-9);
    assert!(collection.is_coherent());
}

#[test]
fn redelivered_diff_is_a_noop() {
    let mut collection = seeded_board();
    let set = ChangeSet {
        tickets: entries(vec![("accepted", data(1, "T2", 2, 4.0))]),
        evict: Vec::new(),
        groups: None,
    };

    let first = apply_change_set(&mut collection, set.clone(), MergeOrigin::Remote);
    assert_eq!(first.moved, vec![TicketId(1)]);

    // The feed window overlaps the previous one; the same change arrives
    // again with the same stamp.
    let second = apply_change_set(&mut collection, set, MergeOrigin::Remote);
    assert!(second.is_noop());
    assert!(second.remote_changes.is_empty());
}

#[test]
fn unknown_group_escalates_to_full_refresh() {
    let mut collection = seeded_board();
    let set = ChangeSet {
        tickets: entries(vec![
            ("launchpad", data(3, "T2", 1, 0.0)),
            ("new", data(4, "T2", 1, 0.0)),
        ]),
        evict: Vec::new(),
        groups: None,
    };
    let outcome = apply_change_set(&mut collection, set, MergeOrigin::Remote);

    assert!(outcome.needs_full_refresh);
    // Merging stops at the mismatch; the refresh that follows settles
    // everything, including entries for groups we do hold.
    assert!(outcome.created.is_empty());
    assert!(collection.ticket(TicketId(3)).is_none());
    assert!(collection.ticket(TicketId(4)).is_none());
    assert!(!collection.has_group(&GroupName::from("launchpad")));
}

#[test]
fn quiet_diff_window_merges_as_a_noop() {
    let mut collection = seeded_board();

    // A window in which nothing changed comes back as an empty map; under
    // status grouping it must not be mistaken for a nesting mismatch.
    let payload: BoardPayload =
        serde_json::from_str(r#"{ "tickets": {} }"#).expect("parse quiet diff");
    let strategy = GroupingStrategy::by_status("classic");
    let outcome = apply_change_set(&mut collection, strategy.flatten(payload), MergeOrigin::Remote);

    assert!(outcome.is_noop());
    assert_eq!(collection.ticket_count(), 1);
}

#[test]
fn out_of_scope_changes_are_evicted() {
    let mut collection = seeded_board();
    let set = ChangeSet {
        tickets: Vec::new(),
        evict: vec![TicketId(1), TicketId(77)],
        groups: None,
    };
    let outcome = apply_change_set(&mut collection, set, MergeOrigin::Remote);

    // #77 was never held locally; only #1 is actually removed.
    assert_eq!(outcome.evicted, vec![TicketId(1)]);
    assert_eq!(collection.ticket_count(), 0);
    let remaining = collection.group(&GroupName::from("new")).expect("new");
    assert!(remaining.stats().hours.abs() < 1e-9);
}

#[test]
fn local_confirm_records_no_remote_markers() {
    let mut collection = seeded_board();
    let set = ChangeSet {
        tickets: entries(vec![("accepted", data(1, "T2", 2, 4.0))]),
        evict: Vec::new(),
        groups: None,
    };
    let outcome = apply_change_set(&mut collection, set, MergeOrigin::LocalConfirm);

    assert_eq!(outcome.moved, vec![TicketId(1)]);
    assert!(outcome.remote_changes.is_empty());
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn snapshot_aligns_groups_and_prunes_absentees() {
    let mut collection = seeded_board();

    // The server no longer lists "accepted" and introduces "testing"; #1 is
    // gone entirely and #5 appears.
    let set = ChangeSet {
        tickets: entries(vec![("testing", data(5, "T3", 1, 1.5))]),
        evict: Vec::new(),
        groups: Some(vec![GroupName::from("new"), GroupName::from("testing")]),
    };
    let outcome = apply_snapshot(&mut collection, set);

    assert_eq!(outcome.created, vec![TicketId(5)]);
    assert_eq!(outcome.evicted, vec![TicketId(1)]);
    assert!(outcome.remote_changes.is_empty());
    assert!(collection.has_group(&GroupName::from("testing")));
    assert!(!collection.has_group(&GroupName::from("accepted")));
    assert_eq!(collection.ticket_count(), 1);
    assert!(collection.is_coherent());
}

/// Full pipeline: a fetched JSON snapshot flattened by the status strategy
/// and rebuilt into the collection.
#[test]
fn snapshot_pipeline_from_wire_payload() {
    let payload = serde_json::from_str(
        r#"{
            "tickets": {
                "classic": {
                    "new":      { "7": { "id": 7, "changetime": "T1", "priority_value": 3 } },
                    "accepted": { "9": { "id": 9, "changetime": "T1", "priority_value": 1 } }
                }
            },
            "groups": { "classic": ["new", "accepted", "closed"] }
        }"#,
    )
    .expect("parse snapshot");

    let strategy = GroupingStrategy::by_status("classic");
    let mut collection = GroupedCollection::new(PriorityDirection::LowerFirst);
    let outcome = apply_snapshot(&mut collection, strategy.flatten(payload));

    assert_eq!(outcome.created.len(), 2);
    assert_eq!(collection.group_count(), 3);
    assert_eq!(
        collection.group_of(TicketId(7)),
        Some(&GroupName::from("new"))
    );
    assert!(collection
        .group(&GroupName::from("closed"))
        .expect("closed")
        .is_empty());
}
