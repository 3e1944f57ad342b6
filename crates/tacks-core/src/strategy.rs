//! Grouping strategies: one tagged type per grouping mode.
//!
//! Grouping by status carries an extra workflow layer in every payload (a
//! board can only show one workflow at a time, but the feed reports all of
//! them). Instead of threading that special case through every consumer,
//! the strategy flattens any payload into a single [`ChangeSet`] shape for
//! the active view: tickets to merge, ids to evict, and (for snapshots) the
//! authoritative group set.

use crate::group::GroupName;
use crate::payload::{BoardPayload, GroupListing, TicketData, TicketTree};
use crate::ticket::TicketId;

/// A payload flattened for the active view, ready for reconciliation.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Tickets to merge, each with the group the server reports it in.
    pub tickets: Vec<(GroupName, TicketData)>,
    /// Ids to evict when locally present: out-of-scope changes, plus (for
    /// status grouping) tickets that moved to another workflow.
    pub evict: Vec<TicketId>,
    /// Authoritative group set; `Some` only for full snapshots.
    pub groups: Option<Vec<GroupName>>,
}

/// How tickets are bucketed into groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingStrategy {
    /// Group by an arbitrary discrete field (owner, milestone, ...).
    ByField { field: String },
    /// Group by status, showing a single workflow at a time.
    ByStatus { workflow: String },
}

impl GroupingStrategy {
    #[must_use]
    pub fn by_field(field: impl Into<String>) -> Self {
        Self::ByField { field: field.into() }
    }

    #[must_use]
    pub fn by_status(workflow: impl Into<String>) -> Self {
        Self::ByStatus { workflow: workflow.into() }
    }

    /// The ticket field this board groups by, as sent in move requests.
    #[must_use]
    pub fn group_field(&self) -> &str {
        match self {
            Self::ByField { field } => field,
            Self::ByStatus { .. } => "status",
        }
    }

    /// The active workflow, when grouping by status.
    #[must_use]
    pub fn active_workflow(&self) -> Option<&str> {
        match self {
            Self::ByField { .. } => None,
            Self::ByStatus { workflow } => Some(workflow),
        }
    }

    /// Flatten a fetched payload into the active view's [`ChangeSet`].
    ///
    /// An empty tree is compatible with every strategy: a quiet window
    /// serializes as `{}` and deserializes as an arbitrary variant, so
    /// emptiness is checked before nesting. A non-empty payload whose
    /// nesting does not match the strategy is a contract violation by the
    /// caller's transport; it is skipped (debug builds assert).
    #[must_use]
    pub fn flatten(&self, payload: BoardPayload) -> ChangeSet {
        let mut set = ChangeSet {
            evict: payload.other_changes,
            ..ChangeSet::default()
        };

        match (self, payload.tickets) {
            (Self::ByField { .. }, Some(TicketTree::Flat(groups))) => {
                for (group, members) in groups {
                    for (_, data) in members {
                        set.tickets.push((group.clone(), data));
                    }
                }
            }
            (Self::ByStatus { workflow }, Some(TicketTree::Nested(mut workflows))) => {
                if let Some(active) = workflows.remove(workflow) {
                    for (group, members) in active {
                        for (_, data) in members {
                            set.tickets.push((group.clone(), data));
                        }
                    }
                }
                // A ticket reported under another workflow was retyped away
                // from the active view; evict it if we hold it.
                for groups in workflows.into_values() {
                    for members in groups.into_values() {
                        set.evict.extend(members.into_keys());
                    }
                }
            }
            (_, None) => {}
            (_, Some(tree)) if tree.is_empty() => {}
            (strategy, Some(_)) => {
                debug_assert!(
                    false,
                    "payload nesting does not match grouping strategy {strategy:?}"
                );
                tracing::warn!(?strategy, "mismatched payload nesting; ignoring tickets");
            }
        }

        set.groups = match (self, payload.groups) {
            (_, None) => None,
            (Self::ByField { .. }, Some(GroupListing::Flat(groups))) => Some(groups),
            (Self::ByStatus { workflow }, Some(GroupListing::Nested(mut workflows))) => {
                workflows.remove(workflow)
            }
            (_, Some(listing)) if listing.is_empty() => None,
            (strategy, Some(_)) => {
                debug_assert!(
                    false,
                    "group listing nesting does not match grouping strategy {strategy:?}"
                );
                None
            }
        };

        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::BoardPayload;

    fn nested_payload() -> BoardPayload {
        serde_json::from_str(
            r#"{
                "tickets": {
                    "classic": { "new": { "7": { "id": 7, "changetime": "T1" } } },
                    "kanban":  { "doing": { "8": { "id": 8, "changetime": "T2" } } }
                },
                "groups": { "classic": ["new", "closed"], "kanban": ["doing"] }
            }"#,
        )
        .expect("parse nested payload")
    }

    #[test]
    fn by_status_selects_active_workflow_and_evicts_the_rest() {
        let strategy = GroupingStrategy::by_status("classic");
        let set = strategy.flatten(nested_payload());

        assert_eq!(set.tickets.len(), 1);
        assert_eq!(set.tickets[0].0, GroupName::from("new"));
        assert_eq!(set.evict, vec![TicketId(8)]);
        assert_eq!(
            set.groups,
            Some(vec![GroupName::from("new"), GroupName::from("closed")])
        );
    }

    #[test]
    fn quiet_window_payload_is_a_noop_under_every_strategy() {
        // `"tickets": {}` and all-empty inner maps deserialize as the flat
        // variant; neither may be treated as a nesting mismatch.
        for raw in [
            r#"{ "tickets": {} }"#,
            r#"{ "tickets": { "classic": {} } }"#,
            r#"{ "tickets": {}, "groups": [] }"#,
        ] {
            let payload: BoardPayload = serde_json::from_str(raw).expect("parse payload");
            let set = GroupingStrategy::by_status("classic").flatten(payload.clone());
            assert!(set.tickets.is_empty(), "status strategy on {raw}");
            assert!(set.evict.is_empty());

            let set = GroupingStrategy::by_field("milestone").flatten(payload);
            assert!(set.tickets.is_empty(), "field strategy on {raw}");
        }
    }

    #[test]
    fn by_field_flattens_groups_directly() {
        let payload: BoardPayload = serde_json::from_str(
            r#"{
                "tickets": { "1.0": { "3": { "id": 3, "changetime": "T1" } } },
                "otherChanges": [99],
                "groups": ["1.0", ""]
            }"#,
        )
        .expect("parse flat payload");

        let strategy = GroupingStrategy::by_field("milestone");
        let set = strategy.flatten(payload);
        assert_eq!(set.tickets.len(), 1);
        assert_eq!(set.evict, vec![TicketId(99)]);
        assert_eq!(
            set.groups,
            Some(vec![GroupName::from("1.0"), GroupName::unset()])
        );
        assert_eq!(strategy.group_field(), "milestone");
    }
}
