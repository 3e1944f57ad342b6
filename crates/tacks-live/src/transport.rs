//! The server boundary: fetching board payloads and persisting moves.
//!
//! The trait is the only seam that touches the network; everything above it
//! works on values. `&mut self` keeps scripted test doubles trivial, and an
//! HTTP client that needs sharing can wrap itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tacks_core::{BoardPayload, ChangeStamp, GroupName, TicketData, TicketId};

use crate::error::TransportError;

/// Where a dragged selection was dropped, relative to existing members of
/// the target group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionHint {
    /// Directly above this member.
    Before(TicketId),
    /// Directly below this member.
    After(TicketId),
    /// At this explicit ordinal (the "move to position N" affordance).
    At(u64),
    /// At the end of the group.
    Append,
}

/// One ticket in a move request: the id plus its last-observed stamp, so
/// the server can reject a move built on stale data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TicketRef {
    pub id: TicketId,
    #[serde(rename = "ts")]
    pub stamp: ChangeStamp,
}

/// A move batch, as submitted. One request covers a whole dragged
/// selection; the server assigns authoritative ordinals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRequest {
    pub tickets: Vec<TicketRef>,
    pub target: GroupName,
    pub hint: PositionHint,
    /// The field this board groups by, so the server knows what to write.
    pub group_field: String,
}

/// The server's verdict on a move batch: confirmed tickets carry fresh
/// stamps and ordinals, rejections come per ticket with messages.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MoveResponse {
    #[serde(default)]
    pub tickets: Vec<TicketData>,
    #[serde(default)]
    pub errors: Vec<(TicketId, Vec<String>)>,
}

/// Board server transport.
#[async_trait]
pub trait BoardTransport {
    /// Fetch changes in the window `(from, to]`, scoped to the board's
    /// current query.
    async fn fetch_diff(
        &mut self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<BoardPayload, TransportError>;

    /// Fetch a complete snapshot of the board's current scope.
    async fn fetch_snapshot(&mut self) -> Result<BoardPayload, TransportError>;

    /// Persist a move batch and return the server's verdict.
    async fn persist_move(&mut self, request: &MoveRequest) -> Result<MoveResponse, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_request_serializes_relative_placement() {
        let request = MoveRequest {
            tickets: vec![TicketRef {
                id: TicketId(7),
                stamp: ChangeStamp::from("T1"),
            }],
            target: GroupName::from("accepted"),
            hint: PositionHint::Before(TicketId(9)),
            group_field: "status".to_owned(),
        };
        let raw = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(raw["tickets"][0]["ts"], "T1");
        assert_eq!(raw["hint"]["before"], 9);
        assert_eq!(raw["group_field"], "status");

        let jump = serde_json::to_value(PositionHint::At(3)).expect("serialize hint");
        assert_eq!(jump["at"], 3);
    }

    #[test]
    fn move_response_tolerates_missing_sections() {
        let response: MoveResponse = serde_json::from_str("{}").expect("parse empty verdict");
        assert!(response.tickets.is_empty());
        assert!(response.errors.is_empty());

        let response: MoveResponse =
            serde_json::from_str(r#"{ "errors": [[4, ["no permission"]]] }"#)
                .expect("parse rejection");
        assert_eq!(response.errors[0].0, TicketId(4));
    }
}
