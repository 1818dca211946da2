//! Domain events emitted by match lifecycle transitions.
//!
//! Every transition publishes a [`MatchEvent`] through the
//! [`super::EventBus`]. Events are fanned out to WebSocket subscribers and
//! consumed by the notifier, which turns some of them into emails.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MatchId, RequestId, ShiftId, UserId};

/// The two parties of a match, as carried on every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchParties {
    /// Owner of the requester-side request.
    pub requester_user_id: UserId,
    /// Owner of the acceptor-side request.
    pub acceptor_user_id: UserId,
}

impl MatchParties {
    /// Returns `true` if `user_id` is one of the two parties.
    #[must_use]
    pub fn includes(&self, user_id: UserId) -> bool {
        self.requester_user_id == user_id || self.acceptor_user_id == user_id
    }
}

/// Domain event emitted after every match state change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// A new pending match was recorded.
    MatchCreated {
        /// Match identifier.
        match_id: MatchId,
        /// Parties involved.
        parties: MatchParties,
        /// Requester-side request.
        requester_request_id: RequestId,
        /// Acceptor-side request.
        acceptor_request_id: RequestId,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The match was accepted and both requests are now `matched`.
    MatchAccepted {
        /// Match identifier.
        match_id: MatchId,
        /// Parties involved.
        parties: MatchParties,
        /// Acting user, `None` for system actions.
        accepted_by: Option<UserId>,
        /// Shift offered by the requester side.
        requester_shift_id: ShiftId,
        /// Shift offered by the acceptor side.
        acceptor_shift_id: ShiftId,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Shift ownership was swapped and the match is complete.
    MatchCompleted {
        /// Match identifier.
        match_id: MatchId,
        /// Parties involved.
        parties: MatchParties,
        /// Shift now owned by the acceptor.
        requester_shift_id: ShiftId,
        /// Shift now owned by the requester.
        acceptor_shift_id: ShiftId,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },

    /// The match was cancelled.
    MatchCancelled {
        /// Match identifier.
        match_id: MatchId,
        /// Parties involved.
        parties: MatchParties,
        /// Whether the linked requests went back to `pending`.
        requests_reverted: bool,
        /// Transition timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl MatchEvent {
    /// Returns the match ID associated with this event.
    #[must_use]
    pub fn match_id(&self) -> MatchId {
        match self {
            Self::MatchCreated { match_id, .. }
            | Self::MatchAccepted { match_id, .. }
            | Self::MatchCompleted { match_id, .. }
            | Self::MatchCancelled { match_id, .. } => *match_id,
        }
    }

    /// Returns the parties of the match.
    #[must_use]
    pub fn parties(&self) -> MatchParties {
        match self {
            Self::MatchCreated { parties, .. }
            | Self::MatchAccepted { parties, .. }
            | Self::MatchCompleted { parties, .. }
            | Self::MatchCancelled { parties, .. } => *parties,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::MatchCreated { .. } => "match_created",
            Self::MatchAccepted { .. } => "match_accepted",
            Self::MatchCompleted { .. } => "match_completed",
            Self::MatchCancelled { .. } => "match_cancelled",
        }
    }
}
