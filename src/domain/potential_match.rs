//! Persisted match records and their lifecycle.
//!
//! ```text
//! pending ──accept──▶ accepted ──finalize──▶ completed
//!    │                   │
//!    └──────cancel───────┴──────────────────▶ cancelled
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{MatchId, RequestId, ShiftId};

/// Lifecycle status of a [`PotentialMatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Discovered, awaiting confirmation.
    Pending,
    /// Confirmed by a party; requests are locked as `matched`.
    Accepted,
    /// Shift ownership has been swapped. Terminal.
    Completed,
    /// Abandoned without side effects. Terminal.
    Cancelled,
}

impl MatchStatus {
    /// Returns the wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for `pending` and `accepted`.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (*self, next),
            (Self::Pending, Self::Accepted)
                | (Self::Accepted, Self::Completed)
                | (Self::Pending | Self::Accepted, Self::Cancelled)
        )
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown match status: {other}")),
        }
    }
}

/// A discovered, mutually compatible pair of swap requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PotentialMatch {
    /// Match identifier.
    pub id: MatchId,
    /// Request whose owner is treated as the requester.
    pub requester_request_id: RequestId,
    /// Request on the other side of the swap.
    pub acceptor_request_id: RequestId,
    /// Shift offered by the requester side.
    pub requester_shift_id: ShiftId,
    /// Shift offered by the acceptor side.
    pub acceptor_shift_id: ShiftId,
    /// Current status.
    pub status: MatchStatus,
    /// Day the match was discovered.
    pub match_date: NaiveDate,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl PotentialMatch {
    /// Creates a new pending match dated today.
    #[must_use]
    pub fn new(
        requester_request_id: RequestId,
        acceptor_request_id: RequestId,
        requester_shift_id: ShiftId,
        acceptor_shift_id: ShiftId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: MatchId::new(),
            requester_request_id,
            acceptor_request_id,
            requester_shift_id,
            acceptor_shift_id,
            status: MatchStatus::Pending,
            match_date: now.date_naive(),
            created_at: now,
        }
    }

    /// Returns `true` if `request_id` is on either side of this match.
    #[must_use]
    pub fn involves(&self, request_id: RequestId) -> bool {
        self.requester_request_id == request_id || self.acceptor_request_id == request_id
    }

    /// Order-independent key of the two request ids.
    #[must_use]
    pub fn pair_key(&self) -> (RequestId, RequestId) {
        pair_key(self.requester_request_id, self.acceptor_request_id)
    }
}

/// Sorts two request ids into an unordered-pair key.
#[must_use]
pub fn pair_key(a: RequestId, b: RequestId) -> (RequestId, RequestId) {
    if a <= b { (a, b) } else { (b, a) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_transitions() {
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Accepted));
        assert!(MatchStatus::Accepted.can_transition_to(MatchStatus::Completed));
        assert!(MatchStatus::Pending.can_transition_to(MatchStatus::Cancelled));
        assert!(MatchStatus::Accepted.can_transition_to(MatchStatus::Cancelled));
    }

    #[test]
    fn forbidden_transitions() {
        assert!(!MatchStatus::Pending.can_transition_to(MatchStatus::Completed));
        assert!(!MatchStatus::Completed.can_transition_to(MatchStatus::Cancelled));
        assert!(!MatchStatus::Cancelled.can_transition_to(MatchStatus::Accepted));
        assert!(!MatchStatus::Completed.can_transition_to(MatchStatus::Accepted));
    }

    #[test]
    fn pair_key_is_order_independent() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn involves_either_side() {
        let m = PotentialMatch::new(RequestId::new(), RequestId::new(), ShiftId::new(), ShiftId::new());
        assert!(m.involves(m.requester_request_id));
        assert!(m.involves(m.acceptor_request_id));
        assert!(!m.involves(RequestId::new()));
        assert_eq!(m.status, MatchStatus::Pending);
    }
}
