//! Swap requests and the dates their requesters would accept in return.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{PreferredDateId, RequestId, ShiftId, ShiftType, UserId};

/// Lifecycle status of a [`SwapRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Waiting for a compatible partner.
    Pending,
    /// Part of an accepted match.
    Matched,
    /// The swap went through.
    Completed,
    /// Withdrawn by the requester.
    Cancelled,
}

impl RequestStatus {
    /// Returns the wire name of this status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Matched => "matched",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "matched" => Ok(Self::Matched),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// A user's offer to give up one of their shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SwapRequest {
    /// Request identifier.
    pub id: RequestId,
    /// User offering the shift.
    pub requester_id: UserId,
    /// The shift being offered.
    pub requester_shift_id: ShiftId,
    /// Current status.
    pub status: RequestStatus,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

impl SwapRequest {
    /// Creates a new pending request.
    #[must_use]
    pub fn new(requester_id: UserId, requester_shift_id: ShiftId) -> Self {
        Self {
            id: RequestId::new(),
            requester_id,
            requester_shift_id,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` while the request can still be matched.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// A date the requester would work instead of their offered shift.
///
/// An empty `accepted_types` set accepts any shift type on that date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PreferredDate {
    /// Row identifier.
    pub id: PreferredDateId,
    /// Owning request.
    pub request_id: RequestId,
    /// Specific shift the requester had in mind on that date, if any.
    pub shift_id: Option<ShiftId>,
    /// The wanted date.
    pub date: NaiveDate,
    /// Shift types acceptable on that date.
    pub accepted_types: BTreeSet<ShiftType>,
}

impl PreferredDate {
    /// Creates a preferred date for the given request.
    #[must_use]
    pub fn new(
        request_id: RequestId,
        date: NaiveDate,
        shift_id: Option<ShiftId>,
        accepted_types: BTreeSet<ShiftType>,
    ) -> Self {
        Self {
            id: PreferredDateId::new(),
            request_id,
            shift_id,
            date,
            accepted_types,
        }
    }

    /// Returns `true` if a shift of type `ty` on this date is acceptable.
    #[must_use]
    pub fn accepts_type(&self, ty: ShiftType) -> bool {
        self.accepted_types.is_empty() || self.accepted_types.contains(&ty)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn june(day: u32) -> NaiveDate {
        let Some(d) = NaiveDate::from_ymd_opt(2025, 6, day) else {
            panic!("valid date");
        };
        d
    }

    #[test]
    fn new_request_is_pending() {
        let req = SwapRequest::new(UserId::new(), ShiftId::new());
        assert!(req.is_pending());
        assert_eq!(req.status, RequestStatus::Pending);
    }

    #[test]
    fn empty_type_set_accepts_everything() {
        let pd = PreferredDate::new(RequestId::new(), june(10), None, BTreeSet::new());
        for ty in ShiftType::ALL {
            assert!(pd.accepts_type(ty));
        }
    }

    #[test]
    fn type_set_restricts() {
        let pd = PreferredDate::new(
            RequestId::new(),
            june(10),
            None,
            BTreeSet::from([ShiftType::Night]),
        );
        assert!(pd.accepts_type(ShiftType::Night));
        assert!(!pd.accepts_type(ShiftType::Day));
    }

    #[test]
    fn status_round_trips_through_wire_name() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Matched,
            RequestStatus::Completed,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>(), Ok(status));
        }
    }
}
