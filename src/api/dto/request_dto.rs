//! Swap request DTOs.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{PreferredDate, RequestId, RequestStatus, ShiftId, ShiftType, UserId};
use crate::persistence::PreferredDateRemoval;
use crate::service::{PreferredDateInput, SwapRequestDetail};

/// One wanted date in a submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PreferredDateDto {
    /// The wanted date.
    pub date: NaiveDate,
    /// Specific shift on that date, if any.
    #[serde(default)]
    pub shift_id: Option<ShiftId>,
    /// Acceptable shift types; empty or missing accepts any.
    #[serde(default)]
    pub accepted_types: BTreeSet<ShiftType>,
}

impl From<PreferredDateDto> for PreferredDateInput {
    fn from(dto: PreferredDateDto) -> Self {
        Self {
            date: dto.date,
            shift_id: dto.shift_id,
            accepted_types: dto.accepted_types,
        }
    }
}

/// Request body for `POST /swap-requests`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitSwapRequest {
    /// Shift being offered. Must belong to the caller.
    pub shift_id: ShiftId,
    /// Dates the caller would work instead. At least one.
    pub preferred_dates: Vec<PreferredDateDto>,
}

/// A swap request with its preferred dates.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SwapRequestDto {
    /// Request identifier.
    pub id: RequestId,
    /// Requesting user.
    pub requester_id: UserId,
    /// Offered shift.
    pub requester_shift_id: ShiftId,
    /// Current status.
    pub status: RequestStatus,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Wanted dates.
    pub preferred_dates: Vec<PreferredDate>,
}

impl From<SwapRequestDetail> for SwapRequestDto {
    fn from(detail: SwapRequestDetail) -> Self {
        let r = detail.request;
        Self {
            id: r.id,
            requester_id: r.requester_id,
            requester_shift_id: r.requester_shift_id,
            status: r.status,
            created_at: r.created_at,
            preferred_dates: detail.preferred_dates,
        }
    }
}

/// Query parameters for `GET /swap-requests`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct RequestListParams {
    /// Only requests in this status.
    #[serde(default)]
    pub status: Option<RequestStatus>,
}

/// Response body for removing a preferred date.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PreferredDateRemovalResponse {
    /// `true` when it was the last date and the request was deleted.
    pub request_deleted: bool,
    /// Dates left on the request.
    pub remaining: usize,
}

impl From<PreferredDateRemoval> for PreferredDateRemovalResponse {
    fn from(removal: PreferredDateRemoval) -> Self {
        match removal {
            PreferredDateRemoval::Removed { remaining } => Self {
                request_deleted: false,
                remaining,
            },
            PreferredDateRemoval::RequestDeleted => Self {
                request_deleted: true,
                remaining: 0,
            },
        }
    }
}
