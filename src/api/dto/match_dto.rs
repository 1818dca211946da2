//! Match DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{MatchId, PotentialMatch, RequestId, RestViolation, ShiftId, UserId};
use crate::service::{MatchCreation, PartyRestCheck, RestCheck, SweepReport};

/// Request body for `POST /matches`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateMatchRequest {
    /// Requester-side request.
    pub requester_request_id: RequestId,
    /// Acceptor-side request.
    pub acceptor_request_id: RequestId,
}

/// Response body for `POST /matches`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateMatchResponse {
    /// `false` when an active match over the same pair already existed.
    pub created: bool,
    /// The match.
    #[serde(rename = "match")]
    pub potential_match: PotentialMatch,
}

impl From<MatchCreation> for CreateMatchResponse {
    fn from(creation: MatchCreation) -> Self {
        Self {
            created: creation.is_created(),
            potential_match: creation.into_match(),
        }
    }
}

/// Rest findings for one party.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartyRestDto {
    /// The party.
    pub user_id: UserId,
    /// Shift they would receive.
    pub incoming_shift_id: ShiftId,
    /// Conflicting shifts they hold.
    pub violations: Vec<RestViolation>,
}

impl From<PartyRestCheck> for PartyRestDto {
    fn from(p: PartyRestCheck) -> Self {
        Self {
            user_id: p.user_id,
            incoming_shift_id: p.incoming_shift_id,
            violations: p.violations,
        }
    }
}

/// Response body for `GET /matches/{id}/rest-check`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RestCheckResponse {
    /// Match checked.
    pub match_id: MatchId,
    /// `true` when neither party has a violation.
    pub ok: bool,
    /// Requester side.
    pub requester: PartyRestDto,
    /// Acceptor side.
    pub acceptor: PartyRestDto,
}

impl From<RestCheck> for RestCheckResponse {
    fn from(check: RestCheck) -> Self {
        Self {
            match_id: check.match_id,
            ok: check.requester.violations.is_empty() && check.acceptor.violations.is_empty(),
            requester: check.requester.into(),
            acceptor: check.acceptor.into(),
        }
    }
}

/// Response body for `POST /admin/sweep`.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct SweepResponse {
    /// Compatible pairs found.
    pub candidates: usize,
    /// New matches stored.
    pub created: usize,
    /// Pairs that already had an active match.
    pub existing: usize,
    /// Pairs skipped.
    pub conflicts: usize,
}

impl From<SweepReport> for SweepResponse {
    fn from(r: SweepReport) -> Self {
        Self {
            candidates: r.candidates,
            created: r.created,
            existing: r.existing,
            conflicts: r.conflicts,
        }
    }
}
