//! Persistence layer: the [`SwapStore`] trait and its implementations.
//!
//! The service talks to storage only through [`SwapStore`]. Two backends
//! exist: [`MemoryStore`] (a single lock over in-process tables, used in
//! tests and for local runs) and [`PostgresStore`] (`sqlx::PgPool`).
//!
//! Operations that must be all-or-nothing are single trait methods so each
//! backend can run them in one transaction: creating a request with its
//! preferred dates, inserting a match under the exclusivity rule, and the
//! three match transitions.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;

use crate::domain::{
    MatchId, PotentialMatch, PreferredDate, PreferredDateId, RequestId, RequestStatus, ShiftId,
    ShiftRecord, SwapRequest, UserId,
};
use crate::error::ShiftFlexError;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Filter for [`SwapStore::list_requests`]. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Only requests by this user.
    pub requester_id: Option<UserId>,
    /// Only requests in this status.
    pub status: Option<RequestStatus>,
    /// Only requests offering this shift.
    pub shift_id: Option<ShiftId>,
}

impl RequestFilter {
    /// All pending requests.
    #[must_use]
    pub fn pending() -> Self {
        Self {
            status: Some(RequestStatus::Pending),
            ..Self::default()
        }
    }

    /// Returns `true` if `request` passes the filter.
    #[must_use]
    pub fn matches(&self, request: &SwapRequest) -> bool {
        self.requester_id.is_none_or(|u| request.requester_id == u)
            && self.status.is_none_or(|s| request.status == s)
            && self.shift_id.is_none_or(|s| request.requester_shift_id == s)
    }
}

/// Result of [`SwapStore::insert_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchInsert {
    /// The match was stored.
    Inserted(PotentialMatch),
    /// An active match over the same two requests already exists.
    ExistingPair(PotentialMatch),
    /// One request is no longer `pending`; nothing was stored.
    RequestNotPending {
        /// The offending request.
        request_id: RequestId,
        /// Its current status.
        status: RequestStatus,
    },
    /// One request is already in an active match with someone else.
    RequestBusy {
        /// The busy request.
        request_id: RequestId,
        /// The active match holding it.
        match_id: MatchId,
    },
}

/// Result of a compare-and-set match transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The transition was applied; carries the updated match.
    Applied(PotentialMatch),
    /// The match was not in an allowed source status; nothing changed.
    Rejected(PotentialMatch),
}

/// Result of [`SwapStore::delete_preferred_date`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredDateRemoval {
    /// The date was removed and this many remain on the request.
    Removed {
        /// Preferred dates left on the request.
        remaining: usize,
    },
    /// It was the last date, so the request was deleted as well.
    RequestDeleted,
}

/// Everything needed to finalize a swap in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapPlan {
    /// Match being finalized.
    pub match_id: MatchId,
    /// Requester-side request.
    pub requester_request_id: RequestId,
    /// Acceptor-side request.
    pub acceptor_request_id: RequestId,
    /// Shift currently owned by `requester_user_id`.
    pub requester_shift_id: ShiftId,
    /// Shift currently owned by `acceptor_user_id`.
    pub acceptor_shift_id: ShiftId,
    /// Requester-side user.
    pub requester_user_id: UserId,
    /// Acceptor-side user.
    pub acceptor_user_id: UserId,
}

/// Persistent store for shifts, swap requests, preferred dates and matches.
#[async_trait]
pub trait SwapStore: Send + Sync + fmt::Debug {
    /// Looks up the notification address of a user.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn user_email(&self, user_id: UserId) -> Result<Option<String>, ShiftFlexError>;

    /// Records or replaces the notification address of a user.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn upsert_user_email(&self, user_id: UserId, email: &str) -> Result<(), ShiftFlexError>;

    /// Inserts shifts.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn insert_shifts(&self, shifts: &[ShiftRecord]) -> Result<(), ShiftFlexError>;

    /// Fetches one shift.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn get_shift(&self, id: ShiftId) -> Result<Option<ShiftRecord>, ShiftFlexError>;

    /// Fetches every listed shift that exists.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn shifts_by_ids(&self, ids: &[ShiftId]) -> Result<Vec<ShiftRecord>, ShiftFlexError>;

    /// Lists the shifts currently owned by `owner`, ordered by date.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn shifts_for_owner(&self, owner: UserId) -> Result<Vec<ShiftRecord>, ShiftFlexError>;

    /// Inserts a request together with its preferred dates.
    ///
    /// Fails with [`ShiftFlexError::Conflict`] when the shift already has a
    /// pending request, or a matched request whose match is still active.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn insert_request(
        &self,
        request: &SwapRequest,
        dates: &[PreferredDate],
    ) -> Result<(), ShiftFlexError>;

    /// Fetches one request.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn get_request(&self, id: RequestId) -> Result<Option<SwapRequest>, ShiftFlexError>;

    /// Lists requests passing `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn list_requests(&self, filter: RequestFilter)
    -> Result<Vec<SwapRequest>, ShiftFlexError>;

    /// Moves a request to `to` if it is currently `from`. Returns whether
    /// the update happened.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn update_request_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ShiftFlexError>;

    /// Preferred dates of the given requests.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn preferred_dates_for(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PreferredDate>, ShiftFlexError>;

    /// Deletes one preferred date, deleting the parent request and every
    /// match referencing it when it was the last one.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn delete_preferred_date(
        &self,
        request_id: RequestId,
        date_id: PreferredDateId,
    ) -> Result<PreferredDateRemoval, ShiftFlexError>;

    /// Inserts a match unless either request has left `pending` or is
    /// already in an active match.
    ///
    /// Fails with [`ShiftFlexError::NotFound`] if either request is gone.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn insert_match(&self, candidate: &PotentialMatch) -> Result<MatchInsert, ShiftFlexError>;

    /// Fetches one match.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn get_match(&self, id: MatchId) -> Result<Option<PotentialMatch>, ShiftFlexError>;

    /// Matches referencing any of the given requests, newest first.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn matches_for_requests(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PotentialMatch>, ShiftFlexError>;

    /// `pending -> accepted`, setting both requests to `matched`.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn accept_match(&self, id: MatchId) -> Result<Transition, ShiftFlexError>;

    /// `accepted -> completed`, swapping shift ownership and completing both
    /// requests.
    ///
    /// Fails with [`ShiftFlexError::Conflict`] and changes nothing if either
    /// shift is no longer owned by the expected user.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn complete_swap(&self, plan: &SwapPlan) -> Result<Transition, ShiftFlexError>;

    /// `pending | accepted -> cancelled`. With `revert_requests`, linked
    /// requests in `matched` go back to `pending`.
    ///
    /// # Errors
    ///
    /// Backend failures surface as [`ShiftFlexError::Dependency`].
    async fn cancel_match(
        &self,
        id: MatchId,
        revert_requests: bool,
    ) -> Result<Transition, ShiftFlexError>;
}
