//! Match service: submission, discovery and the match lifecycle.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};

use crate::config::ShiftFlexConfig;
use crate::domain::calendar::{RestViolation, four_on_four_off, rest_violations};
use crate::domain::{
    EventBus, MatchCandidate, MatchContext, MatchEvent, MatchId, MatchOptions, MatchParties,
    MatchStatus, PotentialMatch, PreferredDate, PreferredDateId, RequestId, RequestStatus, ShiftId,
    ShiftRecord, ShiftType, SwapRequest, UserId, find_matches,
};
use crate::error::ShiftFlexError;
use crate::persistence::{
    MatchInsert, PreferredDateRemoval, RequestFilter, SwapPlan, SwapStore, Transition,
};

/// Longest range accepted by [`MatchService::create_repeating_shifts`].
pub const MAX_REPEAT_DAYS: i64 = 366;

/// Who is performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// An authenticated user. May only act on their own records.
    User(UserId),
    /// The service itself (the sweep, admin tooling).
    System,
}

impl Actor {
    /// The acting user, if any.
    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::System => None,
        }
    }

    fn require_user(&self) -> Result<UserId, ShiftFlexError> {
        self.user_id()
            .ok_or_else(|| ShiftFlexError::Forbidden("this operation needs a user".to_string()))
    }

    fn may_act_for(&self, user_id: UserId) -> bool {
        match self {
            Self::User(id) => *id == user_id,
            Self::System => true,
        }
    }
}

/// Outcome of [`MatchService::create_match`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchCreation {
    /// A new pending match was stored.
    Created(PotentialMatch),
    /// An active match over the same two requests already existed.
    Existing(PotentialMatch),
}

impl MatchCreation {
    /// The match, whichever way it was obtained.
    #[must_use]
    pub fn into_match(self) -> PotentialMatch {
        match self {
            Self::Created(m) | Self::Existing(m) => m,
        }
    }

    /// `true` if this call stored the match.
    #[must_use]
    pub const fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Counters returned by [`MatchService::run_sweep`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Compatible pairs found.
    pub candidates: usize,
    /// New matches stored.
    pub created: usize,
    /// Pairs that already had an active match.
    pub existing: usize,
    /// Pairs skipped because a request was busy or no longer pending.
    pub conflicts: usize,
}

/// Fields of a shift to create. The owner is the acting user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftTemplate {
    /// Date of the (first) shift.
    pub date: NaiveDate,
    /// Start time.
    pub start_time: NaiveTime,
    /// End time; at or before `start_time` means the next day.
    pub end_time: NaiveTime,
    /// Vehicle assignment.
    pub truck_name: Option<String>,
    /// Colleague category.
    pub colleague_type: Option<String>,
}

impl ShiftTemplate {
    fn on(&self, date: NaiveDate, owner: UserId) -> ShiftRecord {
        ShiftRecord {
            id: ShiftId::new(),
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            truck_name: self.truck_name.clone(),
            colleague_type: self.colleague_type.clone(),
            owner_user_id: owner,
        }
    }
}

/// One wanted date in a new swap request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreferredDateInput {
    /// The wanted date.
    pub date: NaiveDate,
    /// Specific shift on that date, if the requester picked one.
    pub shift_id: Option<ShiftId>,
    /// Acceptable types; empty accepts any.
    pub accepted_types: BTreeSet<ShiftType>,
}

/// A swap request with its preferred dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequestDetail {
    /// The request.
    pub request: SwapRequest,
    /// Its preferred dates.
    pub preferred_dates: Vec<PreferredDate>,
}

/// Rest-rule findings for one party of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyRestCheck {
    /// The party.
    pub user_id: UserId,
    /// Shift this party would receive.
    pub incoming_shift_id: ShiftId,
    /// Held shifts that would be too close to it.
    pub violations: Vec<RestViolation>,
}

/// Advisory rest-rule report for both sides of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestCheck {
    /// Match checked.
    pub match_id: MatchId,
    /// Requester side.
    pub requester: PartyRestCheck,
    /// Acceptor side.
    pub acceptor: PartyRestCheck,
}

/// Tunables for [`MatchService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceSettings {
    /// Matcher options.
    pub match_options: MatchOptions,
    /// Upper bound for each store call.
    pub call_timeout: Duration,
    /// Whether cancelling a match puts its requests back to `pending`.
    pub cancel_reverts_requests: bool,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            match_options: MatchOptions::default(),
            call_timeout: Duration::from_secs(5),
            cancel_reverts_requests: false,
        }
    }
}

impl From<&ShiftFlexConfig> for ServiceSettings {
    fn from(config: &ShiftFlexConfig) -> Self {
        Self {
            match_options: MatchOptions {
                type_filtering: config.match_type_filtering,
            },
            call_timeout: config.store_call_timeout(),
            cancel_reverts_requests: config.cancel_reverts_requests,
        }
    }
}

/// Orchestration layer over the [`SwapStore`].
///
/// Holds no state of its own. Every mutation goes through a single store
/// method so it is atomic, then publishes a [`MatchEvent`] on the
/// [`EventBus`]. Store calls are bounded by
/// [`ServiceSettings::call_timeout`].
#[derive(Debug, Clone)]
pub struct MatchService {
    store: Arc<dyn SwapStore>,
    event_bus: EventBus,
    settings: ServiceSettings,
}

impl MatchService {
    /// Creates a new `MatchService`.
    #[must_use]
    pub fn new(store: Arc<dyn SwapStore>, event_bus: EventBus, settings: ServiceSettings) -> Self {
        Self {
            store,
            event_bus,
            settings,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SwapStore> {
        &self.store
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    async fn call<T, F>(&self, op: &'static str, fut: F) -> Result<T, ShiftFlexError>
    where
        F: Future<Output = Result<T, ShiftFlexError>>,
    {
        match tokio::time::timeout(self.settings.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, "store call timed out");
                Err(ShiftFlexError::Timeout(op))
            }
        }
    }

    /// Stores the notification address the auth provider supplied for a
    /// user.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn record_user_email(&self, user_id: UserId, email: &str) -> Result<(), ShiftFlexError> {
        self.call("upsert_user_email", self.store.upsert_user_email(user_id, email))
            .await?;
        tracing::debug!(%user_id, "notification address recorded");
        Ok(())
    }

    // ----- shifts -------------------------------------------------------

    /// Creates one shift owned by the acting user.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::Forbidden`] for the system actor, store errors
    /// otherwise.
    pub async fn create_shift(
        &self,
        actor: Actor,
        template: &ShiftTemplate,
    ) -> Result<ShiftRecord, ShiftFlexError> {
        let owner = actor.require_user()?;
        let shift = template.on(template.date, owner);
        self.call("insert_shifts", self.store.insert_shifts(std::slice::from_ref(&shift)))
            .await?;
        tracing::info!(shift_id = %shift.id, %owner, date = %shift.date, "shift created");
        Ok(shift)
    }

    /// Creates a 4-on/4-off rotation of `template` from `template.date`
    /// through `until`.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::InvalidRequest`] if `until` is before the start
    /// or more than [`MAX_REPEAT_DAYS`] after it.
    pub async fn create_repeating_shifts(
        &self,
        actor: Actor,
        template: &ShiftTemplate,
        until: NaiveDate,
    ) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let owner = actor.require_user()?;
        let span = (until - template.date).num_days();
        if span < 0 {
            return Err(ShiftFlexError::InvalidRequest(
                "repeat end date is before the start date".to_string(),
            ));
        }
        if span > MAX_REPEAT_DAYS {
            return Err(ShiftFlexError::InvalidRequest(format!(
                "repeat range may not exceed {MAX_REPEAT_DAYS} days"
            )));
        }

        let shifts: Vec<ShiftRecord> = four_on_four_off(template.date, until)
            .into_iter()
            .map(|date| template.on(date, owner))
            .collect();
        self.call("insert_shifts", self.store.insert_shifts(&shifts))
            .await?;
        tracing::info!(%owner, count = shifts.len(), %until, "repeating shifts created");
        Ok(shifts)
    }

    /// Shifts currently owned by the acting user.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn list_shifts(&self, actor: Actor) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let owner = actor.require_user()?;
        self.call("shifts_for_owner", self.store.shifts_for_owner(owner))
            .await
    }

    // ----- swap requests ------------------------------------------------

    /// Offers one of the acting user's shifts for swapping.
    ///
    /// # Errors
    ///
    /// - [`ShiftFlexError::NotFound`] if the shift does not exist.
    /// - [`ShiftFlexError::Forbidden`] if the actor does not own it.
    /// - [`ShiftFlexError::InvalidRequest`] for no preferred dates or a
    ///   preferred date equal to the shift's own date.
    /// - [`ShiftFlexError::Conflict`] if the shift already has a pending
    ///   request or is promised in an active match.
    pub async fn submit_swap_request(
        &self,
        actor: Actor,
        shift_id: ShiftId,
        preferred: &[PreferredDateInput],
    ) -> Result<SwapRequestDetail, ShiftFlexError> {
        let user_id = actor.require_user()?;
        let shift = self
            .call("get_shift", self.store.get_shift(shift_id))
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("shift", shift_id))?;
        if shift.owner_user_id != user_id {
            return Err(ShiftFlexError::Forbidden(format!(
                "shift {shift_id} is not owned by {user_id}"
            )));
        }
        if preferred.is_empty() {
            return Err(ShiftFlexError::InvalidRequest(
                "at least one preferred date is required".to_string(),
            ));
        }
        if preferred.iter().any(|p| p.date == shift.date) {
            return Err(ShiftFlexError::InvalidRequest(format!(
                "preferred date {} is the date of the offered shift",
                shift.date
            )));
        }

        let request = SwapRequest::new(user_id, shift_id);
        let dates: Vec<PreferredDate> = preferred
            .iter()
            .map(|p| PreferredDate::new(request.id, p.date, p.shift_id, p.accepted_types.clone()))
            .collect();
        self.call("insert_request", self.store.insert_request(&request, &dates))
            .await?;

        tracing::info!(
            request_id = %request.id,
            %user_id,
            %shift_id,
            dates = dates.len(),
            "swap request submitted"
        );
        Ok(SwapRequestDetail {
            request,
            preferred_dates: dates,
        })
    }

    /// The acting user's requests with their preferred dates, optionally
    /// restricted to one status. The system actor sees every request.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn list_requests(
        &self,
        actor: Actor,
        status: Option<RequestStatus>,
    ) -> Result<Vec<SwapRequestDetail>, ShiftFlexError> {
        let filter = RequestFilter {
            requester_id: actor.user_id(),
            status,
            shift_id: None,
        };
        let requests = self
            .call("list_requests", self.store.list_requests(filter))
            .await?;
        let ids: Vec<RequestId> = requests.iter().map(|r| r.id).collect();
        let mut dates = group_dates(
            self.call("preferred_dates_for", self.store.preferred_dates_for(&ids))
                .await?,
        );
        Ok(requests
            .into_iter()
            .map(|request| SwapRequestDetail {
                preferred_dates: dates.remove(&request.id).unwrap_or_default(),
                request,
            })
            .collect())
    }

    async fn owned_request(
        &self,
        actor: Actor,
        request_id: RequestId,
    ) -> Result<SwapRequest, ShiftFlexError> {
        let request = self
            .call("get_request", self.store.get_request(request_id))
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("swap request", request_id))?;
        if !actor.may_act_for(request.requester_id) {
            return Err(ShiftFlexError::Forbidden(format!(
                "swap request {request_id} belongs to another user"
            )));
        }
        Ok(request)
    }

    async fn ensure_unmatched(&self, request: &SwapRequest) -> Result<(), ShiftFlexError> {
        if !request.is_pending() {
            return Err(ShiftFlexError::invalid_state(
                "swap request",
                request.id,
                request.status,
            ));
        }
        let matches = self
            .call("matches_for_requests", self.store.matches_for_requests(&[request.id]))
            .await?;
        if let Some(active) = matches.iter().find(|m| m.status.is_active()) {
            return Err(ShiftFlexError::Conflict(format!(
                "swap request {} is part of active match {}; cancel the match first",
                request.id, active.id
            )));
        }
        Ok(())
    }

    /// Withdraws a pending request that is not part of an active match.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::InvalidState`] if it is no longer pending,
    /// [`ShiftFlexError::Conflict`] if an active match holds it.
    pub async fn withdraw_swap_request(
        &self,
        actor: Actor,
        request_id: RequestId,
    ) -> Result<SwapRequest, ShiftFlexError> {
        let mut request = self.owned_request(actor, request_id).await?;
        self.ensure_unmatched(&request).await?;
        let updated = self
            .call(
                "update_request_status",
                self.store.update_request_status(
                    request_id,
                    RequestStatus::Pending,
                    RequestStatus::Cancelled,
                ),
            )
            .await?;
        if !updated {
            let current = self
                .call("get_request", self.store.get_request(request_id))
                .await?
                .map_or_else(|| "deleted".to_string(), |r| r.status.to_string());
            return Err(ShiftFlexError::invalid_state("swap request", request_id, current));
        }
        request.status = RequestStatus::Cancelled;
        tracing::info!(%request_id, "swap request withdrawn");
        Ok(request)
    }

    /// Removes one preferred date. Removing the last one deletes the
    /// request.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::NotFound`] for an unknown request or date,
    /// [`ShiftFlexError::InvalidState`] / [`ShiftFlexError::Conflict`] as
    /// for [`Self::withdraw_swap_request`].
    pub async fn remove_preferred_date(
        &self,
        actor: Actor,
        request_id: RequestId,
        date_id: PreferredDateId,
    ) -> Result<PreferredDateRemoval, ShiftFlexError> {
        let request = self.owned_request(actor, request_id).await?;
        self.ensure_unmatched(&request).await?;
        let removal = self
            .call(
                "delete_preferred_date",
                self.store.delete_preferred_date(request_id, date_id),
            )
            .await?;
        match removal {
            PreferredDateRemoval::Removed { remaining } => {
                tracing::info!(%request_id, %date_id, remaining, "preferred date removed");
            }
            PreferredDateRemoval::RequestDeleted => {
                tracing::info!(%request_id, %date_id, "last preferred date removed; request deleted");
            }
        }
        Ok(removal)
    }

    // ----- discovery ----------------------------------------------------

    async fn load_context(
        &self,
        requests: &[SwapRequest],
    ) -> Result<
        (
            HashMap<ShiftId, ShiftRecord>,
            HashMap<RequestId, Vec<PreferredDate>>,
        ),
        ShiftFlexError,
    > {
        let shift_ids: Vec<ShiftId> = requests.iter().map(|r| r.requester_shift_id).collect();
        let request_ids: Vec<RequestId> = requests.iter().map(|r| r.id).collect();
        let shifts = self
            .call("shifts_by_ids", self.store.shifts_by_ids(&shift_ids))
            .await?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        let dates = group_dates(
            self.call("preferred_dates_for", self.store.preferred_dates_for(&request_ids))
                .await?,
        );
        Ok((shifts, dates))
    }

    /// Compatible pairs between the acting user's pending requests and
    /// everyone else's. Read only.
    ///
    /// A request may appear in several candidates; only one of them can
    /// become an active match.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn find_matches_for_user(
        &self,
        actor: Actor,
    ) -> Result<Vec<MatchCandidate>, ShiftFlexError> {
        let user_id = actor.require_user()?;
        let pending = self
            .call("list_requests", self.store.list_requests(RequestFilter::pending()))
            .await?;
        let (mine, others): (Vec<SwapRequest>, Vec<SwapRequest>) =
            pending.iter().cloned().partition(|r| r.requester_id == user_id);
        let (shifts, dates) = self.load_context(&pending).await?;
        let ctx = MatchContext {
            shifts: &shifts,
            preferred_dates: &dates,
            options: self.settings.match_options,
        };
        Ok(find_matches(&mine, &others, &ctx))
    }

    /// Matches every pending request against every other and records a
    /// match for each compatible pair. Busy pairs are counted, not fatal.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn run_sweep(&self) -> Result<SweepReport, ShiftFlexError> {
        let pending = self
            .call("list_requests", self.store.list_requests(RequestFilter::pending()))
            .await?;
        let (shifts, dates) = self.load_context(&pending).await?;
        let ctx = MatchContext {
            shifts: &shifts,
            preferred_dates: &dates,
            options: self.settings.match_options,
        };
        let candidates = find_matches(&pending, &pending, &ctx);

        let mut report = SweepReport {
            candidates: candidates.len(),
            ..SweepReport::default()
        };
        for candidate in &candidates {
            let parties = MatchParties {
                requester_user_id: candidate.requester.user_id,
                acceptor_user_id: candidate.acceptor.user_id,
            };
            let m = PotentialMatch::new(
                candidate.requester.request_id,
                candidate.acceptor.request_id,
                candidate.requester.shift_id,
                candidate.acceptor.shift_id,
            );
            match self.insert_match(&m, parties).await {
                Ok(MatchCreation::Created(_)) => report.created += 1,
                Ok(MatchCreation::Existing(_)) => report.existing += 1,
                Err(ShiftFlexError::Conflict(reason) | ShiftFlexError::InvalidRequest(reason)) => {
                    tracing::debug!(%reason, "sweep skipped candidate");
                    report.conflicts += 1;
                }
                Err(ShiftFlexError::InvalidState { .. } | ShiftFlexError::NotFound { .. }) => {
                    report.conflicts += 1;
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            candidates = report.candidates,
            created = report.created,
            existing = report.existing,
            conflicts = report.conflicts,
            "match sweep finished"
        );
        Ok(report)
    }

    async fn insert_match(
        &self,
        candidate: &PotentialMatch,
        parties: MatchParties,
    ) -> Result<MatchCreation, ShiftFlexError> {
        match self
            .call("insert_match", self.store.insert_match(candidate))
            .await?
        {
            MatchInsert::Inserted(m) => {
                let _ = self.event_bus.publish(MatchEvent::MatchCreated {
                    match_id: m.id,
                    parties,
                    requester_request_id: m.requester_request_id,
                    acceptor_request_id: m.acceptor_request_id,
                    timestamp: Utc::now(),
                });
                tracing::info!(match_id = %m.id, "match created");
                Ok(MatchCreation::Created(m))
            }
            MatchInsert::ExistingPair(m) => Ok(MatchCreation::Existing(m)),
            MatchInsert::RequestNotPending { request_id, status } => Err(
                ShiftFlexError::invalid_state("swap request", request_id, status),
            ),
            MatchInsert::RequestBusy {
                request_id,
                match_id,
            } => Err(ShiftFlexError::Conflict(format!(
                "swap request {request_id} is already in active match {match_id}"
            ))),
        }
    }

    // ----- lifecycle ----------------------------------------------------

    /// Records a pending match between two compatible pending requests.
    ///
    /// Returns [`MatchCreation::Existing`] when the same pair already has
    /// an active match.
    ///
    /// # Errors
    ///
    /// - [`ShiftFlexError::NotFound`] if either request is missing.
    /// - [`ShiftFlexError::InvalidState`] if either is not pending.
    /// - [`ShiftFlexError::InvalidRequest`] for the same user on both
    ///   sides or requests that are not mutually compatible.
    /// - [`ShiftFlexError::Forbidden`] if a user actor owns neither.
    /// - [`ShiftFlexError::Conflict`] if either request is already in an
    ///   active match with a different partner.
    pub async fn create_match(
        &self,
        actor: Actor,
        requester_request_id: RequestId,
        acceptor_request_id: RequestId,
    ) -> Result<MatchCreation, ShiftFlexError> {
        let (requester, acceptor) = self
            .request_pair(requester_request_id, acceptor_request_id)
            .await?;
        for request in [&requester, &acceptor] {
            if !request.is_pending() {
                return Err(ShiftFlexError::invalid_state(
                    "swap request",
                    request.id,
                    request.status,
                ));
            }
        }
        if requester.requester_id == acceptor.requester_id {
            return Err(ShiftFlexError::InvalidRequest(
                "both requests belong to the same user".to_string(),
            ));
        }
        let parties = MatchParties {
            requester_user_id: requester.requester_id,
            acceptor_user_id: acceptor.requester_id,
        };
        authorize(actor, &parties)?;

        let pair = [requester.clone(), acceptor.clone()];
        let (shifts, dates) = self.load_context(&pair).await?;
        let ctx = MatchContext {
            shifts: &shifts,
            preferred_dates: &dates,
            options: self.settings.match_options,
        };
        if ctx.evaluate(&requester, &acceptor).is_none() {
            return Err(ShiftFlexError::InvalidRequest(format!(
                "swap requests {requester_request_id} and {acceptor_request_id} are not compatible"
            )));
        }

        let candidate = PotentialMatch::new(
            requester.id,
            acceptor.id,
            requester.requester_shift_id,
            acceptor.requester_shift_id,
        );
        self.insert_match(&candidate, parties).await
    }

    async fn request_pair(
        &self,
        a: RequestId,
        b: RequestId,
    ) -> Result<(SwapRequest, SwapRequest), ShiftFlexError> {
        if a == b {
            return Err(ShiftFlexError::InvalidRequest(
                "a request cannot be matched with itself".to_string(),
            ));
        }
        let first = self
            .call("get_request", self.store.get_request(a))
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("swap request", a))?;
        let second = self
            .call("get_request", self.store.get_request(b))
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("swap request", b))?;
        Ok((first, second))
    }

    /// Loads a match and its two requests, checking that `actor` may see it.
    async fn load_match(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<(PotentialMatch, SwapRequest, SwapRequest), ShiftFlexError> {
        let m = self
            .call("get_match", self.store.get_match(match_id))
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("match", match_id))?;
        let (requester, acceptor) = self
            .request_pair(m.requester_request_id, m.acceptor_request_id)
            .await?;
        authorize(
            actor,
            &MatchParties {
                requester_user_id: requester.requester_id,
                acceptor_user_id: acceptor.requester_id,
            },
        )?;
        Ok((m, requester, acceptor))
    }

    /// Fetches a match the actor is party to.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::NotFound`] or [`ShiftFlexError::Forbidden`].
    pub async fn get_match(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<PotentialMatch, ShiftFlexError> {
        self.load_match(actor, match_id).await.map(|(m, _, _)| m)
    }

    /// Every match involving one of the acting user's requests, newest
    /// first.
    ///
    /// # Errors
    ///
    /// Store errors.
    pub async fn list_matches_for_user(
        &self,
        actor: Actor,
    ) -> Result<Vec<PotentialMatch>, ShiftFlexError> {
        let user_id = actor.require_user()?;
        let filter = RequestFilter {
            requester_id: Some(user_id),
            ..RequestFilter::default()
        };
        let requests = self
            .call("list_requests", self.store.list_requests(filter))
            .await?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<RequestId> = requests.iter().map(|r| r.id).collect();
        self.call("matches_for_requests", self.store.matches_for_requests(&ids))
            .await
    }

    /// `pending -> accepted`; both requests become `matched`.
    ///
    /// Accepting an already accepted match succeeds without side effects.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::InvalidState`] from `completed` or `cancelled`.
    pub async fn accept_match(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<PotentialMatch, ShiftFlexError> {
        let (_, requester, acceptor) = self.load_match(actor, match_id).await?;
        match self
            .call("accept_match", self.store.accept_match(match_id))
            .await?
        {
            Transition::Applied(m) => {
                let _ = self.event_bus.publish(MatchEvent::MatchAccepted {
                    match_id,
                    parties: parties_of(&requester, &acceptor),
                    accepted_by: actor.user_id(),
                    requester_shift_id: m.requester_shift_id,
                    acceptor_shift_id: m.acceptor_shift_id,
                    timestamp: Utc::now(),
                });
                tracing::info!(%match_id, "match accepted");
                Ok(m)
            }
            Transition::Rejected(m) if m.status == MatchStatus::Accepted => {
                tracing::debug!(%match_id, "match already accepted");
                Ok(m)
            }
            Transition::Rejected(m) => Err(ShiftFlexError::invalid_state("match", m.id, m.status)),
        }
    }

    /// `accepted -> completed`, swapping ownership of the two shifts in one
    /// atomic store operation.
    ///
    /// # Errors
    ///
    /// - [`ShiftFlexError::InvalidState`] unless the match is `accepted`;
    ///   nothing is changed.
    /// - [`ShiftFlexError::Conflict`] if either shift changed owner since
    ///   the match was made; nothing is changed.
    pub async fn finalize_match(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<PotentialMatch, ShiftFlexError> {
        let (m, requester, acceptor) = self.load_match(actor, match_id).await?;
        if m.status != MatchStatus::Accepted {
            return Err(ShiftFlexError::invalid_state("match", match_id, m.status));
        }

        let plan = SwapPlan {
            match_id,
            requester_request_id: requester.id,
            acceptor_request_id: acceptor.id,
            requester_shift_id: m.requester_shift_id,
            acceptor_shift_id: m.acceptor_shift_id,
            requester_user_id: requester.requester_id,
            acceptor_user_id: acceptor.requester_id,
        };
        match self
            .call("complete_swap", self.store.complete_swap(&plan))
            .await?
        {
            Transition::Applied(done) => {
                let _ = self.event_bus.publish(MatchEvent::MatchCompleted {
                    match_id,
                    parties: parties_of(&requester, &acceptor),
                    requester_shift_id: done.requester_shift_id,
                    acceptor_shift_id: done.acceptor_shift_id,
                    timestamp: Utc::now(),
                });
                tracing::info!(
                    %match_id,
                    requester_shift_id = %plan.requester_shift_id,
                    acceptor_shift_id = %plan.acceptor_shift_id,
                    "match finalized; shift ownership swapped"
                );
                Ok(done)
            }
            Transition::Rejected(current) => Err(ShiftFlexError::invalid_state(
                "match",
                match_id,
                current.status,
            )),
        }
    }

    /// `pending | accepted -> cancelled`. Shift ownership is never touched.
    ///
    /// Linked requests go back to `pending` only when
    /// [`ServiceSettings::cancel_reverts_requests`] is set.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::InvalidState`] from `completed` or `cancelled`.
    pub async fn cancel_match(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<PotentialMatch, ShiftFlexError> {
        let (_, requester, acceptor) = self.load_match(actor, match_id).await?;
        let revert = self.settings.cancel_reverts_requests;
        match self
            .call("cancel_match", self.store.cancel_match(match_id, revert))
            .await?
        {
            Transition::Applied(m) => {
                let _ = self.event_bus.publish(MatchEvent::MatchCancelled {
                    match_id,
                    parties: parties_of(&requester, &acceptor),
                    requests_reverted: revert,
                    timestamp: Utc::now(),
                });
                tracing::info!(%match_id, requests_reverted = revert, "match cancelled");
                Ok(m)
            }
            Transition::Rejected(m) => Err(ShiftFlexError::invalid_state("match", m.id, m.status)),
        }
    }

    /// Reports, for both parties, which of their other shifts would sit
    /// closer than the minimum rest to the shift they receive. Advisory:
    /// finalizing is never blocked by it.
    ///
    /// # Errors
    ///
    /// [`ShiftFlexError::NotFound`] / [`ShiftFlexError::Forbidden`], or
    /// store errors.
    pub async fn rest_check(
        &self,
        actor: Actor,
        match_id: MatchId,
    ) -> Result<RestCheck, ShiftFlexError> {
        let (m, requester, acceptor) = self.load_match(actor, match_id).await?;
        let pair = self
            .call(
                "shifts_by_ids",
                self.store
                    .shifts_by_ids(&[m.requester_shift_id, m.acceptor_shift_id]),
            )
            .await?;
        let find = |id: ShiftId| {
            pair.iter()
                .find(|s| s.id == id)
                .cloned()
                .ok_or_else(|| ShiftFlexError::not_found("shift", id))
        };
        let requester_shift = find(m.requester_shift_id)?;
        let acceptor_shift = find(m.acceptor_shift_id)?;

        Ok(RestCheck {
            match_id,
            requester: self
                .party_rest_check(requester.requester_id, &acceptor_shift, requester_shift.id)
                .await?,
            acceptor: self
                .party_rest_check(acceptor.requester_id, &requester_shift, acceptor_shift.id)
                .await?,
        })
    }

    async fn party_rest_check(
        &self,
        user_id: UserId,
        incoming: &ShiftRecord,
        given_up: ShiftId,
    ) -> Result<PartyRestCheck, ShiftFlexError> {
        let held = self
            .call("shifts_for_owner", self.store.shifts_for_owner(user_id))
            .await?;
        let violations = rest_violations(incoming, held.iter().filter(|s| s.id != given_up));
        Ok(PartyRestCheck {
            user_id,
            incoming_shift_id: incoming.id,
            violations,
        })
    }
}

fn authorize(actor: Actor, parties: &MatchParties) -> Result<(), ShiftFlexError> {
    match actor {
        Actor::System => Ok(()),
        Actor::User(id) if parties.includes(id) => Ok(()),
        Actor::User(id) => Err(ShiftFlexError::Forbidden(format!(
            "user {id} is not a party of this match"
        ))),
    }
}

fn parties_of(requester: &SwapRequest, acceptor: &SwapRequest) -> MatchParties {
    MatchParties {
        requester_user_id: requester.requester_id,
        acceptor_user_id: acceptor.requester_id,
    }
}

fn group_dates(dates: Vec<PreferredDate>) -> HashMap<RequestId, Vec<PreferredDate>> {
    let mut grouped: HashMap<RequestId, Vec<PreferredDate>> = HashMap::new();
    for date in dates {
        grouped.entry(date.request_id).or_default().push(date);
    }
    grouped
}
