//! In-process [`SwapStore`] backed by hash maps.
//!
//! All tables live behind one [`tokio::sync::RwLock`], so every trait
//! method observes and mutates a consistent snapshot. That makes the
//! multi-row operations atomic without any extra bookkeeping.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    MatchInsert, PreferredDateRemoval, RequestFilter, SwapPlan, SwapStore, Transition,
};
use crate::domain::{
    MatchId, MatchStatus, PotentialMatch, PreferredDate, PreferredDateId, RequestId, RequestStatus,
    ShiftId, ShiftRecord, SwapRequest, UserId,
};
use crate::error::ShiftFlexError;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, String>,
    shifts: HashMap<ShiftId, ShiftRecord>,
    requests: HashMap<RequestId, SwapRequest>,
    preferred: HashMap<RequestId, Vec<PreferredDate>>,
    matches: HashMap<MatchId, PotentialMatch>,
}

impl Tables {
    fn active_match_for(&self, request_id: RequestId) -> Option<&PotentialMatch> {
        self.matches
            .values()
            .find(|m| m.status.is_active() && m.involves(request_id))
    }

    fn match_mut(&mut self, id: MatchId) -> Result<&mut PotentialMatch, ShiftFlexError> {
        self.matches
            .get_mut(&id)
            .ok_or_else(|| ShiftFlexError::not_found("match", id))
    }

    fn set_request_status(&mut self, ids: [RequestId; 2], from: &[RequestStatus], to: RequestStatus) {
        for id in ids {
            if let Some(req) = self.requests.get_mut(&id)
                && from.contains(&req.status)
            {
                req.status = to;
            }
        }
    }
}

/// Hash-map backed store. Cheap to construct; used by tests and by
/// `STORE_BACKEND=memory`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

}

#[async_trait]
impl SwapStore for MemoryStore {
    async fn user_email(&self, user_id: UserId) -> Result<Option<String>, ShiftFlexError> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn upsert_user_email(&self, user_id: UserId, email: &str) -> Result<(), ShiftFlexError> {
        self.tables
            .write()
            .await
            .users
            .insert(user_id, email.to_string());
        Ok(())
    }

    async fn insert_shifts(&self, shifts: &[ShiftRecord]) -> Result<(), ShiftFlexError> {
        let mut tables = self.tables.write().await;
        if let Some(dup) = shifts.iter().find(|s| tables.shifts.contains_key(&s.id)) {
            return Err(ShiftFlexError::Conflict(format!("shift {} already exists", dup.id)));
        }
        for shift in shifts {
            tables.shifts.insert(shift.id, shift.clone());
        }
        Ok(())
    }

    async fn get_shift(&self, id: ShiftId) -> Result<Option<ShiftRecord>, ShiftFlexError> {
        Ok(self.tables.read().await.shifts.get(&id).cloned())
    }

    async fn shifts_by_ids(&self, ids: &[ShiftId]) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.shifts.get(id).cloned()).collect())
    }

    async fn shifts_for_owner(&self, owner: UserId) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let tables = self.tables.read().await;
        let mut shifts: Vec<ShiftRecord> = tables
            .shifts
            .values()
            .filter(|s| s.owner_user_id == owner)
            .cloned()
            .collect();
        shifts.sort_by_key(ShiftRecord::starts_at);
        Ok(shifts)
    }

    async fn insert_request(
        &self,
        request: &SwapRequest,
        dates: &[PreferredDate],
    ) -> Result<(), ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let busy = tables.requests.values().any(|r| {
            r.requester_shift_id == request.requester_shift_id
                && (r.is_pending()
                    || (r.status == RequestStatus::Matched
                        && tables.active_match_for(r.id).is_some()))
        });
        if busy {
            return Err(ShiftFlexError::Conflict(format!(
                "shift {} is already offered in a pending request or an active match",
                request.requester_shift_id
            )));
        }
        tables.requests.insert(request.id, request.clone());
        tables.preferred.insert(request.id, dates.to_vec());
        Ok(())
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<SwapRequest>, ShiftFlexError> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn list_requests(
        &self,
        filter: RequestFilter,
    ) -> Result<Vec<SwapRequest>, ShiftFlexError> {
        let tables = self.tables.read().await;
        let mut out: Vec<SwapRequest> = tables
            .requests
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.created_at, r.id));
        Ok(out)
    }

    async fn update_request_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let req = tables
            .requests
            .get_mut(&id)
            .ok_or_else(|| ShiftFlexError::not_found("swap request", id))?;
        if req.status != from {
            return Ok(false);
        }
        req.status = to;
        Ok(true)
    }

    async fn preferred_dates_for(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PreferredDate>, ShiftFlexError> {
        let tables = self.tables.read().await;
        Ok(request_ids
            .iter()
            .filter_map(|id| tables.preferred.get(id))
            .flatten()
            .cloned()
            .collect())
    }

    async fn delete_preferred_date(
        &self,
        request_id: RequestId,
        date_id: PreferredDateId,
    ) -> Result<PreferredDateRemoval, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let dates = tables
            .preferred
            .get_mut(&request_id)
            .ok_or_else(|| ShiftFlexError::not_found("swap request", request_id))?;
        let before = dates.len();
        dates.retain(|d| d.id != date_id);
        if dates.len() == before {
            return Err(ShiftFlexError::not_found("preferred date", date_id));
        }
        let remaining = dates.len();
        if remaining == 0 {
            tables.preferred.remove(&request_id);
            tables.requests.remove(&request_id);
            tables.matches.retain(|_, m| !m.involves(request_id));
            return Ok(PreferredDateRemoval::RequestDeleted);
        }
        Ok(PreferredDateRemoval::Removed { remaining })
    }

    async fn insert_match(&self, candidate: &PotentialMatch) -> Result<MatchInsert, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        for request_id in [candidate.requester_request_id, candidate.acceptor_request_id] {
            let request = tables
                .requests
                .get(&request_id)
                .ok_or_else(|| ShiftFlexError::not_found("swap request", request_id))?;
            if !request.is_pending() {
                return Ok(MatchInsert::RequestNotPending {
                    request_id,
                    status: request.status,
                });
            }
        }
        let key = candidate.pair_key();
        for request_id in [candidate.requester_request_id, candidate.acceptor_request_id] {
            if let Some(active) = tables.active_match_for(request_id) {
                if active.pair_key() == key {
                    return Ok(MatchInsert::ExistingPair(active.clone()));
                }
                return Ok(MatchInsert::RequestBusy {
                    request_id,
                    match_id: active.id,
                });
            }
        }
        tables.matches.insert(candidate.id, candidate.clone());
        Ok(MatchInsert::Inserted(candidate.clone()))
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<PotentialMatch>, ShiftFlexError> {
        Ok(self.tables.read().await.matches.get(&id).cloned())
    }

    async fn matches_for_requests(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PotentialMatch>, ShiftFlexError> {
        let tables = self.tables.read().await;
        let mut out: Vec<PotentialMatch> = tables
            .matches
            .values()
            .filter(|m| request_ids.iter().any(|id| m.involves(*id)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    async fn accept_match(&self, id: MatchId) -> Result<Transition, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let m = tables.match_mut(id)?;
        if m.status != MatchStatus::Pending {
            return Ok(Transition::Rejected(m.clone()));
        }
        m.status = MatchStatus::Accepted;
        let updated = m.clone();
        tables.set_request_status(
            [updated.requester_request_id, updated.acceptor_request_id],
            &[RequestStatus::Pending],
            RequestStatus::Matched,
        );
        Ok(Transition::Applied(updated))
    }

    async fn complete_swap(&self, plan: &SwapPlan) -> Result<Transition, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let current = tables.match_mut(plan.match_id)?.clone();
        if current.status != MatchStatus::Accepted {
            return Ok(Transition::Rejected(current));
        }

        let owner_of = |id: ShiftId| tables.shifts.get(&id).map(|s| s.owner_user_id);
        if owner_of(plan.requester_shift_id) != Some(plan.requester_user_id)
            || owner_of(plan.acceptor_shift_id) != Some(plan.acceptor_user_id)
        {
            return Err(ShiftFlexError::Conflict(format!(
                "shift ownership changed before match {} could be finalized",
                plan.match_id
            )));
        }

        if let Some(s) = tables.shifts.get_mut(&plan.requester_shift_id) {
            s.owner_user_id = plan.acceptor_user_id;
        }
        if let Some(s) = tables.shifts.get_mut(&plan.acceptor_shift_id) {
            s.owner_user_id = plan.requester_user_id;
        }
        tables.set_request_status(
            [plan.requester_request_id, plan.acceptor_request_id],
            &[RequestStatus::Matched, RequestStatus::Pending],
            RequestStatus::Completed,
        );
        let m = tables.match_mut(plan.match_id)?;
        m.status = MatchStatus::Completed;
        Ok(Transition::Applied(m.clone()))
    }

    async fn cancel_match(
        &self,
        id: MatchId,
        revert_requests: bool,
    ) -> Result<Transition, ShiftFlexError> {
        let mut tables = self.tables.write().await;
        let m = tables.match_mut(id)?;
        if !m.status.can_transition_to(MatchStatus::Cancelled) {
            return Ok(Transition::Rejected(m.clone()));
        }
        m.status = MatchStatus::Cancelled;
        let updated = m.clone();
        if revert_requests {
            tables.set_request_status(
                [updated.requester_request_id, updated.acceptor_request_id],
                &[RequestStatus::Matched],
                RequestStatus::Pending,
            );
        }
        Ok(Transition::Applied(updated))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn shift(owner: UserId, day: u32) -> ShiftRecord {
        let (Some(date), Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(2025, 6, day),
            NaiveTime::from_hms_opt(8, 0, 0),
            NaiveTime::from_hms_opt(16, 0, 0),
        ) else {
            panic!("valid fixture");
        };
        ShiftRecord {
            id: ShiftId::new(),
            date,
            start_time: start,
            end_time: end,
            truck_name: None,
            colleague_type: None,
            owner_user_id: owner,
        }
    }

    async fn offer(store: &MemoryStore, owner: UserId, day: u32) -> (ShiftRecord, SwapRequest) {
        let s = shift(owner, day);
        let Ok(()) = store.insert_shifts(std::slice::from_ref(&s)).await else {
            panic!("insert shift");
        };
        let req = SwapRequest::new(owner, s.id);
        let pd = PreferredDate::new(req.id, s.date, None, BTreeSet::new());
        let Ok(()) = store.insert_request(&req, &[pd]).await else {
            panic!("insert request");
        };
        (s, req)
    }

    #[tokio::test]
    async fn second_pending_request_for_same_shift_conflicts() {
        let store = MemoryStore::new();
        let (s, _) = offer(&store, UserId::new(), 1).await;
        let again = SwapRequest::new(s.owner_user_id, s.id);
        let result = store.insert_request(&again, &[]).await;
        assert!(matches!(result, Err(ShiftFlexError::Conflict(_))));
    }

    #[tokio::test]
    async fn insert_match_enforces_exclusivity() {
        let store = MemoryStore::new();
        let (sa, a) = offer(&store, UserId::new(), 1).await;
        let (sb, b) = offer(&store, UserId::new(), 2).await;
        let (sc, c) = offer(&store, UserId::new(), 3).await;

        let ab = PotentialMatch::new(a.id, b.id, sa.id, sb.id);
        let Ok(MatchInsert::Inserted(_)) = store.insert_match(&ab).await else {
            panic!("first insert should succeed");
        };

        let ba = PotentialMatch::new(b.id, a.id, sb.id, sa.id);
        let Ok(MatchInsert::ExistingPair(existing)) = store.insert_match(&ba).await else {
            panic!("same pair should be reported as existing");
        };
        assert_eq!(existing.id, ab.id);

        let ac = PotentialMatch::new(a.id, c.id, sa.id, sc.id);
        let Ok(MatchInsert::RequestBusy { request_id, match_id }) = store.insert_match(&ac).await
        else {
            panic!("busy request should be refused");
        };
        assert_eq!(request_id, a.id);
        assert_eq!(match_id, ab.id);
    }

    #[tokio::test]
    async fn cancelled_match_frees_requests() {
        let store = MemoryStore::new();
        let (sa, a) = offer(&store, UserId::new(), 1).await;
        let (sb, b) = offer(&store, UserId::new(), 2).await;
        let (sc, c) = offer(&store, UserId::new(), 3).await;

        let ab = PotentialMatch::new(a.id, b.id, sa.id, sb.id);
        let _ = store.insert_match(&ab).await;
        let Ok(Transition::Applied(_)) = store.cancel_match(ab.id, false).await else {
            panic!("cancel should apply");
        };

        let ac = PotentialMatch::new(a.id, c.id, sa.id, sc.id);
        let Ok(MatchInsert::Inserted(_)) = store.insert_match(&ac).await else {
            panic!("request should be free again");
        };
    }

    #[tokio::test]
    async fn complete_swap_refuses_stale_ownership() {
        let store = MemoryStore::new();
        let ua = UserId::new();
        let ub = UserId::new();
        let (sa, a) = offer(&store, ua, 1).await;
        let (sb, b) = offer(&store, ub, 2).await;
        let m = PotentialMatch::new(a.id, b.id, sa.id, sb.id);
        let _ = store.insert_match(&m).await;
        let _ = store.accept_match(m.id).await;

        let plan = SwapPlan {
            match_id: m.id,
            requester_request_id: a.id,
            acceptor_request_id: b.id,
            requester_shift_id: sa.id,
            acceptor_shift_id: sb.id,
            requester_user_id: ua,
            acceptor_user_id: UserId::new(),
        };
        let result = store.complete_swap(&plan).await;
        assert!(matches!(result, Err(ShiftFlexError::Conflict(_))));

        let Ok(Some(still)) = store.get_shift(sa.id).await else {
            panic!("shift exists");
        };
        assert_eq!(still.owner_user_id, ua);
        let Ok(Some(m)) = store.get_match(m.id).await else {
            panic!("match exists");
        };
        assert_eq!(m.status, MatchStatus::Accepted);
    }

    #[tokio::test]
    async fn deleting_last_preferred_date_deletes_request() {
        let store = MemoryStore::new();
        let (_, req) = offer(&store, UserId::new(), 1).await;
        let Ok(dates) = store.preferred_dates_for(&[req.id]).await else {
            panic!("dates");
        };
        let Some(only) = dates.first() else {
            panic!("one date");
        };
        let removal = store.delete_preferred_date(req.id, only.id).await;
        assert!(matches!(removal, Ok(PreferredDateRemoval::RequestDeleted)));
        assert!(matches!(store.get_request(req.id).await, Ok(None)));
    }

    #[tokio::test]
    async fn deleted_request_takes_its_matches_along() {
        let store = MemoryStore::new();
        let (sa, a) = offer(&store, UserId::new(), 1).await;
        let (sb, b) = offer(&store, UserId::new(), 2).await;
        let m = PotentialMatch::new(a.id, b.id, sa.id, sb.id);
        let Ok(MatchInsert::Inserted(_)) = store.insert_match(&m).await else {
            panic!("insert match");
        };
        let Ok(Transition::Applied(_)) = store.cancel_match(m.id, false).await else {
            panic!("cancel should apply");
        };

        let Ok(dates) = store.preferred_dates_for(&[a.id]).await else {
            panic!("dates");
        };
        let Some(only) = dates.first() else {
            panic!("one date");
        };
        let removal = store.delete_preferred_date(a.id, only.id).await;
        assert!(matches!(removal, Ok(PreferredDateRemoval::RequestDeleted)));

        assert!(matches!(store.get_match(m.id).await, Ok(None)));
        let Ok(left) = store.matches_for_requests(&[a.id, b.id]).await else {
            panic!("list matches");
        };
        assert!(left.is_empty());
    }

    #[tokio::test]
    async fn shift_in_active_match_cannot_be_offered_again() {
        let store = MemoryStore::new();
        let (sa, a) = offer(&store, UserId::new(), 1).await;
        let (sb, b) = offer(&store, UserId::new(), 2).await;
        let m = PotentialMatch::new(a.id, b.id, sa.id, sb.id);
        let _ = store.insert_match(&m).await;
        let Ok(Transition::Applied(_)) = store.accept_match(m.id).await else {
            panic!("accept should apply");
        };

        let again = SwapRequest::new(sa.owner_user_id, sa.id);
        let result = store.insert_request(&again, &[]).await;
        assert!(matches!(result, Err(ShiftFlexError::Conflict(_))));

        let Ok(Transition::Applied(_)) = store.cancel_match(m.id, false).await else {
            panic!("cancel should apply");
        };
        let Ok(()) = store.insert_request(&again, &[]).await else {
            panic!("shift is free once the match is cancelled");
        };
    }
}
