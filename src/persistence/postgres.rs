//! PostgreSQL implementation of [`SwapStore`] using `sqlx::PgPool`.
//!
//! Multi-row operations run in one transaction and lock the rows they
//! inspect (`SELECT ... FOR UPDATE`) before deciding, so concurrent callers
//! serialize on the affected requests or match instead of racing past a
//! read-then-write check.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{
    PotentialMatchRow, PreferredDateRow, ShiftRow, SwapRequestRow, encode_types,
};
use super::{MatchInsert, PreferredDateRemoval, RequestFilter, SwapPlan, SwapStore, Transition};
use crate::config::ShiftFlexConfig;
use crate::domain::{
    MatchId, MatchStatus, PotentialMatch, PreferredDate, PreferredDateId, RequestId, RequestStatus,
    ShiftId, ShiftRecord, SwapRequest, UserId,
};
use crate::error::ShiftFlexError;

const MATCH_SELECT: &str = "SELECT id, requester_request_id, acceptor_request_id, \
     requester_shift_id, acceptor_shift_id, status, match_date, created_at \
     FROM potential_matches";

const SHIFT_SELECT: &str =
    "SELECT id, shift_date, start_time, end_time, truck_name, colleague_type, user_id FROM shifts";

const REQUEST_SELECT: &str =
    "SELECT id, requester_id, requester_shift_id, status, created_at FROM swap_requests";

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool from configuration and, if enabled, applies
    /// the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns [`ShiftFlexError::Dependency`] if the database is
    /// unreachable or a migration fails.
    pub async fn connect(config: &ShiftFlexConfig) -> Result<Self, ShiftFlexError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;

        if config.database_run_migrations {
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| ShiftFlexError::Dependency(format!("migration failed: {e}")))?;
            tracing::info!("database migrations applied");
        }

        Ok(Self::new(pool))
    }

    async fn lock_match(
        tx: &mut Transaction<'_, Postgres>,
        id: MatchId,
    ) -> Result<PotentialMatch, ShiftFlexError> {
        let sql = format!("{MATCH_SELECT} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PotentialMatchRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("match", id))?;
        PotentialMatch::try_from(row)
    }

    async fn set_match_status(
        tx: &mut Transaction<'_, Postgres>,
        id: MatchId,
        status: MatchStatus,
    ) -> Result<(), ShiftFlexError> {
        sqlx::query("UPDATE potential_matches SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(Uuid::from(id))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn set_requests_status(
        tx: &mut Transaction<'_, Postgres>,
        ids: [RequestId; 2],
        from: &[RequestStatus],
        to: RequestStatus,
    ) -> Result<u64, ShiftFlexError> {
        let ids: Vec<Uuid> = ids.into_iter().map(Uuid::from).collect();
        let from: Vec<&str> = from.iter().map(RequestStatus::as_str).collect();
        let result = sqlx::query(
            "UPDATE swap_requests SET status = $1 WHERE id = ANY($2) AND status = ANY($3)",
        )
        .bind(to.as_str())
        .bind(ids)
        .bind(from)
        .execute(&mut **tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn move_shift(
        tx: &mut Transaction<'_, Postgres>,
        shift_id: ShiftId,
        from: UserId,
        to: UserId,
    ) -> Result<bool, ShiftFlexError> {
        let result = sqlx::query("UPDATE shifts SET user_id = $1 WHERE id = $2 AND user_id = $3")
            .bind(Uuid::from(to))
            .bind(Uuid::from(shift_id))
            .bind(Uuid::from(from))
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

fn uuids<T: Copy + Into<Uuid>>(ids: &[T]) -> Vec<Uuid> {
    ids.iter().map(|id| (*id).into()).collect()
}

#[async_trait]
impl SwapStore for PostgresStore {
    async fn user_email(&self, user_id: UserId) -> Result<Option<String>, ShiftFlexError> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM profiles WHERE id = $1")
            .bind(Uuid::from(user_id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(email)
    }

    async fn upsert_user_email(&self, user_id: UserId, email: &str) -> Result<(), ShiftFlexError> {
        sqlx::query(
            "INSERT INTO profiles (id, email) VALUES ($1, $2) \
             ON CONFLICT (id) DO UPDATE SET email = EXCLUDED.email \
             WHERE profiles.email IS DISTINCT FROM EXCLUDED.email",
        )
        .bind(Uuid::from(user_id))
        .bind(email)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_shifts(&self, shifts: &[ShiftRecord]) -> Result<(), ShiftFlexError> {
        let mut tx = self.pool.begin().await?;
        for shift in shifts {
            sqlx::query(
                "INSERT INTO shifts (id, shift_date, start_time, end_time, truck_name, \
                 colleague_type, user_id) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(Uuid::from(shift.id))
            .bind(shift.date)
            .bind(shift.start_time)
            .bind(shift.end_time)
            .bind(shift.truck_name.as_deref())
            .bind(shift.colleague_type.as_deref())
            .bind(Uuid::from(shift.owner_user_id))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_shift(&self, id: ShiftId) -> Result<Option<ShiftRecord>, ShiftFlexError> {
        let sql = format!("{SHIFT_SELECT} WHERE id = $1");
        let row = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ShiftRecord::from))
    }

    async fn shifts_by_ids(&self, ids: &[ShiftId]) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let sql = format!("{SHIFT_SELECT} WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(uuids(ids))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShiftRecord::from).collect())
    }

    async fn shifts_for_owner(&self, owner: UserId) -> Result<Vec<ShiftRecord>, ShiftFlexError> {
        let sql = format!("{SHIFT_SELECT} WHERE user_id = $1 ORDER BY shift_date, start_time");
        let rows = sqlx::query_as::<_, ShiftRow>(&sql)
            .bind(Uuid::from(owner))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(ShiftRecord::from).collect())
    }

    async fn insert_request(
        &self,
        request: &SwapRequest,
        dates: &[PreferredDate],
    ) -> Result<(), ShiftFlexError> {
        let mut tx = self.pool.begin().await?;

        // The shift row serializes concurrent offers of the same shift.
        sqlx::query("SELECT id FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(Uuid::from(request.requester_shift_id))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ShiftFlexError::not_found("shift", request.requester_shift_id))?;
        let sql = format!("{REQUEST_SELECT} WHERE requester_shift_id = $1 FOR UPDATE");
        let earlier = sqlx::query_as::<_, SwapRequestRow>(&sql)
            .bind(Uuid::from(request.requester_shift_id))
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(SwapRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let matched: Vec<RequestId> = earlier
            .iter()
            .filter(|r| r.status == RequestStatus::Matched)
            .map(|r| r.id)
            .collect();
        let mut busy = earlier.iter().any(SwapRequest::is_pending);
        if !busy && !matched.is_empty() {
            busy = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM potential_matches \
                 WHERE status IN ('pending', 'accepted') \
                 AND (requester_request_id = ANY($1) OR acceptor_request_id = ANY($1)))",
            )
            .bind(uuids(&matched))
            .fetch_one(&mut *tx)
            .await?;
        }
        if busy {
            return Err(ShiftFlexError::Conflict(format!(
                "shift {} is already offered in a pending request or an active match",
                request.requester_shift_id
            )));
        }

        sqlx::query(
            "INSERT INTO swap_requests (id, requester_id, requester_shift_id, status, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::from(request.id))
        .bind(Uuid::from(request.requester_id))
        .bind(Uuid::from(request.requester_shift_id))
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&mut *tx)
        .await?;

        for date in dates {
            sqlx::query(
                "INSERT INTO preferred_dates (id, request_id, shift_id, preferred_date, \
                 accepted_types) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::from(date.id))
            .bind(Uuid::from(date.request_id))
            .bind(date.shift_id.map(Uuid::from))
            .bind(date.date)
            .bind(encode_types(&date.accepted_types))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<SwapRequest>, ShiftFlexError> {
        let sql = format!("{REQUEST_SELECT} WHERE id = $1");
        sqlx::query_as::<_, SwapRequestRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?
            .map(SwapRequest::try_from)
            .transpose()
    }

    async fn list_requests(
        &self,
        filter: RequestFilter,
    ) -> Result<Vec<SwapRequest>, ShiftFlexError> {
        let sql = format!(
            "{REQUEST_SELECT} WHERE ($1::uuid IS NULL OR requester_id = $1) \
             AND ($2::text IS NULL OR status = $2) \
             AND ($3::uuid IS NULL OR requester_shift_id = $3) \
             ORDER BY created_at, id"
        );
        sqlx::query_as::<_, SwapRequestRow>(&sql)
            .bind(filter.requester_id.map(Uuid::from))
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.shift_id.map(Uuid::from))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(SwapRequest::try_from)
            .collect()
    }

    async fn update_request_status(
        &self,
        id: RequestId,
        from: RequestStatus,
        to: RequestStatus,
    ) -> Result<bool, ShiftFlexError> {
        let result = sqlx::query("UPDATE swap_requests SET status = $1 WHERE id = $2 AND status = $3")
            .bind(to.as_str())
            .bind(Uuid::from(id))
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.get_request(id).await? {
            Some(_) => Ok(false),
            None => Err(ShiftFlexError::not_found("swap request", id)),
        }
    }

    async fn preferred_dates_for(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PreferredDate>, ShiftFlexError> {
        sqlx::query_as::<_, PreferredDateRow>(
            "SELECT id, request_id, shift_id, preferred_date, accepted_types \
             FROM preferred_dates WHERE request_id = ANY($1) ORDER BY preferred_date",
        )
        .bind(uuids(request_ids))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PreferredDate::try_from)
        .collect()
    }

    async fn delete_preferred_date(
        &self,
        request_id: RequestId,
        date_id: PreferredDateId,
    ) -> Result<PreferredDateRemoval, ShiftFlexError> {
        let mut tx = self.pool.begin().await?;
        let locked = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM swap_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(Uuid::from(request_id))
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(ShiftFlexError::not_found("swap request", request_id));
        }

        let deleted = sqlx::query("DELETE FROM preferred_dates WHERE id = $1 AND request_id = $2")
            .bind(Uuid::from(date_id))
            .bind(Uuid::from(request_id))
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(ShiftFlexError::not_found("preferred date", date_id));
        }

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM preferred_dates WHERE request_id = $1",
        )
        .bind(Uuid::from(request_id))
        .fetch_one(&mut *tx)
        .await?;

        let outcome = if remaining == 0 {
            sqlx::query("DELETE FROM swap_requests WHERE id = $1")
                .bind(Uuid::from(request_id))
                .execute(&mut *tx)
                .await?;
            PreferredDateRemoval::RequestDeleted
        } else {
            PreferredDateRemoval::Removed {
                remaining: usize::try_from(remaining).unwrap_or(usize::MAX),
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert_match(&self, candidate: &PotentialMatch) -> Result<MatchInsert, ShiftFlexError> {
        let pair = [candidate.requester_request_id, candidate.acceptor_request_id];
        let mut tx = self.pool.begin().await?;

        // Ordered locking keeps two sweeps over the same pair from deadlocking.
        let sql = format!("{REQUEST_SELECT} WHERE id = ANY($1) ORDER BY id FOR UPDATE");
        let locked = sqlx::query_as::<_, SwapRequestRow>(&sql)
            .bind(uuids(&pair))
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(SwapRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        for request_id in pair {
            let request = locked
                .iter()
                .find(|r| r.id == request_id)
                .ok_or_else(|| ShiftFlexError::not_found("swap request", request_id))?;
            if !request.is_pending() {
                return Ok(MatchInsert::RequestNotPending {
                    request_id,
                    status: request.status,
                });
            }
        }

        let sql = format!(
            "{MATCH_SELECT} WHERE status IN ('pending', 'accepted') \
             AND (requester_request_id = ANY($1) OR acceptor_request_id = ANY($1))"
        );
        let active = sqlx::query_as::<_, PotentialMatchRow>(&sql)
            .bind(uuids(&pair))
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(PotentialMatch::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let key = candidate.pair_key();
        if let Some(existing) = active.iter().find(|m| m.pair_key() == key) {
            return Ok(MatchInsert::ExistingPair(existing.clone()));
        }
        if let Some(existing) = active.first() {
            let busy = if existing.involves(candidate.requester_request_id) {
                candidate.requester_request_id
            } else {
                candidate.acceptor_request_id
            };
            return Ok(MatchInsert::RequestBusy {
                request_id: busy,
                match_id: existing.id,
            });
        }

        sqlx::query(
            "INSERT INTO potential_matches (id, requester_request_id, acceptor_request_id, \
             requester_shift_id, acceptor_shift_id, status, match_date, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::from(candidate.id))
        .bind(Uuid::from(candidate.requester_request_id))
        .bind(Uuid::from(candidate.acceptor_request_id))
        .bind(Uuid::from(candidate.requester_shift_id))
        .bind(Uuid::from(candidate.acceptor_shift_id))
        .bind(candidate.status.as_str())
        .bind(candidate.match_date)
        .bind(candidate.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(MatchInsert::Inserted(candidate.clone()))
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<PotentialMatch>, ShiftFlexError> {
        let sql = format!("{MATCH_SELECT} WHERE id = $1");
        sqlx::query_as::<_, PotentialMatchRow>(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await?
            .map(PotentialMatch::try_from)
            .transpose()
    }

    async fn matches_for_requests(
        &self,
        request_ids: &[RequestId],
    ) -> Result<Vec<PotentialMatch>, ShiftFlexError> {
        let sql = format!(
            "{MATCH_SELECT} WHERE requester_request_id = ANY($1) OR acceptor_request_id = ANY($1) \
             ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, PotentialMatchRow>(&sql)
            .bind(uuids(request_ids))
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(PotentialMatch::try_from)
            .collect()
    }

    async fn accept_match(&self, id: MatchId) -> Result<Transition, ShiftFlexError> {
        let mut tx = self.pool.begin().await?;
        let mut current = Self::lock_match(&mut tx, id).await?;
        if current.status != MatchStatus::Pending {
            return Ok(Transition::Rejected(current));
        }

        Self::set_match_status(&mut tx, id, MatchStatus::Accepted).await?;
        Self::set_requests_status(
            &mut tx,
            [current.requester_request_id, current.acceptor_request_id],
            &[RequestStatus::Pending],
            RequestStatus::Matched,
        )
        .await?;
        tx.commit().await?;

        current.status = MatchStatus::Accepted;
        Ok(Transition::Applied(current))
    }

    async fn complete_swap(&self, plan: &SwapPlan) -> Result<Transition, ShiftFlexError> {
        let mut tx = self.pool.begin().await?;
        let mut current = Self::lock_match(&mut tx, plan.match_id).await?;
        if current.status != MatchStatus::Accepted {
            return Ok(Transition::Rejected(current));
        }

        let moved_requester = Self::move_shift(
            &mut tx,
            plan.requester_shift_id,
            plan.requester_user_id,
            plan.acceptor_user_id,
        )
        .await?;
        let moved_acceptor = Self::move_shift(
            &mut tx,
            plan.acceptor_shift_id,
            plan.acceptor_user_id,
            plan.requester_user_id,
        )
        .await?;
        if !(moved_requester && moved_acceptor) {
            // Dropping `tx` rolls back whichever update did apply.
            return Err(ShiftFlexError::Conflict(format!(
                "shift ownership changed before match {} could be finalized",
                plan.match_id
            )));
        }

        Self::set_requests_status(
            &mut tx,
            [plan.requester_request_id, plan.acceptor_request_id],
            &[RequestStatus::Matched, RequestStatus::Pending],
            RequestStatus::Completed,
        )
        .await?;
        Self::set_match_status(&mut tx, plan.match_id, MatchStatus::Completed).await?;
        tx.commit().await?;

        current.status = MatchStatus::Completed;
        Ok(Transition::Applied(current))
    }

    async fn cancel_match(
        &self,
        id: MatchId,
        revert_requests: bool,
    ) -> Result<Transition, ShiftFlexError> {
        let mut tx = self.pool.begin().await?;
        let mut current = Self::lock_match(&mut tx, id).await?;
        if !current.status.can_transition_to(MatchStatus::Cancelled) {
            return Ok(Transition::Rejected(current));
        }

        Self::set_match_status(&mut tx, id, MatchStatus::Cancelled).await?;
        if revert_requests {
            Self::set_requests_status(
                &mut tx,
                [current.requester_request_id, current.acceptor_request_id],
                &[RequestStatus::Matched],
                RequestStatus::Pending,
            )
            .await?;
        }
        tx.commit().await?;

        current.status = MatchStatus::Cancelled;
        Ok(Transition::Applied(current))
    }
}
