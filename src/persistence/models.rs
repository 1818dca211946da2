//! Database row types and their conversions into domain records.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use crate::domain::{
    PotentialMatch, PreferredDate, ShiftRecord, ShiftType, SwapRequest,
};
use crate::error::ShiftFlexError;

/// A row from the `shifts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShiftRow {
    /// Primary key.
    pub id: Uuid,
    /// Shift date.
    pub shift_date: NaiveDate,
    /// Start time.
    pub start_time: NaiveTime,
    /// End time.
    pub end_time: NaiveTime,
    /// Assigned truck.
    pub truck_name: Option<String>,
    /// Required colleague type.
    pub colleague_type: Option<String>,
    /// Current owner.
    pub user_id: Uuid,
}

/// A row from the `swap_requests` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SwapRequestRow {
    /// Primary key.
    pub id: Uuid,
    /// Requesting user.
    pub requester_id: Uuid,
    /// Offered shift.
    pub requester_shift_id: Uuid,
    /// Status wire name.
    pub status: String,
    /// Submission timestamp.
    pub created_at: DateTime<Utc>,
}

/// A row from the `preferred_dates` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PreferredDateRow {
    /// Primary key.
    pub id: Uuid,
    /// Owning request.
    pub request_id: Uuid,
    /// Shift on the wanted date, if one was picked.
    pub shift_id: Option<Uuid>,
    /// Wanted date.
    pub preferred_date: NaiveDate,
    /// Accepted shift type wire names.
    pub accepted_types: Vec<String>,
}

/// A row from the `potential_matches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PotentialMatchRow {
    /// Primary key.
    pub id: Uuid,
    /// Requester-side request.
    pub requester_request_id: Uuid,
    /// Acceptor-side request.
    pub acceptor_request_id: Uuid,
    /// Requester-side shift.
    pub requester_shift_id: Uuid,
    /// Acceptor-side shift.
    pub acceptor_shift_id: Uuid,
    /// Status wire name.
    pub status: String,
    /// Discovery date.
    pub match_date: NaiveDate,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

fn corrupt(table: &str, detail: String) -> ShiftFlexError {
    ShiftFlexError::Dependency(format!("corrupt {table} row: {detail}"))
}

impl From<ShiftRow> for ShiftRecord {
    fn from(row: ShiftRow) -> Self {
        Self {
            id: row.id.into(),
            date: row.shift_date,
            start_time: row.start_time,
            end_time: row.end_time,
            truck_name: row.truck_name,
            colleague_type: row.colleague_type,
            owner_user_id: row.user_id.into(),
        }
    }
}

impl TryFrom<SwapRequestRow> for SwapRequest {
    type Error = ShiftFlexError;

    fn try_from(row: SwapRequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            requester_id: row.requester_id.into(),
            requester_shift_id: row.requester_shift_id.into(),
            status: row.status.parse().map_err(|e| corrupt("swap_requests", e))?,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<PreferredDateRow> for PreferredDate {
    type Error = ShiftFlexError;

    fn try_from(row: PreferredDateRow) -> Result<Self, Self::Error> {
        let accepted_types = row
            .accepted_types
            .iter()
            .map(|t| t.parse::<ShiftType>())
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|e| corrupt("preferred_dates", e))?;
        Ok(Self {
            id: row.id.into(),
            request_id: row.request_id.into(),
            shift_id: row.shift_id.map(Into::into),
            date: row.preferred_date,
            accepted_types,
        })
    }
}

impl TryFrom<PotentialMatchRow> for PotentialMatch {
    type Error = ShiftFlexError;

    fn try_from(row: PotentialMatchRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            requester_request_id: row.requester_request_id.into(),
            acceptor_request_id: row.acceptor_request_id.into(),
            requester_shift_id: row.requester_shift_id.into(),
            acceptor_shift_id: row.acceptor_shift_id.into(),
            status: row.status.parse().map_err(|e| corrupt("potential_matches", e))?,
            match_date: row.match_date,
            created_at: row.created_at,
        })
    }
}

/// Encodes a type set for the `accepted_types TEXT[]` column.
#[must_use]
pub fn encode_types(types: &BTreeSet<ShiftType>) -> Vec<String> {
    types.iter().map(|t| t.as_str().to_string()).collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::MatchStatus;

    #[test]
    fn unknown_status_is_reported_as_corrupt() {
        let row = PotentialMatchRow {
            id: Uuid::new_v4(),
            requester_request_id: Uuid::new_v4(),
            acceptor_request_id: Uuid::new_v4(),
            requester_shift_id: Uuid::new_v4(),
            acceptor_shift_id: Uuid::new_v4(),
            status: "rejected".to_string(),
            match_date: Utc::now().date_naive(),
            created_at: Utc::now(),
        };
        let result = PotentialMatch::try_from(row);
        assert!(matches!(result, Err(ShiftFlexError::Dependency(_))));
    }

    #[test]
    fn match_row_converts() {
        let row = PotentialMatchRow {
            id: Uuid::new_v4(),
            requester_request_id: Uuid::new_v4(),
            acceptor_request_id: Uuid::new_v4(),
            requester_shift_id: Uuid::new_v4(),
            acceptor_shift_id: Uuid::new_v4(),
            status: "accepted".to_string(),
            match_date: Utc::now().date_naive(),
            created_at: Utc::now(),
        };
        let Ok(m) = PotentialMatch::try_from(row) else {
            panic!("valid row");
        };
        assert_eq!(m.status, MatchStatus::Accepted);
    }

    #[test]
    fn accepted_types_round_trip_through_text_array() {
        let types = BTreeSet::from([ShiftType::Day, ShiftType::Night]);
        let row = PreferredDateRow {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            shift_id: None,
            preferred_date: Utc::now().date_naive(),
            accepted_types: encode_types(&types),
        };
        let Ok(pd) = PreferredDate::try_from(row) else {
            panic!("valid row");
        };
        assert_eq!(pd.accepted_types, types);
    }
}
