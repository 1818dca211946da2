//! Shift DTOs.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{ShiftId, ShiftRecord, ShiftType, UserId};
use crate::service::ShiftTemplate;

/// Request body for `POST /shifts`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateShiftRequest {
    /// Shift date.
    pub date: NaiveDate,
    /// Start time (`HH:MM:SS`).
    pub start_time: NaiveTime,
    /// End time; at or before the start means the next day.
    pub end_time: NaiveTime,
    /// Vehicle assignment.
    #[serde(default)]
    pub truck_name: Option<String>,
    /// Colleague category.
    #[serde(default)]
    pub colleague_type: Option<String>,
}

impl From<CreateShiftRequest> for ShiftTemplate {
    fn from(req: CreateShiftRequest) -> Self {
        Self {
            date: req.date,
            start_time: req.start_time,
            end_time: req.end_time,
            truck_name: req.truck_name,
            colleague_type: req.colleague_type,
        }
    }
}

/// Request body for `POST /shifts/repeat`: a 4-on/4-off rotation.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RepeatShiftRequest {
    /// First working day of the rotation.
    pub start_date: NaiveDate,
    /// Last date considered (inclusive).
    pub until: NaiveDate,
    /// Start time of every shift.
    pub start_time: NaiveTime,
    /// End time of every shift.
    pub end_time: NaiveTime,
    /// Vehicle assignment.
    #[serde(default)]
    pub truck_name: Option<String>,
    /// Colleague category.
    #[serde(default)]
    pub colleague_type: Option<String>,
}

impl RepeatShiftRequest {
    /// Splits into the template and the end date.
    #[must_use]
    pub fn into_parts(self) -> (ShiftTemplate, NaiveDate) {
        (
            ShiftTemplate {
                date: self.start_date,
                start_time: self.start_time,
                end_time: self.end_time,
                truck_name: self.truck_name,
                colleague_type: self.colleague_type,
            },
            self.until,
        )
    }
}

/// A shift with its derived type.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShiftDto {
    /// Shift identifier.
    pub id: ShiftId,
    /// Shift date.
    pub date: NaiveDate,
    /// Start time.
    pub start_time: NaiveTime,
    /// End time.
    pub end_time: NaiveTime,
    /// Derived from the start hour.
    pub shift_type: ShiftType,
    /// Vehicle assignment.
    pub truck_name: Option<String>,
    /// Colleague category.
    pub colleague_type: Option<String>,
    /// Current owner.
    pub owner_user_id: UserId,
}

impl From<ShiftRecord> for ShiftDto {
    fn from(shift: ShiftRecord) -> Self {
        Self {
            shift_type: shift.shift_type(),
            id: shift.id,
            date: shift.date,
            start_time: shift.start_time,
            end_time: shift.end_time,
            truck_name: shift.truck_name,
            colleague_type: shift.colleague_type,
            owner_user_id: shift.owner_user_id,
        }
    }
}
