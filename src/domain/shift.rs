//! Shift records and the derived shift type.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{ShiftId, UserId};

/// Last start hour (inclusive) that still counts as a day shift.
pub const DAY_SHIFT_LAST_HOUR: u32 = 8;

/// First start hour (inclusive) that counts as a night shift.
pub const NIGHT_SHIFT_FIRST_HOUR: u32 = 16;

/// Shift category derived from the start hour. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ShiftType {
    /// Starts at or before 08:59.
    Day,
    /// Starts between 09:00 and 15:59.
    Afternoon,
    /// Starts at 16:00 or later.
    Night,
}

impl ShiftType {
    /// All shift types in display order.
    pub const ALL: [Self; 3] = [Self::Day, Self::Afternoon, Self::Night];

    /// Derives the shift type from a start time.
    ///
    /// Only the hour is considered: hour <= 8 is `day`, 8 < hour < 16 is
    /// `afternoon`, hour >= 16 is `night`.
    #[must_use]
    pub fn from_start_time(start: NaiveTime) -> Self {
        let hour = start.hour();
        if hour <= DAY_SHIFT_LAST_HOUR {
            Self::Day
        } else if hour < NIGHT_SHIFT_FIRST_HOUR {
            Self::Afternoon
        } else {
            Self::Night
        }
    }

    /// Returns the wire name of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Afternoon => "afternoon",
            Self::Night => "night",
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "afternoon" => Ok(Self::Afternoon),
            "night" => Ok(Self::Night),
            other => Err(format!("unknown shift type: {other}")),
        }
    }
}

/// A dated work assignment owned by exactly one user.
///
/// `owner_user_id` is the only mutable field in the swap flow; it is
/// exchanged between two shifts when a match is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShiftRecord {
    /// Shift identifier.
    pub id: ShiftId,
    /// Calendar date the shift starts on.
    pub date: NaiveDate,
    /// Local start time.
    pub start_time: NaiveTime,
    /// Local end time. Ends on the next day when not after `start_time`.
    pub end_time: NaiveTime,
    /// Truck or vehicle assigned to the shift.
    pub truck_name: Option<String>,
    /// Colleague type required for the shift.
    pub colleague_type: Option<String>,
    /// Current owner.
    pub owner_user_id: UserId,
}

impl ShiftRecord {
    /// Returns the derived [`ShiftType`].
    #[must_use]
    pub fn shift_type(&self) -> ShiftType {
        ShiftType::from_start_time(self.start_time)
    }

    /// Start of the shift as a local date-time.
    #[must_use]
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// End of the shift as a local date-time, rolling over midnight when
    /// `end_time <= start_time`.
    #[must_use]
    pub fn ends_at(&self) -> NaiveDateTime {
        let end = self.date.and_time(self.end_time);
        if self.end_time <= self.start_time {
            end + TimeDelta::days(1)
        } else {
            end
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        let Some(t) = NaiveTime::from_hms_opt(hour, minute, 0) else {
            panic!("valid time");
        };
        t
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(d) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        d
    }

    #[test]
    fn boundary_hours() {
        assert_eq!(ShiftType::from_start_time(at(8, 0)), ShiftType::Day);
        assert_eq!(ShiftType::from_start_time(at(8, 59)), ShiftType::Day);
        assert_eq!(ShiftType::from_start_time(at(9, 0)), ShiftType::Afternoon);
        assert_eq!(ShiftType::from_start_time(at(15, 59)), ShiftType::Afternoon);
        assert_eq!(ShiftType::from_start_time(at(16, 0)), ShiftType::Night);
    }

    #[test]
    fn early_and_late_hours() {
        assert_eq!(ShiftType::from_start_time(at(0, 0)), ShiftType::Day);
        assert_eq!(ShiftType::from_start_time(at(23, 30)), ShiftType::Night);
    }

    #[test]
    fn derivation_is_deterministic() {
        for hour in 0..24 {
            let t = at(hour, 15);
            assert_eq!(ShiftType::from_start_time(t), ShiftType::from_start_time(t));
        }
    }

    #[test]
    fn parses_wire_names() {
        for ty in ShiftType::ALL {
            assert_eq!(ty.as_str().parse::<ShiftType>(), Ok(ty));
        }
        assert!("evening".parse::<ShiftType>().is_err());
    }

    #[test]
    fn overnight_shift_ends_next_day() {
        let shift = ShiftRecord {
            id: ShiftId::new(),
            date: date(2025, 6, 10),
            start_time: at(16, 0),
            end_time: at(0, 0),
            truck_name: None,
            colleague_type: None,
            owner_user_id: UserId::new(),
        };
        assert_eq!(shift.shift_type(), ShiftType::Night);
        assert_eq!(shift.ends_at(), date(2025, 6, 11).and_time(at(0, 0)));
    }

    #[test]
    fn same_day_shift_ends_same_day() {
        let shift = ShiftRecord {
            id: ShiftId::new(),
            date: date(2025, 6, 1),
            start_time: at(8, 0),
            end_time: at(16, 0),
            truck_name: Some("T-12".to_string()),
            colleague_type: None,
            owner_user_id: UserId::new(),
        };
        assert_eq!(shift.ends_at(), date(2025, 6, 1).and_time(at(16, 0)));
    }
}
