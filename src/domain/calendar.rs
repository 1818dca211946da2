//! Calendar arithmetic: the 10-hour rest rule and 4/4 repeat shifts.

use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ShiftId, ShiftRecord};

/// Minimum rest between two shifts of the same person, in hours.
pub const MIN_REST_HOURS: i64 = 10;

/// Working days per 4/4 cycle.
pub const FOUR_ON: u32 = 4;

/// Days off per 4/4 cycle.
pub const FOUR_OFF: u32 = 4;

/// A pair of shifts that leaves too little rest in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RestViolation {
    /// The shift that would be taken on.
    pub incoming_shift_id: ShiftId,
    /// An already-held shift that collides with it.
    pub conflicting_shift_id: ShiftId,
    /// Rest between the two in minutes. Negative when they overlap.
    pub rest_minutes: i64,
}

/// Rest between two shifts: the gap from whichever ends first to the
/// start of the other. Negative when the shifts overlap.
#[must_use]
pub fn rest_between(a: &ShiftRecord, b: &ShiftRecord) -> TimeDelta {
    if a.starts_at() <= b.starts_at() {
        b.starts_at() - a.ends_at()
    } else {
        a.starts_at() - b.ends_at()
    }
}

/// Checks `incoming` against a person's other shifts and returns every
/// shift closer than [`MIN_REST_HOURS`]. Shifts with the same id as
/// `incoming` are ignored.
#[must_use]
pub fn rest_violations<'a, I>(incoming: &ShiftRecord, held: I) -> Vec<RestViolation>
where
    I: IntoIterator<Item = &'a ShiftRecord>,
{
    let min_rest = TimeDelta::hours(MIN_REST_HOURS);
    held.into_iter()
        .filter(|other| other.id != incoming.id)
        .filter_map(|other| {
            let rest = rest_between(incoming, other);
            (rest < min_rest).then(|| RestViolation {
                incoming_shift_id: incoming.id,
                conflicting_shift_id: other.id,
                rest_minutes: rest.num_minutes(),
            })
        })
        .collect()
}

/// Dates of a 4-on/4-off rotation from `start` to `until`, both inclusive.
///
/// Returns an empty list when `until` is before `start`.
#[must_use]
pub fn four_on_four_off(start: NaiveDate, until: NaiveDate) -> Vec<NaiveDate> {
    let cycle = FOUR_ON + FOUR_OFF;
    start
        .iter_days()
        .take_while(|d| *d <= until)
        .zip((0..cycle).cycle())
        .filter_map(|(date, pos)| (pos < FOUR_ON).then_some(date))
        .collect()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::NaiveTime;

    use super::*;
    use crate::domain::UserId;

    fn date(m: u32, d: u32) -> NaiveDate {
        let Some(d) = NaiveDate::from_ymd_opt(2025, m, d) else {
            panic!("valid date");
        };
        d
    }

    fn shift(day: u32, start: u32, end: u32) -> ShiftRecord {
        let (Some(s), Some(e)) = (
            NaiveTime::from_hms_opt(start, 0, 0),
            NaiveTime::from_hms_opt(end, 0, 0),
        ) else {
            panic!("valid times");
        };
        ShiftRecord {
            id: ShiftId::new(),
            date: date(6, day),
            start_time: s,
            end_time: e,
            truck_name: None,
            colleague_type: None,
            owner_user_id: UserId::new(),
        }
    }

    #[test]
    fn night_then_early_morning_violates() {
        // 16:00-00:00 then 08:00 next day leaves 8 hours.
        let night = shift(10, 16, 0);
        let morning = shift(11, 8, 16);
        let v = rest_violations(&morning, [&night]);
        assert_eq!(v.len(), 1);
        assert_eq!(v.first().map(|x| x.rest_minutes), Some(8 * 60));
    }

    #[test]
    fn exactly_ten_hours_is_allowed() {
        let night = shift(10, 16, 0);
        let morning = shift(11, 10, 18);
        assert!(rest_violations(&morning, [&night]).is_empty());
    }

    #[test]
    fn overlap_is_negative_rest() {
        let a = shift(10, 8, 16);
        let b = shift(10, 12, 20);
        assert_eq!(rest_between(&a, &b), TimeDelta::hours(-4));
        assert_eq!(rest_between(&b, &a), TimeDelta::hours(-4));
    }

    #[test]
    fn incoming_shift_is_not_compared_with_itself() {
        let a = shift(10, 8, 16);
        assert!(rest_violations(&a, [&a]).is_empty());
    }

    #[test]
    fn four_on_four_off_pattern() {
        let dates = four_on_four_off(date(6, 1), date(6, 16));
        let days: Vec<u32> = dates.iter().map(chrono::Datelike::day).collect();
        assert_eq!(days, vec![1, 2, 3, 4, 9, 10, 11, 12]);
    }

    #[test]
    fn partial_cycle_is_cut_at_until() {
        let dates = four_on_four_off(date(6, 1), date(6, 10));
        assert_eq!(dates.len(), 6);
        assert_eq!(dates.last(), Some(&date(6, 10)));
    }

    #[test]
    fn empty_when_until_before_start() {
        assert!(four_on_four_off(date(6, 10), date(6, 1)).is_empty());
    }
}
