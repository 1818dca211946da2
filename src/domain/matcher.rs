//! Swap-compatibility matcher.
//!
//! Two pending requests are compatible when each requester wants the date
//! of the other's offered shift. With type filtering enabled, the wanted
//! date entry must also accept the derived [`ShiftType`] of that shift.
//!
//! This is not a stable-matching or optimal-assignment algorithm. Every
//! compatible pair is reported, so one request can show up in several
//! candidates. Only one of them can become an active match: the store
//! rejects a second active match for the same request.
//!
//! Cost is `O(|mine| × |others| × |preferred dates per request|)`, which
//! is fine for per-user pending request volumes.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use utoipa::ToSchema;

use super::potential_match::pair_key;
use super::{PreferredDate, RequestId, ShiftId, ShiftRecord, ShiftType, SwapRequest, UserId};

/// Matcher switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchOptions {
    /// Require each wanted date entry to accept the other shift's type.
    pub type_filtering: bool,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            type_filtering: true,
        }
    }
}

/// One side of a [`MatchCandidate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CandidateSide {
    /// The swap request.
    pub request_id: RequestId,
    /// Its requester.
    pub user_id: UserId,
    /// The shift offered.
    pub shift_id: ShiftId,
    /// Date of the offered shift.
    pub shift_date: NaiveDate,
    /// Derived type of the offered shift.
    pub shift_type: ShiftType,
}

/// A mutually compatible pair, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MatchCandidate {
    /// Side taken from the "mine" list.
    pub requester: CandidateSide,
    /// Side taken from the "others" list.
    pub acceptor: CandidateSide,
}

impl MatchCandidate {
    /// Order-independent key of the two request ids.
    #[must_use]
    pub fn pair_key(&self) -> (RequestId, RequestId) {
        pair_key(self.requester.request_id, self.acceptor.request_id)
    }
}

/// Read-only view over the data the matcher needs.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// Shifts keyed by id. Requests whose shift is absent are skipped.
    pub shifts: &'a HashMap<ShiftId, ShiftRecord>,
    /// Preferred dates keyed by owning request.
    pub preferred_dates: &'a HashMap<RequestId, Vec<PreferredDate>>,
    /// Matcher switches.
    pub options: MatchOptions,
}

impl MatchContext<'_> {
    /// Returns `true` if `request` lists a date entry acceptable for `shift`.
    #[must_use]
    pub fn wants(&self, request: &SwapRequest, shift: &ShiftRecord) -> bool {
        let ty = shift.shift_type();
        self.preferred_dates
            .get(&request.id)
            .is_some_and(|dates| {
                dates.iter().any(|d| {
                    d.date == shift.date && (!self.options.type_filtering || d.accepts_type(ty))
                })
            })
    }

    /// Evaluates a single ordered pair, returning a candidate when the two
    /// requests are mutually compatible.
    ///
    /// The relation is symmetric: swapping `a` and `b` yields the same
    /// verdict with the sides exchanged.
    #[must_use]
    pub fn evaluate(&self, a: &SwapRequest, b: &SwapRequest) -> Option<MatchCandidate> {
        if !a.is_pending() || !b.is_pending() {
            return None;
        }
        if a.id == b.id || a.requester_id == b.requester_id {
            return None;
        }
        let shift_a = self.shifts.get(&a.requester_shift_id)?;
        let shift_b = self.shifts.get(&b.requester_shift_id)?;

        if !(self.wants(a, shift_b) && self.wants(b, shift_a)) {
            return None;
        }

        Some(MatchCandidate {
            requester: side(a, shift_a),
            acceptor: side(b, shift_b),
        })
    }
}

fn side(request: &SwapRequest, shift: &ShiftRecord) -> CandidateSide {
    CandidateSide {
        request_id: request.id,
        user_id: request.requester_id,
        shift_id: shift.id,
        shift_date: shift.date,
        shift_type: shift.shift_type(),
    }
}

/// Finds every compatible pair between `mine` and `others`.
///
/// Each unordered pair is reported at most once even when both requests
/// occur in both lists, so passing the same slice twice is the way to run
/// an all-against-all sweep. Output order follows the input order.
#[must_use]
pub fn find_matches(
    mine: &[SwapRequest],
    others: &[SwapRequest],
    ctx: &MatchContext<'_>,
) -> Vec<MatchCandidate> {
    let mut seen: HashSet<(RequestId, RequestId)> = HashSet::new();
    let mut candidates = Vec::new();

    for a in mine {
        for b in others {
            if a.id == b.id || !seen.insert(pair_key(a.id, b.id)) {
                continue;
            }
            if let Some(candidate) = ctx.evaluate(a, b) {
                candidates.push(candidate);
            }
        }
    }

    tracing::debug!(
        mine = mine.len(),
        others = others.len(),
        found = candidates.len(),
        "match scan finished"
    );
    candidates
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveTime;

    use super::*;
    use crate::domain::RequestStatus;

    struct Fixture {
        shifts: HashMap<ShiftId, ShiftRecord>,
        preferred: HashMap<RequestId, Vec<PreferredDate>>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                shifts: HashMap::new(),
                preferred: HashMap::new(),
            }
        }

        fn offer(
            &mut self,
            user: UserId,
            day: u32,
            start_hour: u32,
            wants: &[(u32, &[ShiftType])],
        ) -> SwapRequest {
            let Some(date) = NaiveDate::from_ymd_opt(2025, 6, day) else {
                panic!("valid date");
            };
            let Some(start) = NaiveTime::from_hms_opt(start_hour, 0, 0) else {
                panic!("valid time");
            };
            let Some(end) = NaiveTime::from_hms_opt((start_hour + 8) % 24, 0, 0) else {
                panic!("valid time");
            };
            let shift = ShiftRecord {
                id: ShiftId::new(),
                date,
                start_time: start,
                end_time: end,
                truck_name: None,
                colleague_type: None,
                owner_user_id: user,
            };
            let request = SwapRequest::new(user, shift.id);
            let dates = wants
                .iter()
                .map(|(d, types)| {
                    let Some(want) = NaiveDate::from_ymd_opt(2025, 6, *d) else {
                        panic!("valid date");
                    };
                    PreferredDate::new(
                        request.id,
                        want,
                        None,
                        types.iter().copied().collect::<BTreeSet<_>>(),
                    )
                })
                .collect();
            self.shifts.insert(shift.id, shift);
            self.preferred.insert(request.id, dates);
            request
        }

        fn ctx(&self, type_filtering: bool) -> MatchContext<'_> {
            MatchContext {
                shifts: &self.shifts,
                preferred_dates: &self.preferred,
                options: MatchOptions { type_filtering },
            }
        }
    }

    #[test]
    fn finds_mutual_pair() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[])]);

        let found = find_matches(&[x.clone()], &[y.clone()], &fx.ctx(true));
        assert_eq!(found.len(), 1);
        let Some(c) = found.first() else {
            panic!("expected a candidate");
        };
        assert_eq!(c.requester.request_id, x.id);
        assert_eq!(c.acceptor.request_id, y.id);
        assert_eq!(c.requester.shift_type, ShiftType::Day);
        assert_eq!(c.acceptor.shift_type, ShiftType::Night);
    }

    #[test]
    fn one_sided_want_is_not_a_match() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(2, &[])]);
        assert!(find_matches(&[x], &[y], &fx.ctx(true)).is_empty());
    }

    #[test]
    fn relation_is_symmetric() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[ShiftType::Night])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[ShiftType::Day])]);
        let z = fx.offer(UserId::new(), 10, 12, &[(1, &[])]);
        let ctx = fx.ctx(true);
        for (a, b) in [(&x, &y), (&x, &z), (&y, &z)] {
            assert_eq!(ctx.evaluate(a, b).is_some(), ctx.evaluate(b, a).is_some());
        }
    }

    #[test]
    fn same_requester_never_matches() {
        let mut fx = Fixture::new();
        let user = UserId::new();
        let x = fx.offer(user, 1, 8, &[(10, &[])]);
        let y = fx.offer(user, 10, 8, &[(1, &[])]);
        assert!(find_matches(&[x], &[y], &fx.ctx(false)).is_empty());
    }

    #[test]
    fn type_filter_rejects_unwanted_type() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[ShiftType::Day])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[])]);

        assert!(find_matches(&[x.clone()], &[y.clone()], &fx.ctx(true)).is_empty());
        assert_eq!(find_matches(&[x], &[y], &fx.ctx(false)).len(), 1);
    }

    #[test]
    fn non_pending_requests_are_ignored() {
        let mut fx = Fixture::new();
        let mut x = fx.offer(UserId::new(), 1, 8, &[(10, &[])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[])]);
        x.status = RequestStatus::Matched;
        assert!(find_matches(&[x], &[y], &fx.ctx(true)).is_empty());
    }

    #[test]
    fn missing_shift_is_skipped() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[])]);
        fx.shifts.remove(&y.requester_shift_id);
        assert!(find_matches(&[x], &[y], &fx.ctx(true)).is_empty());
    }

    #[test]
    fn all_against_all_reports_each_pair_once() {
        let mut fx = Fixture::new();
        let x = fx.offer(UserId::new(), 1, 8, &[(10, &[])]);
        let y = fx.offer(UserId::new(), 10, 16, &[(1, &[])]);
        let z = fx.offer(UserId::new(), 10, 20, &[(1, &[])]);
        let all = vec![x, y, z];
        let ctx = fx.ctx(true);

        let first = find_matches(&all, &all, &ctx);
        let second = find_matches(&all, &all, &ctx);
        assert_eq!(first.len(), 2);
        assert_eq!(first, second);

        let keys: HashSet<_> = first.iter().map(MatchCandidate::pair_key).collect();
        assert_eq!(keys.len(), first.len());
    }
}
