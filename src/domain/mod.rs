//! Domain layer: records, the swap matcher, calendar rules, and events.
//!
//! Everything here is storage-agnostic. The matcher and calendar helpers
//! are pure functions over in-memory records; the event bus carries
//! lifecycle transitions to the notifier and WebSocket subscribers.

pub mod calendar;
pub mod event_bus;
pub mod ids;
pub mod match_event;
pub mod matcher;
pub mod potential_match;
pub mod shift;
pub mod swap_request;

pub use calendar::RestViolation;
pub use event_bus::EventBus;
pub use ids::{MatchId, PreferredDateId, RequestId, ShiftId, UserId};
pub use match_event::{MatchEvent, MatchParties};
pub use matcher::{MatchCandidate, MatchContext, MatchOptions, find_matches};
pub use potential_match::{MatchStatus, PotentialMatch};
pub use shift::{ShiftRecord, ShiftType};
pub use swap_request::{PreferredDate, RequestStatus, SwapRequest};
