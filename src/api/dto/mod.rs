//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain records that already have a stable wire shape (`PotentialMatch`,
//! `PreferredDate`, `MatchCandidate`) are returned as-is; the types here
//! cover request bodies and responses that add or reshape fields.

pub mod common_dto;
pub mod match_dto;
pub mod request_dto;
pub mod shift_dto;

pub use common_dto::*;
pub use match_dto::*;
pub use request_dto::*;
pub use shift_dto::*;
