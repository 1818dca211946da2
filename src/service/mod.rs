//! Service layer: business logic orchestration.
//!
//! [`MatchService`] validates requests, runs the matcher, drives the match
//! lifecycle through the [`crate::persistence::SwapStore`] and emits events
//! through the [`super::domain::EventBus`]. [`Sweeper`] runs the matcher
//! periodically.

pub mod match_service;
pub mod sweeper;

pub use match_service::{
    Actor, MatchCreation, MatchService, PartyRestCheck, PreferredDateInput, RestCheck,
    ServiceSettings, ShiftTemplate, SweepReport, SwapRequestDetail,
};
pub use sweeper::Sweeper;
