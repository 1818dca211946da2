//! # shiftflex-gateway
//!
//! REST API and WebSocket gateway for ShiftFlex shift swapping.
//!
//! Workers offer one of their shifts together with the dates they would
//! work instead. The matcher pairs requests whose owners want each other's
//! shift date, and the match lifecycle (`pending -> accepted -> completed`)
//! ends with the two shifts changing owner in one atomic store operation.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── MatchService + Sweeper (service/)
//!     ├── Matcher, calendar rules, EventBus (domain/)
//!     │
//!     ├── Notifier (notify/) ── SMTP
//!     │
//!     └── SwapStore (persistence/): PostgreSQL or in-memory
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod service;
pub mod ws;
