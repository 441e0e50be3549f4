//! Core domain logic for watchdeck: dual-store reconciliation, quota
//! enforcement, and the real-time alert pipeline.
//!
//! External collaborators (remote store transport, market data providers,
//! cache backends) plug in through traits; a composition root constructs the
//! services with their dependencies and owns their lifecycle.

pub mod alerts;
pub mod errors;
pub mod limits;
pub mod portfolio;
pub mod scheduler;
pub mod sync;
pub mod watchlist;

pub use errors::{Error, Result};
