//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the settlement use cases
//! require from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `RaceFeed`: Official race results (upstream, read-only)
//! - `RosterStore`: Roster snapshot per round (read-only)
//! - `Repository`: Calendar, prices, scores and price history

pub mod race_feed;
pub mod repository;
