//! Race Feed Adapters
//!
//! Concrete implementations of the `RaceFeed` port.

pub mod ergast;

pub use ergast::ErgastFeed;
