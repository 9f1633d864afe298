//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! settlement workflow.
//!
//! Use cases:
//! - `SettlementCoordinator`: fetch, normalize, score, reprice, persist
//! - `RunTracker`: per-run state machine with logged transitions

pub mod run_state;
pub mod settlement;

pub use run_state::{RunState, RunTracker};
pub use settlement::{
  CollaboratorHealth, PoolPricing, PricingSummary, ScoringSummary, SettlementCoordinator,
  SettlementReport,
};
