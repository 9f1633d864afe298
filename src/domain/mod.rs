//! Domain layer - Core settlement logic and models.
//!
//! Pure logic for settling a fantasy F1 round: feed normalization,
//! roster scoring and demand-driven repricing. No I/O happens here
//! (hexagonal architecture inner ring); everything is testable in
//! isolation.

pub mod asset;
pub mod error;
pub mod normalizer;
pub mod outcome;
pub mod pricing;
pub mod roster;
pub mod scoring;

// Re-export core types for convenience
pub use asset::{AssetId, AssetPool, AssetPrice, CarNumber, ConstructorKey, PriceHistoryEntry};
pub use error::{SettlementError, Stage, StageFailure};
pub use normalizer::normalize;
pub use outcome::{CompetitorOutcome, Outcome, RaceResult};
pub use pricing::{PricingEngine, RepricedAsset, SelectionTally};
pub use roster::{RosterSelection, Round, RoundId, ScoreResult};
pub use scoring::{OutcomeIndex, PointsTable, ScoreBreakdown, ScoringEngine};
