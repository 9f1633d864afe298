//! Settlement error taxonomy.
//!
//! Every variant is recoverable by retrying later; none is fatal to the
//! host process. Unknown cars or constructors are not errors at all.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use super::roster::RoundId;

/// Stages of a settlement run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Normalizing,
    Scoring,
    Pricing,
    Persisting,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Scoring => "scoring",
            Self::Pricing => "pricing",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Why a settlement half could not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementError {
    /// Feed returned no race, was unreachable, or timed out.
    #[error("no race available: {reason}")]
    NoRaceAvailable { reason: String },

    /// Feed payload lacks a recognizable race/result list.
    #[error("malformed race feed: {reason}")]
    MalformedFeed { reason: String },

    /// Roster snapshot for the round is empty or could not be obtained.
    #[error("no rosters for round {round_id}: {reason}")]
    NoRostersForRound { round_id: RoundId, reason: String },

    /// Race date from the feed matches no known round.
    #[error("race on {race_date} matches no known round")]
    RoundNotMatched { race_date: NaiveDate },

    /// A persistence collaborator failed.
    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

impl SettlementError {
    pub fn no_race(reason: impl Into<String>) -> Self {
        Self::NoRaceAvailable {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFeed {
            reason: reason.into(),
        }
    }

    /// Wrap a collaborator error, keeping its context chain in the message.
    pub fn store(err: &anyhow::Error) -> Self {
        Self::StoreUnavailable {
            reason: format!("{err:#}"),
        }
    }
}

/// Structured failure of one settlement half.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{stage} failed: {cause}")]
pub struct StageFailure {
    pub stage: Stage,
    pub cause: SettlementError,
    /// Human-readable rendering of `cause`.
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, cause: SettlementError) -> Self {
        let message = cause.to_string();
        Self {
            stage,
            cause,
            message,
        }
    }
}
