//! Race Feed Port - Upstream Race-Result Interface
//!
//! Defines the trait for fetching the official result of a race weekend
//! from an upstream provider. The port hands back the raw payload; the
//! domain normalizer owns its interpretation.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;

/// Which race to fetch from the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundSelector {
  /// Most recent race of the current season.
  Latest,
  /// Championship round number of the current season.
  Round(u32),
}

impl std::fmt::Display for RoundSelector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Latest => write!(f, "current"),
      Self::Round(n) => write!(f, "{n}"),
    }
  }
}

impl FromStr for RoundSelector {
  type Err = anyhow::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "current" | "last" | "latest" => Ok(Self::Latest),
      other => {
        let round: u32 = other
          .parse()
          .map_err(|_| anyhow::anyhow!("expected a round number or 'current', got '{s}'"))?;
        anyhow::ensure!(round > 0, "round numbers start at 1");
        Ok(Self::Round(round))
      }
    }
  }
}

/// Trait for race-result providers.
///
/// A single call per settlement run; implementors must not retry on
/// their own. The caller bounds the call with a timeout and decides
/// whether to re-invoke.
#[async_trait]
pub trait RaceFeed: Send + Sync + 'static {
  /// Fetch the raw result payload for the selected race.
  async fn fetch_results(&self, selector: RoundSelector) -> anyhow::Result<serde_json::Value>;

  /// Check if the feed is reachable.
  async fn is_healthy(&self) -> bool;
}
