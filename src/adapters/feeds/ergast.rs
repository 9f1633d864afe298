//! Ergast Race Feed - HTTP Adapter for the Race-Result Feed
//!
//! Fetches `{base_url}/{season}/{round}/results.json` (or
//! `{season}/last/results.json` for the latest race) from an
//! Ergast-compatible API such as Jolpica. One request per call, no
//! retries: a failed fetch is reported and the caller decides whether
//! to re-run settlement.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::config::FeedConfig;
use crate::ports::race_feed::{RaceFeed, RoundSelector};

/// HTTP client for an Ergast-compatible results API.
pub struct ErgastFeed {
  /// Underlying HTTP client.
  http: Client,
  /// API root without trailing slash.
  base_url: String,
  /// Season path segment.
  season: String,
}

impl ErgastFeed {
  /// Create a new feed client from config.
  pub fn new(config: &FeedConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(Duration::from_secs(config.timeout_seconds))
      .pool_max_idle_per_host(1)
      .build()
      .context("Failed to build HTTP client")?;

    Ok(Self {
      http,
      base_url: config.base_url.trim_end_matches('/').to_string(),
      season: config.season.clone(),
    })
  }

  /// Results URL for a selector.
  pub fn results_url(&self, selector: RoundSelector) -> String {
    match selector {
      RoundSelector::Latest => format!("{}/{}/last/results.json", self.base_url, self.season),
      RoundSelector::Round(round) => {
        format!("{}/{}/{round}/results.json", self.base_url, self.season)
      }
    }
  }
}

#[async_trait]
impl RaceFeed for ErgastFeed {
  #[instrument(skip(self, selector), fields(selector = %selector))]
  async fn fetch_results(&self, selector: RoundSelector) -> Result<serde_json::Value> {
    let url = self.results_url(selector);
    debug!(url = %url, "Fetching race results");

    let response = self
      .http
      .get(&url)
      .send()
      .await
      .with_context(|| format!("Failed to reach race feed at {url}"))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      warn!(status = %status, "Race feed returned an error status");
      anyhow::bail!("Race feed error {status}: {body}");
    }

    let payload: serde_json::Value = response
      .json()
      .await
      .context("Failed to parse race feed JSON")?;

    info!(url = %url, "Race results fetched");
    Ok(payload)
  }

  async fn is_healthy(&self) -> bool {
    let url = format!("{}/{}.json", self.base_url, self.season);
    self
      .http
      .get(&url)
      .send()
      .await
      .is_ok_and(|r| r.status().is_success())
  }
}
