//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  parse_config(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Load `path` if given, otherwise fall back to validated defaults.
pub fn load_or_default(path: Option<&str>) -> Result<AppConfig> {
  match path {
    Some(path) => load_config(path),
    None => {
      let config = AppConfig::default();
      validate_config(&config)?;
      Ok(config)
    }
  }
}

/// Parse and validate TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content).context("Failed to parse config.toml")?;
  validate_config(&config)?;
  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty feed endpoint and a positive timeout
/// - A non-negative, non-increasing points table
/// - Non-positive penalties
/// - Pricing rates inside their useful ranges
fn validate_config(config: &AppConfig) -> Result<()> {
  // Feed validation
  anyhow::ensure!(
    !config.feed.base_url.is_empty(),
    "Feed base_url must not be empty"
  );
  anyhow::ensure!(
    !config.feed.season.is_empty(),
    "Feed season must not be empty"
  );
  anyhow::ensure!(
    config.feed.timeout_seconds > 0,
    "Feed timeout_seconds must be positive"
  );

  // Scoring validation
  let scoring = &config.scoring;
  anyhow::ensure!(
    !scoring.rank_points.is_empty(),
    "Scoring rank_points must not be empty"
  );
  anyhow::ensure!(
    scoring.rank_points.iter().all(|p| *p >= 0),
    "Scoring rank_points must be non-negative, got {:?}",
    scoring.rank_points
  );
  anyhow::ensure!(
    scoring.rank_points.windows(2).all(|w| w[0] >= w[1]),
    "Scoring rank_points must not increase with rank, got {:?}",
    scoring.rank_points
  );
  anyhow::ensure!(
    scoring.retired_penalty <= 0,
    "retired_penalty must be <= 0, got {}",
    scoring.retired_penalty
  );
  anyhow::ensure!(
    scoring.did_not_start_penalty <= 0,
    "did_not_start_penalty must be <= 0, got {}",
    scoring.did_not_start_penalty
  );
  anyhow::ensure!(
    scoring.constructor_factor > 0.0 && scoring.constructor_factor <= 1.0,
    "constructor_factor must be in (0, 1], got {}",
    scoring.constructor_factor
  );

  // Pricing validation
  let pricing = &config.pricing;
  anyhow::ensure!(
    pricing.learning_rate > 0.0 && pricing.learning_rate < 1.0,
    "Pricing learning_rate must be in (0, 1), got {}",
    pricing.learning_rate
  );
  anyhow::ensure!(
    pricing.target_weight > 0.0 && pricing.target_weight <= 1.0,
    "Pricing target_weight must be in (0, 1], got {}",
    pricing.target_weight
  );
  anyhow::ensure!(
    pricing.price_decimals <= 4,
    "Pricing price_decimals must be <= 4, got {}",
    pricing.price_decimals
  );

  // Persistence validation
  anyhow::ensure!(
    !config.persistence.data_dir.is_empty(),
    "Persistence data_dir must not be empty"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_invalid_file_error_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[feed]\ntimeout_seconds = 0\n").unwrap();

    let err = load_config(path.to_str().unwrap()).unwrap_err();
    let chain = format!("{err:#}");
    assert!(chain.contains("bad.toml"), "{chain}");
    assert!(chain.contains("timeout_seconds must be positive"), "{chain}");
  }

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = parse_config("").unwrap();
    assert_eq!(config.feed.timeout_seconds, 10);
    assert_eq!(config.scoring.rank_points[0], 50);
    assert_eq!(config.scoring.retired_penalty, -10);
    assert!((config.pricing.learning_rate - 0.1).abs() < f64::EPSILON);
    assert!(!config.service.dry_run);
  }

  #[test]
  fn test_partial_sections_override() {
    let config = parse_config(
      r#"
        [service]
        dry_run = true

        [feed]
        season = "2025"
        timeout_seconds = 3

        [scoring]
        rank_points = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1]
      "#,
    )
    .unwrap();
    assert!(config.service.dry_run);
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.feed.season, "2025");
    assert_eq!(config.feed.base_url, "https://api.jolpi.ca/ergast/f1");
    assert_eq!(config.scoring.rank_points.len(), 10);
    assert_eq!(config.scoring.did_not_start_penalty, -1);
  }

  #[test]
  fn test_rejects_increasing_points() {
    let err = parse_config("[scoring]\nrank_points = [10, 20]\n").unwrap_err();
    assert!(err.to_string().contains("must not increase"));
  }

  #[test]
  fn test_rejects_positive_penalty() {
    assert!(parse_config("[scoring]\nretired_penalty = 5\n").is_err());
  }

  #[test]
  fn test_rejects_bad_pricing() {
    assert!(parse_config("[pricing]\ntarget_weight = 0.0\n").is_err());
    assert!(parse_config("[pricing]\nlearning_rate = 1.5\n").is_err());
  }

  #[test]
  fn test_shipped_config_matches_defaults() {
    let shipped = parse_config(include_str!("../../config.toml")).unwrap();
    let defaults = AppConfig::default();
    assert_eq!(shipped.scoring.rank_points, defaults.scoring.rank_points);
    assert_eq!(shipped.feed.base_url, defaults.feed.base_url);
    assert_eq!(shipped.persistence.data_dir, defaults.persistence.data_dir);
  }

  #[test]
  fn test_default_without_file() {
    let config = load_or_default(None).unwrap();
    assert_eq!(config.persistence.data_dir, "data");
  }
}
