//! Result Normalizer - Feed Payload to Canonical Outcomes
//!
//! Parses an Ergast-format race-result payload
//! (`MRData.RaceTable.Races[0].Results[]`) into a [`RaceResult`].
//! This is the only place that knows the feed's field names and its
//! position markers.
//!
//! Position policy:
//! - `positionText == "R"` → `Retired`
//! - `positionText == "W"` → `DidNotStart`
//! - numeric position → `Finished { rank }`
//! - anything else → `Finished { rank: 0 }` (no points, never an error)

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use super::asset::{CarNumber, ConstructorKey};
use super::error::SettlementError;
use super::outcome::{CompetitorOutcome, Outcome, RaceResult};

/// Feed marker for a retirement.
pub const RETIRED_MARKER: &str = "R";

/// Feed marker for a withdrawal / non-start.
pub const WITHDRAWN_MARKER: &str = "W";

// ── Feed wire types ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MRData")]
    mr_data: Option<MrData>,
}

#[derive(Debug, Deserialize)]
struct MrData {
    #[serde(rename = "RaceTable")]
    race_table: Option<RaceTable>,
}

#[derive(Debug, Deserialize)]
struct RaceTable {
    #[serde(rename = "Races")]
    races: Option<Vec<FeedRace>>,
}

#[derive(Debug, Deserialize)]
struct FeedRace {
    #[serde(rename = "raceName", default)]
    race_name: String,
    date: Option<String>,
    season: Option<String>,
    round: Option<String>,
    #[serde(rename = "Results")]
    results: Option<Vec<FeedResult>>,
}

#[derive(Debug, Deserialize)]
struct FeedResult {
    number: Option<String>,
    position: Option<String>,
    #[serde(rename = "positionText")]
    position_text: Option<String>,
    #[serde(rename = "Driver")]
    driver: Option<FeedDriver>,
    #[serde(rename = "Constructor")]
    constructor: Option<FeedConstructor>,
}

#[derive(Debug, Deserialize)]
struct FeedDriver {
    #[serde(rename = "permanentNumber")]
    permanent_number: Option<String>,
    #[serde(rename = "driverId")]
    driver_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedConstructor {
    #[serde(rename = "constructorId")]
    constructor_id: Option<String>,
}

// ── Normalization ───────────────────────────────────────────

/// Normalize a raw feed payload.
///
/// # Errors
/// - `MalformedFeed` if the race table, race list, result list or race
///   date is missing or unparseable.
/// - `NoRaceAvailable` if the feed returned zero races.
pub fn normalize(raw: &serde_json::Value) -> Result<RaceResult, SettlementError> {
    let envelope = Envelope::deserialize(raw)
        .map_err(|e| SettlementError::malformed(format!("unexpected payload shape: {e}")))?;

    let races = envelope
        .mr_data
        .and_then(|m| m.race_table)
        .and_then(|t| t.races)
        .ok_or_else(|| SettlementError::malformed("missing MRData.RaceTable.Races"))?;

    let Some(race) = races.into_iter().next() else {
        return Err(SettlementError::no_race("feed returned zero races"));
    };

    let date_text = race
        .date
        .ok_or_else(|| SettlementError::malformed("race has no date"))?;
    let race_date = NaiveDate::parse_from_str(&date_text, "%Y-%m-%d")
        .map_err(|e| SettlementError::malformed(format!("bad race date '{date_text}': {e}")))?;

    let results = race
        .results
        .ok_or_else(|| SettlementError::malformed("race has no Results list"))?;

    let mut seen = HashSet::with_capacity(results.len());
    let mut outcomes = Vec::with_capacity(results.len());

    for entry in results {
        let Some(competitor) = to_competitor(entry) else {
            continue;
        };
        if !seen.insert(competitor.car_number) {
            warn!(
                car = %competitor.car_number,
                "Duplicate car number in feed, keeping first outcome"
            );
            continue;
        }
        outcomes.push(competitor);
    }

    debug!(
        race = %race.race_name,
        date = %race_date,
        competitors = outcomes.len(),
        "Race result normalized"
    );

    Ok(RaceResult {
        race_date,
        race_name: race.race_name,
        round: race.round.as_deref().and_then(|r| r.trim().parse().ok()),
        season: race.season,
        outcomes,
    })
}

/// Map one feed result to a competitor outcome.
///
/// Entries without a usable car number or constructor are skipped:
/// feed inconsistencies must not abort settlement for everyone else.
fn to_competitor(entry: FeedResult) -> Option<CompetitorOutcome> {
    let permanent = entry
        .driver
        .as_ref()
        .and_then(|d| d.permanent_number.as_deref())
        .and_then(parse_positive);
    let Some(car_number) = permanent.or_else(|| entry.number.as_deref().and_then(parse_positive))
    else {
        warn!(
            driver = ?entry.driver.as_ref().and_then(|d| d.driver_id.as_deref()),
            "Feed result has no car number, skipping"
        );
        return None;
    };

    let Some(constructor) = entry
        .constructor
        .and_then(|c| c.constructor_id)
        .filter(|id| !id.is_empty())
    else {
        warn!(car = car_number, "Feed result has no constructor, skipping");
        return None;
    };

    Some(CompetitorOutcome {
        car_number: CarNumber(car_number),
        constructor: ConstructorKey(constructor),
        outcome: classify(entry.position_text.as_deref(), entry.position.as_deref()),
    })
}

/// Apply the position policy.
pub fn classify(position_text: Option<&str>, position: Option<&str>) -> Outcome {
    match position_text.map(str::trim) {
        Some(RETIRED_MARKER) => Outcome::Retired,
        Some(WITHDRAWN_MARKER) => Outcome::DidNotStart,
        text => {
            let rank = position
                .or(text)
                .map(str::trim)
                .filter(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|p| p.parse().ok())
                .unwrap_or(0);
            Outcome::Finished { rank }
        }
    }
}

fn parse_positive(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|n| *n > 0)
}
