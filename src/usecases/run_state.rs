//! Run State - Settlement Run State Machine
//!
//! One settlement run walks
//! `Fetching → Normalizing → Scoring → Pricing → Persisting → Done`.
//! `Failed { stage, cause }` is terminal and reachable from any
//! non-terminal state. Every transition is logged.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::error::{SettlementError, Stage};

/// State of a settlement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
  Fetching,
  Normalizing,
  Scoring,
  Pricing,
  Persisting,
  Done,
  Failed { stage: Stage, cause: SettlementError },
}

impl RunState {
  pub const fn is_terminal(&self) -> bool {
    matches!(self, Self::Done | Self::Failed { .. })
  }

  /// Stage a failure in this state is attributed to.
  pub const fn stage(&self) -> Option<Stage> {
    match self {
      Self::Fetching => Some(Stage::Fetching),
      Self::Normalizing => Some(Stage::Normalizing),
      Self::Scoring => Some(Stage::Scoring),
      Self::Pricing => Some(Stage::Pricing),
      Self::Persisting => Some(Stage::Persisting),
      Self::Done | Self::Failed { .. } => None,
    }
  }

  const fn rank(&self) -> u8 {
    match self {
      Self::Fetching => 0,
      Self::Normalizing => 1,
      Self::Scoring => 2,
      Self::Pricing => 3,
      Self::Persisting => 4,
      Self::Done | Self::Failed { .. } => 5,
    }
  }
}

impl std::fmt::Display for RunState {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Done => f.write_str("done"),
      Self::Failed { stage, .. } => write!(f, "failed@{stage}"),
      other => match other.stage() {
        Some(stage) => write!(f, "{stage}"),
        None => Ok(()),
      },
    }
  }
}

/// Tracks the state of one run and logs its transitions.
#[derive(Debug)]
pub struct RunTracker {
  run_id: Uuid,
  state: RunState,
  trail: Vec<RunState>,
}

impl RunTracker {
  pub fn new(run_id: Uuid) -> Self {
    info!(%run_id, state = %RunState::Fetching, "Settlement run started");
    Self {
      run_id,
      state: RunState::Fetching,
      trail: vec![RunState::Fetching],
    }
  }

  pub const fn state(&self) -> &RunState {
    &self.state
  }

  /// Every state visited so far, in order.
  pub fn trail(&self) -> &[RunState] {
    &self.trail
  }

  /// Move forward to `next`.
  ///
  /// Backward moves and moves out of a terminal state are ignored with a
  /// warning; the run only ever progresses.
  pub fn advance(&mut self, next: RunState) {
    if self.state.is_terminal() || next.rank() <= self.state.rank() {
      warn!(
        run_id = %self.run_id,
        from = %self.state,
        to = %next,
        "Ignoring invalid run transition"
      );
      return;
    }
    info!(run_id = %self.run_id, from = %self.state, to = %next, "Run transition");
    self.trail.push(next.clone());
    self.state = next;
  }

  /// Terminate the run at the current stage.
  pub fn fail(&mut self, cause: SettlementError) {
    let Some(stage) = self.state.stage() else {
      warn!(run_id = %self.run_id, state = %self.state, "Run already terminated");
      return;
    };
    self.fail_at(stage, cause);
  }

  /// Terminate the run, attributing the failure to `stage`.
  pub fn fail_at(&mut self, stage: Stage, cause: SettlementError) {
    if self.state.is_terminal() {
      warn!(run_id = %self.run_id, state = %self.state, "Run already terminated");
      return;
    }
    warn!(
      run_id = %self.run_id,
      from = %self.state,
      %stage,
      cause = %cause,
      "Settlement run failed"
    );
    let failed = RunState::Failed { stage, cause };
    self.trail.push(failed.clone());
    self.state = failed;
  }

  pub fn finish(&mut self) {
    self.advance(RunState::Done);
  }
}
