//! Daily check-in streaks.

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::Serialize;
use solace_core::{AppError, CheckInRepo, CheckInState, Clock, Result};

use crate::achievements::{badges, AchievementService};
use crate::storage_error;

/// Streak length that earns the week badge.
pub const WEEK_STREAK_DAYS: u32 = 7;

const MAX_SAVE_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInOutcome {
    /// Already checked in on this calendar date; nothing changed
    AlreadyCheckedIn,
    /// First ever check-in
    Started,
    /// Previous check-in was yesterday
    Extended,
    /// A day or more was missed
    Reset,
}

/// Applies a check-in on `today` to `state`.
///
/// Days are compared as calendar dates, so 23:59 followed by 00:01 counts
/// as consecutive.
pub fn check_in(state: &mut CheckInState, today: NaiveDate) -> CheckInOutcome {
    let outcome = match state.last_check_in {
        Some(last) if last == today => return CheckInOutcome::AlreadyCheckedIn,
        None => {
            state.streak = 1;
            CheckInOutcome::Started
        }
        Some(last) if last.checked_add_days(Days::new(1)) == Some(today) => {
            state.streak += 1;
            CheckInOutcome::Extended
        }
        Some(_) => {
            state.streak = 1;
            CheckInOutcome::Reset
        }
    };
    state.last_check_in = Some(today);
    state.longest_streak = state.longest_streak.max(state.streak);
    outcome
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInReport {
    pub outcome: CheckInOutcome,
    #[serde(flatten)]
    pub state: CheckInState,
}

pub struct CheckInService {
    repo: Arc<dyn CheckInRepo>,
    clock: Arc<dyn Clock>,
    achievements: Option<Arc<AchievementService>>,
}

impl CheckInService {
    pub fn new(repo: Arc<dyn CheckInRepo>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            achievements: None,
        }
    }

    pub fn with_achievements(mut self, achievements: Arc<AchievementService>) -> Self {
        self.achievements = Some(achievements);
        self
    }

    pub async fn state(&self, user_id: &str) -> Result<CheckInState> {
        self.repo
            .load_check_in(user_id)
            .await
            .map_err(storage_error("load_check_in"))
    }

    /// Records today's check-in.
    ///
    /// The save is conditional on the state that was read, so of two
    /// concurrent calls on the same day exactly one writes and awards badges;
    /// the other re-reads and reports `AlreadyCheckedIn`.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(&self, user_id: &str) -> Result<CheckInReport> {
        let today = self.clock.today();

        for attempt in 1..=MAX_SAVE_ATTEMPTS {
            let mut state = self.state(user_id).await?;
            let expected_last = state.last_check_in;
            let outcome = check_in(&mut state, today);
            if outcome == CheckInOutcome::AlreadyCheckedIn {
                return Ok(CheckInReport { outcome, state });
            }

            let saved = self
                .repo
                .save_check_in(user_id, &state, expected_last)
                .await
                .map_err(storage_error("save_check_in"))?;
            if !saved {
                tracing::debug!(attempt, "concurrent check-in won the race, re-reading");
                continue;
            }
            tracing::info!(?outcome, streak = state.streak, "checked in");

            if let Some(achievements) = &self.achievements {
                achievements.award(user_id, badges::DAILY_CHECK_IN).await;
                if state.streak >= WEEK_STREAK_DAYS {
                    achievements.award(user_id, badges::WEEK_STREAK).await;
                }
            }
            return Ok(CheckInReport { outcome, state });
        }

        Err(AppError::Conflict(format!("could not record check-in for {user_id}")))
    }
}
