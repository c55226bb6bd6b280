//! # Achievements
//!
//! Badge catalog and the unlock state machine.
//!
//! Per (user, badge) a badge is `locked` (no stats row), unlocked once
//! (non-repeatable) or unlocked with a count (repeatable, at most one
//! increment per calendar day). Every successful unlock queues a
//! notification that clients pop one at a time.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use solace_core::{
    AchievementDefinition, AchievementRepo, AchievementStats, AppError, Clock, Result,
};

use crate::storage_error;

/// Badge IDs referenced by the other services.
pub mod badges {
    pub const FIRST_POST: &str = "first-post";
    pub const FIRST_COMMENT: &str = "first-comment";
    pub const KIND_HEART: &str = "kind-heart";
    pub const FIRST_JOURNAL: &str = "first-journal";
    pub const DAILY_CHECK_IN: &str = "daily-check-in";
    pub const WEEK_STREAK: &str = "week-streak";
}

pub static CATALOG: &[AchievementDefinition] = &[
    AchievementDefinition {
        id: badges::FIRST_POST,
        title: "First Steps",
        description: "Shared your first post with the community",
        icon: "🌱",
        repeatable: false,
    },
    AchievementDefinition {
        id: badges::FIRST_COMMENT,
        title: "Supportive Voice",
        description: "Left your first comment on someone's post",
        icon: "💬",
        repeatable: false,
    },
    AchievementDefinition {
        id: badges::KIND_HEART,
        title: "Kind Heart",
        description: "Upvoted a post from the community",
        icon: "💛",
        repeatable: false,
    },
    AchievementDefinition {
        id: badges::FIRST_JOURNAL,
        title: "Dear Diary",
        description: "Wrote your first journal entry",
        icon: "📓",
        repeatable: false,
    },
    AchievementDefinition {
        id: badges::DAILY_CHECK_IN,
        title: "Showing Up",
        description: "Checked in with yourself today",
        icon: "☀️",
        repeatable: true,
    },
    AchievementDefinition {
        id: badges::WEEK_STREAK,
        title: "Seven Days Strong",
        description: "Checked in seven days in a row",
        icon: "🔥",
        repeatable: false,
    },
];

/// Attempts before a contended unlock gives up.
const MAX_UNLOCK_ATTEMPTS: usize = 3;

pub fn definition(badge_id: &str) -> Option<&'static AchievementDefinition> {
    CATALOG.iter().find(|d| d.id == badge_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnlockOutcome {
    Unlocked { badge_id: String, count: u32 },
    /// Already unlocked, or already earned today for repeatable badges
    Unchanged,
}

/// Catalog entry joined with one user's progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BadgeStatus {
    #[serde(flatten)]
    pub definition: AchievementDefinition,
    pub unlocked: bool,
    pub count: u32,
    pub last_unlocked: Option<DateTime<Utc>>,
}

/// Notification ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AchievementNotice {
    pub id: i64,
    pub badge: AchievementDefinition,
    pub count: u32,
    pub created_at: DateTime<Utc>,
}

/// Next stats for a badge, or None if this unlock changes nothing.
pub fn plan_unlock(
    definition: &AchievementDefinition,
    current: Option<&AchievementStats>,
    now: DateTime<Utc>,
    clock: &dyn Clock,
) -> Option<AchievementStats> {
    match current {
        None => Some(AchievementStats {
            count: 1,
            last_unlocked: now,
        }),
        Some(_) if !definition.repeatable => None,
        Some(stats) if clock.local_date(stats.last_unlocked) == clock.local_date(now) => None,
        Some(stats) => Some(AchievementStats {
            count: stats.count + 1,
            last_unlocked: now,
        }),
    }
}

pub struct AchievementService {
    repo: Arc<dyn AchievementRepo>,
    clock: Arc<dyn Clock>,
}

impl AchievementService {
    pub fn new(repo: Arc<dyn AchievementRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    #[tracing::instrument(skip(self))]
    pub async fn unlock(&self, user_id: &str, badge_id: &str) -> Result<UnlockOutcome> {
        let definition =
            definition(badge_id).ok_or_else(|| AppError::not_found("Achievement", badge_id))?;

        for attempt in 1..=MAX_UNLOCK_ATTEMPTS {
            let stats = self
                .repo
                .load_stats(user_id)
                .await
                .map_err(storage_error("load_stats"))?;
            let current = stats
                .iter()
                .find(|(id, _)| id == badge_id)
                .map(|(_, s)| s);

            let Some(next) = plan_unlock(definition, current, self.clock.now(), self.clock.as_ref())
            else {
                tracing::debug!("achievement already earned");
                return Ok(UnlockOutcome::Unchanged);
            };

            let previous = current.map_or(0, |s| s.count);
            let written = self
                .repo
                .record_unlock(user_id, badge_id, previous, &next)
                .await
                .map_err(storage_error("record_unlock"))?;

            if written {
                tracing::info!(count = next.count, "achievement unlocked");
                return Ok(UnlockOutcome::Unlocked {
                    badge_id: badge_id.to_string(),
                    count: next.count,
                });
            }
            tracing::debug!(attempt, "concurrent unlock won the race, re-reading");
        }

        Err(AppError::Conflict(format!(
            "could not record achievement {badge_id} for {user_id}"
        )))
    }

    /// Best-effort unlock used as a side effect of other actions.
    pub async fn award(&self, user_id: &str, badge_id: &str) {
        if let Err(err) = self.unlock(user_id, badge_id).await {
            tracing::warn!(user_id, badge_id, error = %err, "achievement side effect failed");
        }
    }

    pub async fn summary(&self, user_id: &str) -> Result<Vec<BadgeStatus>> {
        let stats = self
            .repo
            .load_stats(user_id)
            .await
            .map_err(storage_error("load_stats"))?;

        Ok(CATALOG
            .iter()
            .map(|definition| {
                let earned = stats
                    .iter()
                    .find(|(id, _)| id == definition.id)
                    .map(|(_, s)| s);
                BadgeStatus {
                    definition: definition.clone(),
                    unlocked: earned.is_some(),
                    count: earned.map_or(0, |s| s.count),
                    last_unlocked: earned.map(|s| s.last_unlocked),
                }
            })
            .collect())
    }

    /// Oldest pending notification. Entries for retired badges are dropped.
    pub async fn next_notification(&self, user_id: &str) -> Result<Option<AchievementNotice>> {
        loop {
            let Some(pending) = self
                .repo
                .next_notification(user_id)
                .await
                .map_err(storage_error("next_notification"))?
            else {
                return Ok(None);
            };

            match definition(&pending.badge_id) {
                Some(badge) => {
                    return Ok(Some(AchievementNotice {
                        id: pending.id,
                        badge: badge.clone(),
                        count: pending.count,
                        created_at: pending.created_at,
                    }))
                }
                None => {
                    tracing::warn!(badge_id = %pending.badge_id, "dropping notification for unknown badge");
                    self.repo
                        .dismiss_notification(user_id, pending.id)
                        .await
                        .map_err(storage_error("dismiss_notification"))?;
                }
            }
        }
    }

    pub async fn dismiss_notification(&self, user_id: &str, id: i64) -> Result<()> {
        let removed = self
            .repo
            .dismiss_notification(user_id, id)
            .await
            .map_err(storage_error("dismiss_notification"))?;
        if removed {
            Ok(())
        } else {
            Err(AppError::not_found("Notification", id))
        }
    }
}
