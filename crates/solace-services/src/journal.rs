//! Private journal entries.

use std::sync::Arc;

use solace_core::{AppError, Clock, JournalEntry, JournalRepo, Result};
use uuid::Uuid;

use crate::achievements::{badges, AchievementService};
use crate::storage_error;

fn entry_text(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::ValidationError("journal entry is empty".to_string()));
    }
    Ok(content.to_string())
}

pub struct JournalService {
    repo: Arc<dyn JournalRepo>,
    clock: Arc<dyn Clock>,
    achievements: Option<Arc<AchievementService>>,
}

impl JournalService {
    pub fn new(repo: Arc<dyn JournalRepo>, clock: Arc<dyn Clock>) -> Self {
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

    /// The user's entries, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.repo
            .list_entries(user_id)
            .await
            .map_err(storage_error("list_entries"))
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn create(&self, user_id: &str, content: &str) -> Result<JournalEntry> {
        let entry = JournalEntry {
            id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            content: entry_text(content)?,
            created_at: self.clock.now(),
            edited_at: None,
        };
        self.repo
            .insert_entry(&entry)
            .await
            .map_err(storage_error("insert_entry"))?;
        tracing::info!(entry_id = %entry.id, "journal entry written");

        if let Some(achievements) = &self.achievements {
            achievements.award(user_id, badges::FIRST_JOURNAL).await;
        }
        Ok(entry)
    }

    #[tracing::instrument(skip(self, content))]
    pub async fn update(&self, user_id: &str, id: Uuid, content: &str) -> Result<JournalEntry> {
        let mut entry = self.owned_entry(user_id, id).await?;
        let content = entry_text(content)?;
        let now = self.clock.now();

        let updated = self
            .repo
            .update_entry(id, &content, now)
            .await
            .map_err(storage_error("update_entry"))?;
        if !updated {
            return Err(AppError::not_found("Journal entry", id));
        }
        entry.content = content;
        entry.edited_at = Some(now);
        Ok(entry)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, user_id: &str, id: Uuid) -> Result<()> {
        self.owned_entry(user_id, id).await?;
        let deleted = self
            .repo
            .delete_entry(id)
            .await
            .map_err(storage_error("delete_entry"))?;
        if !deleted {
            return Err(AppError::not_found("Journal entry", id));
        }
        Ok(())
    }

    async fn owned_entry(&self, user_id: &str, id: Uuid) -> Result<JournalEntry> {
        let entry = self
            .repo
            .get_entry(id)
            .await
            .map_err(storage_error("get_entry"))?
            .ok_or_else(|| AppError::not_found("Journal entry", id))?;
        if entry.user_id != user_id {
            return Err(AppError::Forbidden(
                "journal entries are private to their author".to_string(),
            ));
        }
        Ok(entry)
    }
}
