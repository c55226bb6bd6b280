use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solace_core::{JournalEntry, JournalRepo};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::SqliteStore;

fn entry_from_row(row: &SqliteRow) -> Result<JournalEntry, sqlx::Error> {
    Ok(JournalEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        edited_at: row.try_get("edited_at")?,
    })
}

#[async_trait]
impl JournalRepo for SqliteStore {
    async fn insert_entry(&self, entry: &JournalEntry) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO journal_entries (id, user_id, content, created_at, edited_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.id)
        .bind(&entry.user_id)
        .bind(&entry.content)
        .bind(entry.created_at)
        .bind(entry.edited_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<JournalEntry>> {
        let row = sqlx::query(
            "SELECT id, user_id, content, created_at, edited_at FROM journal_entries WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(entry_from_row).transpose()?)
    }

    async fn list_entries(&self, user_id: &str) -> anyhow::Result<Vec<JournalEntry>> {
        let rows = sqlx::query(
            "SELECT id, user_id, content, created_at, edited_at FROM journal_entries \
             WHERE user_id = ? ORDER BY rowid DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(entry_from_row).collect::<Result<_, _>>()?)
    }

    async fn update_entry(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE journal_entries SET content = ?, edited_at = ? WHERE id = ?")
            .bind(content)
            .bind(edited_at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM journal_entries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: &str, content: &str) -> JournalEntry {
        JournalEntry {
            id: Uuid::now_v7(),
            user_id: user.to_string(),
            content: content.to_string(),
            created_at: Utc::now(),
            edited_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_is_per_user_newest_first() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        repo.insert_entry(&entry("u1", "monday")).await.unwrap();
        repo.insert_entry(&entry("u2", "not mine")).await.unwrap();
        repo.insert_entry(&entry("u1", "tuesday")).await.unwrap();

        let contents: Vec<_> = repo
            .list_entries("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["tuesday", "monday"]);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        let e = entry("u1", "draft");
        repo.insert_entry(&e).await.unwrap();

        assert!(repo.update_entry(e.id, "final", Utc::now()).await.unwrap());
        let loaded = repo.get_entry(e.id).await.unwrap().unwrap();
        assert_eq!(loaded.content, "final");
        assert!(loaded.edited_at.is_some());

        assert!(repo.delete_entry(e.id).await.unwrap());
        assert!(repo.get_entry(e.id).await.unwrap().is_none());
        assert!(!repo.update_entry(e.id, "gone", Utc::now()).await.unwrap());
    }
}
