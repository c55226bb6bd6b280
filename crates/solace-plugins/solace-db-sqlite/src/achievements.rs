use async_trait::async_trait;
use solace_core::{AchievementNotification, AchievementRepo, AchievementStats};
use sqlx::Row;

use crate::SqliteStore;

fn count_from(value: i64) -> anyhow::Result<u32> {
    u32::try_from(value).map_err(|_| anyhow::anyhow!("achievement count {value} out of range"))
}

#[async_trait]
impl AchievementRepo for SqliteStore {
    async fn load_stats(&self, user_id: &str) -> anyhow::Result<Vec<(String, AchievementStats)>> {
        let rows = sqlx::query(
            "SELECT badge_id, count, last_unlocked FROM achievement_stats WHERE user_id = ? ORDER BY badge_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> anyhow::Result<(String, AchievementStats)> {
                Ok((
                    row.try_get("badge_id")?,
                    AchievementStats {
                        count: count_from(row.try_get("count")?)?,
                        last_unlocked: row.try_get("last_unlocked")?,
                    },
                ))
            })
            .collect()
    }

    /// CAS on `count`, plus the notification insert, in one transaction.
    async fn record_unlock(
        &self,
        user_id: &str,
        badge_id: &str,
        previous_count: u32,
        stats: &AchievementStats,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = if previous_count == 0 {
            sqlx::query(
                "INSERT INTO achievement_stats (user_id, badge_id, count, last_unlocked) VALUES (?, ?, ?, ?) \
                 ON CONFLICT (user_id, badge_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(badge_id)
            .bind(i64::from(stats.count))
            .bind(stats.last_unlocked)
            .execute(&mut *tx)
            .await?
        } else {
            sqlx::query(
                "UPDATE achievement_stats SET count = ?, last_unlocked = ? \
                 WHERE user_id = ? AND badge_id = ? AND count = ?",
            )
            .bind(i64::from(stats.count))
            .bind(stats.last_unlocked)
            .bind(user_id)
            .bind(badge_id)
            .bind(i64::from(previous_count))
            .execute(&mut *tx)
            .await?
        };

        if result.rows_affected() != 1 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO achievement_notifications (user_id, badge_id, count, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(badge_id)
        .bind(i64::from(stats.count))
        .bind(stats.last_unlocked)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn next_notification(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Option<AchievementNotification>> {
        let row = sqlx::query(
            "SELECT id, badge_id, count, created_at FROM achievement_notifications \
             WHERE user_id = ? ORDER BY id LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| -> anyhow::Result<AchievementNotification> {
            Ok(AchievementNotification {
                id: row.try_get("id")?,
                badge_id: row.try_get("badge_id")?,
                count: count_from(row.try_get("count")?)?,
                created_at: row.try_get("created_at")?,
            })
        })
        .transpose()
    }

    async fn dismiss_notification(&self, user_id: &str, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM achievement_notifications WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn stats(count: u32) -> AchievementStats {
        AchievementStats {
            count,
            last_unlocked: Utc.with_ymd_and_hms(2024, 3, count, 12, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_first_unlock_is_insert_once() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        assert!(repo.record_unlock("u1", "first-post", 0, &stats(1)).await.unwrap());
        assert!(!repo.record_unlock("u1", "first-post", 0, &stats(1)).await.unwrap());

        let loaded = repo.load_stats("u1").await.unwrap();
        assert_eq!(loaded, vec![("first-post".to_string(), stats(1))]);
        assert!(repo.load_stats("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_count_is_rejected() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        repo.record_unlock("u1", "daily-check-in", 0, &stats(1)).await.unwrap();
        assert!(repo.record_unlock("u1", "daily-check-in", 1, &stats(2)).await.unwrap());
        assert!(!repo.record_unlock("u1", "daily-check-in", 1, &stats(2)).await.unwrap());

        let loaded = repo.load_stats("u1").await.unwrap();
        assert_eq!(loaded[0].1.count, 2);
    }

    #[tokio::test]
    async fn test_notifications_queue_in_order() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        repo.record_unlock("u1", "first-post", 0, &stats(1)).await.unwrap();
        repo.record_unlock("u1", "first-comment", 0, &stats(1)).await.unwrap();
        // A failed CAS must not leave a notification behind.
        repo.record_unlock("u1", "first-post", 0, &stats(1)).await.unwrap();

        let first = repo.next_notification("u1").await.unwrap().unwrap();
        assert_eq!(first.badge_id, "first-post");
        assert!(!repo.dismiss_notification("someone-else", first.id).await.unwrap());
        assert!(repo.dismiss_notification("u1", first.id).await.unwrap());

        let second = repo.next_notification("u1").await.unwrap().unwrap();
        assert_eq!(second.badge_id, "first-comment");
        repo.dismiss_notification("u1", second.id).await.unwrap();
        assert!(repo.next_notification("u1").await.unwrap().is_none());
    }
}
