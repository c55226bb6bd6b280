//! User profiles and check-in streaks, both keyed by user ID.

use async_trait::async_trait;
use chrono::NaiveDate;
use solace_core::{CheckInRepo, CheckInState, UserProfile, UserRepo};
use sqlx::Row;

use crate::SqliteStore;

#[async_trait]
impl UserRepo for SqliteStore {
    async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>> {
        let row = sqlx::query("SELECT id, first_name, last_name, photo_url FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(UserProfile {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                photo_url: row.try_get("photo_url")?,
            })),
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, photo_url) VALUES (?, ?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET first_name = excluded.first_name, \
             last_name = excluded.last_name, photo_url = excluded.photo_url",
        )
        .bind(&profile.id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.photo_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CheckInRepo for SqliteStore {
    async fn load_check_in(&self, user_id: &str) -> anyhow::Result<CheckInState> {
        let row = sqlx::query(
            "SELECT last_check_in, streak, longest_streak FROM check_ins WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(CheckInState::default());
        };
        Ok(CheckInState {
            last_check_in: row.try_get("last_check_in")?,
            streak: u32::try_from(row.try_get::<i64, _>("streak")?)?,
            longest_streak: u32::try_from(row.try_get::<i64, _>("longest_streak")?)?,
        })
    }

    async fn save_check_in(
        &self,
        user_id: &str,
        state: &CheckInState,
        expected_last: Option<NaiveDate>,
    ) -> anyhow::Result<bool> {
        let result = match expected_last {
            None => {
                sqlx::query(
                    "INSERT INTO check_ins (user_id, last_check_in, streak, longest_streak) VALUES (?, ?, ?, ?) \
                     ON CONFLICT (user_id) DO UPDATE SET last_check_in = excluded.last_check_in, \
                     streak = excluded.streak, longest_streak = excluded.longest_streak \
                     WHERE check_ins.last_check_in IS NULL",
                )
                .bind(user_id)
                .bind(state.last_check_in)
                .bind(i64::from(state.streak))
                .bind(i64::from(state.longest_streak))
                .execute(&self.pool)
                .await?
            }
            Some(last) => {
                sqlx::query(
                    "UPDATE check_ins SET last_check_in = ?, streak = ?, longest_streak = ? \
                     WHERE user_id = ? AND last_check_in = ?",
                )
                .bind(state.last_check_in)
                .bind(i64::from(state.streak))
                .bind(i64::from(state.longest_streak))
                .bind(user_id)
                .bind(last)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_profile_upsert_overwrites() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        let mut profile = UserProfile {
            id: "u1".to_string(),
            first_name: "Rae".to_string(),
            last_name: "Lin".to_string(),
            photo_url: None,
        };
        repo.upsert_profile(&profile).await.unwrap();
        profile.photo_url = Some("https://img.example/rae.png".to_string());
        repo.upsert_profile(&profile).await.unwrap();

        assert_eq!(repo.get_profile("u1").await.unwrap(), Some(profile));
        assert_eq!(repo.get_profile("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_check_in_defaults_then_persists() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        assert_eq!(repo.load_check_in("u1").await.unwrap(), CheckInState::default());

        let state = CheckInState {
            last_check_in: NaiveDate::from_ymd_opt(2024, 8, 14),
            streak: 3,
            longest_streak: 9,
        };
        assert!(repo.save_check_in("u1", &state, None).await.unwrap());
        assert_eq!(repo.load_check_in("u1").await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_check_in_save_is_conditional_on_previous_date() {
        let repo = SqliteStore::new("sqlite::memory:").await.unwrap();
        let first = CheckInState {
            last_check_in: NaiveDate::from_ymd_opt(2024, 8, 14),
            streak: 1,
            longest_streak: 1,
        };
        assert!(repo.save_check_in("u1", &first, None).await.unwrap());
        // A second "first ever" check-in lost the race.
        assert!(!repo.save_check_in("u1", &first, None).await.unwrap());

        let next = CheckInState {
            last_check_in: NaiveDate::from_ymd_opt(2024, 8, 15),
            streak: 2,
            longest_streak: 2,
        };
        let stale = NaiveDate::from_ymd_opt(2024, 8, 13);
        assert!(!repo.save_check_in("u1", &next, stale).await.unwrap());
        assert_eq!(repo.load_check_in("u1").await.unwrap(), first);

        assert!(repo.save_check_in("u1", &next, first.last_check_in).await.unwrap());
        assert_eq!(repo.load_check_in("u1").await.unwrap(), next);
    }
}
