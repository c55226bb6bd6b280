//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    AchievementNotification, AchievementStats, CheckInState, Comment, JournalEntry, Post,
    UserProfile, VoteDirection, VoteToggle,
};

/// Fields of a post an author may change.
#[derive(Debug, Clone, PartialEq)]
pub struct PostContent {
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub category: String,
}

/// Document store for community posts and their comments.
///
/// Every write that changes a post, one of its comments or a vote on either
/// bumps `Post::version` in the same transaction.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait PostRepo: Send + Sync {
    // Post Operations
    async fn insert_post(&self, post: &Post) -> anyhow::Result<()>;
    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>>;
    /// All posts, oldest first.
    async fn list_posts(&self) -> anyhow::Result<Vec<Post>>;
    /// Returns false if the post does not exist.
    async fn update_post(
        &self,
        id: Uuid,
        content: &PostContent,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    /// Deletes the post together with its comments and votes.
    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool>;
    /// Applies [`next_vote`](crate::models::next_vote) to the user's stored
    /// vote as a single read-modify-write, so concurrent presses serialize.
    async fn toggle_post_vote(
        &self,
        post_id: Uuid,
        user_id: &str,
        pressed: VoteDirection,
    ) -> anyhow::Result<VoteToggle>;

    // Comment Operations
    async fn insert_comment(&self, post_id: Uuid, comment: &Comment) -> anyhow::Result<()>;
    async fn update_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> anyhow::Result<bool>;
    async fn toggle_comment_vote(
        &self,
        comment_id: Uuid,
        user_id: &str,
        pressed: VoteDirection,
    ) -> anyhow::Result<VoteToggle>;
}

/// Per-user achievement state and the pending notification queue.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait AchievementRepo: Send + Sync {
    /// All stats rows for the user, keyed by badge ID.
    async fn load_stats(&self, user_id: &str) -> anyhow::Result<Vec<(String, AchievementStats)>>;

    /// Compare-and-set write of a badge's stats.
    ///
    /// Succeeds only if the stored count still equals `previous_count`
    /// (0 meaning "no row yet"). On success a notification carrying
    /// `stats.count` is queued in the same transaction.
    async fn record_unlock(
        &self,
        user_id: &str,
        badge_id: &str,
        previous_count: u32,
        stats: &AchievementStats,
    ) -> anyhow::Result<bool>;

    /// Oldest pending notification.
    async fn next_notification(
        &self,
        user_id: &str,
    ) -> anyhow::Result<Option<AchievementNotification>>;
    async fn dismiss_notification(&self, user_id: &str, id: i64) -> anyhow::Result<bool>;
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait CheckInRepo: Send + Sync {
    async fn load_check_in(&self, user_id: &str) -> anyhow::Result<CheckInState>;
    /// Conditional write: applies only while the stored `last_check_in`
    /// still equals `expected_last` (None meaning "no row yet").
    /// Returns false when another writer got there first.
    async fn save_check_in(
        &self,
        user_id: &str,
        state: &CheckInState,
        expected_last: Option<NaiveDate>,
    ) -> anyhow::Result<bool>;
}

#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait JournalRepo: Send + Sync {
    async fn insert_entry(&self, entry: &JournalEntry) -> anyhow::Result<()>;
    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<JournalEntry>>;
    /// Entries of one user, newest first.
    async fn list_entries(&self, user_id: &str) -> anyhow::Result<Vec<JournalEntry>>;
    async fn update_entry(
        &self,
        id: Uuid,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<bool>;
}

/// Read access to profiles owned by the identity system.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_profile(&self, user_id: &str) -> anyhow::Result<Option<UserProfile>>;
    /// Used by seeding and tests only.
    async fn upsert_profile(&self, profile: &UserProfile) -> anyhow::Result<()>;
}

/// Called with integer percentages (0..=100) while an upload is in flight.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Object storage contract for community images.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Stores `data` under `key` and returns its public URL.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> anyhow::Result<String>;
}

/// Identity contract: turns bearer tokens into user IDs.
#[cfg_attr(feature = "testing", mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Mints a token for `user_id`.
    fn issue_token(&self, user_id: &str) -> String;

    /// Returns the user ID the token was issued for, or None if it does not verify.
    async fn verify_token(&self, token: &str) -> anyhow::Result<Option<String>>;
}

/// Source of "now" and of the calendar the app reasons about.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Offset used to turn instants into calendar dates.
    fn offset(&self) -> FixedOffset;

    /// Calendar date of `instant` in this clock's offset.
    fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset()).date_naive()
    }

    fn today(&self) -> NaiveDate {
        self.local_date(self.now())
    }
}
