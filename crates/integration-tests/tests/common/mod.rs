//! Shared fixtures: every test gets its own in-memory database and media dir.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use solace_api::AppState;
use solace_auth_simple::SimpleAuthProvider;
use solace_core::{UserProfile, UserRepo};
use solace_db_sqlite::SqliteStore;
use solace_services::{
    AchievementService, CheckInService, FixedClock, ForumService, JournalService, UploadService,
};
use solace_storage_local::LocalMediaStore;
use tempfile::TempDir;

pub const UPLOAD_LIMIT: usize = 64 * 1024;

pub struct Harness {
    pub store: Arc<SqliteStore>,
    pub clock: Arc<FixedClock>,
    pub auth: Arc<SimpleAuthProvider>,
    /// Deleted when the harness drops.
    pub media_dir: TempDir,
    pub state: AppState,
}

impl Harness {
    pub fn media_root(&self) -> &Path {
        self.media_dir.path()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap()
}

pub fn profile(id: &str, first: &str, last: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        photo_url: None,
    }
}

pub fn ana() -> UserProfile {
    profile("ana", "Ana", "Rivera")
}

pub fn sam() -> UserProfile {
    profile("sam", "Sam", "Okafor")
}

pub async fn harness() -> Harness {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let clock = Arc::new(FixedClock::new(start_time()));
    let auth = Arc::new(SimpleAuthProvider::new("integration-secret").unwrap());
    let media_dir = TempDir::new().unwrap();
    let media = Arc::new(LocalMediaStore::new(media_dir.path(), "/media"));

    for user in [ana(), sam()] {
        store.upsert_profile(&user).await.unwrap();
    }

    let achievements = Arc::new(AchievementService::new(store.clone(), clock.clone()));
    let state = AppState {
        forum: Arc::new(
            ForumService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        check_ins: Arc::new(
            CheckInService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        journal: Arc::new(
            JournalService::new(store.clone(), clock.clone()).with_achievements(achievements.clone()),
        ),
        uploads: Arc::new(
            UploadService::new(media, clock.clone()).with_max_bytes(UPLOAD_LIMIT),
        ),
        achievements,
        users: store.clone(),
        auth: auth.clone(),
        clock: clock.clone(),
        upload_limit: UPLOAD_LIMIT,
    };

    Harness {
        store,
        clock,
        auth,
        media_dir,
        state,
    }
}
