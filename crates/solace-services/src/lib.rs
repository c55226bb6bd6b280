//! # solace-services
//!
//! Business logic of the Solace community app, written against the ports
//! in `solace-core`: forum and feed, achievements, check-ins, journal and
//! image uploads.

pub mod achievements;
pub mod checkin;
pub mod clock;
pub mod feed;
pub mod forum;
pub mod journal;
pub mod upload;
pub mod utils;

pub use achievements::{AchievementNotice, AchievementService, BadgeStatus, UnlockOutcome};
pub use checkin::{CheckInOutcome, CheckInReport, CheckInService};
pub use clock::{FixedClock, SystemClock};
pub use feed::{CommunityFeed, FeedPage, FeedState, SortOrder, PAGE_SIZE};
pub use forum::{ForumEvent, ForumService, PostDraft};
pub use journal::JournalService;
pub use upload::{ImageUpload, UploadService};

use solace_core::AppError;

/// Logs a failed port call and converts it into `AppError::Internal`.
pub(crate) fn storage_error(op: &'static str) -> impl FnOnce(anyhow::Error) -> AppError {
    move |err| {
        tracing::error!(op, error = %err, "storage call failed");
        AppError::from(err)
    }
}
