//! # Domain Models
//!
//! These structs represent the core entities of Solace.
//! Posts, comments and journal entries use UUID v7 for time-ordered identification;
//! user IDs are opaque strings handed out by the identity provider.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pseudo-category that selects every post in the feed.
pub const ALL_CATEGORIES: &str = "All";

/// Categories a post may be filed under.
pub const CATEGORIES: &[&str] = &[
    "General",
    "Anxiety",
    "Depression",
    "Mindfulness",
    "Self-Care",
    "Relationships",
    "Success Stories",
];

/// Returns true if `category` is a real (filable) category.
pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

/// A member of the community, as known to the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: Option<String>,
}

impl UserProfile {
    /// Name shown next to posts and comments.
    pub fn display_name(&self) -> String {
        match (self.first_name.trim(), self.last_name.trim()) {
            ("", "") => "Anonymous".to_string(),
            (first, "") => first.to_string(),
            ("", last) => last.to_string(),
            (first, last) => format!("{first} {last}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    /// Storage representation: `1` for up, `-1` for down.
    pub fn as_i64(self) -> i64 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(VoteDirection::Up),
            -1 => Some(VoteDirection::Down),
            _ => None,
        }
    }
}

/// Toggle rule for vote buttons.
///
/// Pressing the direction you already voted retracts the vote; pressing the
/// other direction (or voting fresh) switches to it.
pub fn next_vote(current: Option<VoteDirection>, pressed: VoteDirection) -> Option<VoteDirection> {
    if current == Some(pressed) {
        None
    } else {
        Some(pressed)
    }
}

/// Result of an atomic vote toggle in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteToggle {
    /// The toggle was applied; carries the voter's resulting vote.
    Recorded(Option<VoteDirection>),
    /// The target post or comment does not exist.
    Missing,
}

/// Up/down voter sets shared by posts and comments.
///
/// A user ID is in at most one of the two sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votes {
    pub upvotes: BTreeSet<String>,
    pub downvotes: BTreeSet<String>,
}

impl Votes {
    /// Current vote of `user_id`, if any.
    pub fn vote_of(&self, user_id: &str) -> Option<VoteDirection> {
        if self.upvotes.contains(user_id) {
            Some(VoteDirection::Up)
        } else if self.downvotes.contains(user_id) {
            Some(VoteDirection::Down)
        } else {
            None
        }
    }

    /// Records `vote` for `user_id`, clearing whatever they had before.
    pub fn set(&mut self, user_id: &str, vote: Option<VoteDirection>) {
        self.upvotes.remove(user_id);
        self.downvotes.remove(user_id);
        match vote {
            Some(VoteDirection::Up) => {
                self.upvotes.insert(user_id.to_string());
            }
            Some(VoteDirection::Down) => {
                self.downvotes.insert(user_id.to_string());
            }
            None => {}
        }
    }

    /// Net score: upvotes minus downvotes.
    pub fn score(&self) -> i64 {
        self.upvotes.len() as i64 - self.downvotes.len() as i64
    }
}

/// A reply under a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub votes: Votes,
}

/// The fundamental unit of conversation in the community forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub video_url: Option<String>,
    pub category: String,
    pub author_id: String,
    /// Denormalized from the author's profile at creation time
    pub author_name: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub votes: Votes,
    /// Oldest first
    pub comments: Vec<Comment>,
    /// Starts at 1 and is bumped by every stored change to the post, its
    /// comments or any of their votes. Snapshots compare by it.
    pub version: u64,
}

impl Post {
    pub fn comment(&self, comment_id: Uuid) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }
}

/// Static catalog entry for a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    /// Repeatable badges can be earned once per calendar day
    pub repeatable: bool,
}

/// Per-user counter for a single badge. Its existence means "unlocked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementStats {
    pub count: u32,
    pub last_unlocked: DateTime<Utc>,
}

/// A pending "Achievement Unlocked" notice waiting to be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementNotification {
    pub id: i64,
    pub badge_id: String,
    pub count: u32,
    pub created_at: DateTime<Utc>,
}

/// Daily check-in streak for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInState {
    pub last_check_in: Option<NaiveDate>,
    pub streak: u32,
    pub longest_streak: u32,
}

/// A private free-text journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}
