//! # Forum
//!
//! Post and comment operations for the community forum.
//!
//! Every successful write re-reads the stored document and broadcasts it as a
//! `ForumEvent`, which is how mirrors such as `CommunityFeed` learn about it.

use std::sync::Arc;

use serde::Deserialize;
use solace_core::{
    is_known_category, AppError, Clock, Comment, Post, PostContent, PostRepo, Result,
    UserProfile, VoteDirection, VoteToggle, Votes,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::achievements::{badges, AchievementService};
use crate::storage_error;

/// Buffered events per subscriber before it lags.
const EVENT_CAPACITY: usize = 256;

/// Change notifications for the post collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ForumEvent {
    PostCreated(Post),
    PostUpdated(Post),
    PostDeleted(Uuid),
}

/// Author input for creating or editing a post.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    pub category: String,
}

fn optional_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

impl PostDraft {
    /// Trims and checks the draft.
    pub fn validate(self) -> Result<PostContent> {
        let title = self.title.trim().to_string();
        let content = self.content.trim().to_string();
        if title.is_empty() || content.is_empty() {
            return Err(AppError::ValidationError(
                "a post needs both a title and some content".to_string(),
            ));
        }
        if !is_known_category(&self.category) {
            return Err(AppError::ValidationError(format!(
                "unknown category '{}'",
                self.category
            )));
        }
        Ok(PostContent {
            title,
            content,
            image_url: optional_url(self.image_url),
            video_url: optional_url(self.video_url),
            category: self.category,
        })
    }
}

fn comment_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::ValidationError("comment text is empty".to_string()));
    }
    Ok(text.to_string())
}

pub struct ForumService {
    posts: Arc<dyn PostRepo>,
    clock: Arc<dyn Clock>,
    achievements: Option<Arc<AchievementService>>,
    events: broadcast::Sender<ForumEvent>,
}

impl ForumService {
    pub fn new(posts: Arc<dyn PostRepo>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            posts,
            clock,
            achievements: None,
            events,
        }
    }

    /// Awards forum badges (first post, first comment, first upvote) as a side effect.
    pub fn with_achievements(mut self, achievements: Arc<AchievementService>) -> Self {
        self.achievements = Some(achievements);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ForumEvent> {
        self.events.subscribe()
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.posts
            .list_posts()
            .await
            .map_err(storage_error("list_posts"))
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post> {
        self.posts
            .get_post(id)
            .await
            .map_err(storage_error("get_post"))?
            .ok_or_else(|| AppError::not_found("Post", id))
    }

    #[tracing::instrument(skip(self, actor, draft), fields(user_id = %actor.id))]
    pub async fn create_post(&self, actor: &UserProfile, draft: PostDraft) -> Result<Post> {
        let content = draft.validate()?;
        let post = Post {
            id: Uuid::now_v7(),
            title: content.title,
            content: content.content,
            image_url: content.image_url,
            video_url: content.video_url,
            category: content.category,
            author_id: actor.id.clone(),
            author_name: actor.display_name(),
            created_at: self.clock.now(),
            edited_at: None,
            votes: Votes::default(),
            comments: Vec::new(),
            version: 1,
        };

        self.posts
            .insert_post(&post)
            .await
            .map_err(storage_error("insert_post"))?;
        tracing::info!(post_id = %post.id, category = %post.category, "post created");

        self.publish(ForumEvent::PostCreated(post.clone()));
        self.award(&actor.id, badges::FIRST_POST).await;
        Ok(post)
    }

    #[tracing::instrument(skip(self, actor, draft), fields(user_id = %actor.id))]
    pub async fn edit_post(&self, actor: &UserProfile, post_id: Uuid, draft: PostDraft) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        ensure_author(actor, &post.author_id, "post")?;
        let content = draft.validate()?;

        let updated = self
            .posts
            .update_post(post_id, &content, self.clock.now())
            .await
            .map_err(storage_error("update_post"))?;
        if !updated {
            return Err(AppError::not_found("Post", post_id));
        }
        self.echo(post_id).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn delete_post(&self, actor: &UserProfile, post_id: Uuid) -> Result<()> {
        let post = self.get_post(post_id).await?;
        ensure_author(actor, &post.author_id, "post")?;

        let deleted = self
            .posts
            .delete_post(post_id)
            .await
            .map_err(storage_error("delete_post"))?;
        if !deleted {
            return Err(AppError::not_found("Post", post_id));
        }
        tracing::info!("post deleted");
        self.publish(ForumEvent::PostDeleted(post_id));
        Ok(())
    }

    /// Presses a vote button on a post; see [`solace_core::next_vote`] for
    /// the toggle rule. The store applies it atomically.
    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn toggle_post_vote(
        &self,
        actor: &UserProfile,
        post_id: Uuid,
        pressed: VoteDirection,
    ) -> Result<Post> {
        let toggled = self
            .posts
            .toggle_post_vote(post_id, &actor.id, pressed)
            .await
            .map_err(storage_error("toggle_post_vote"))?;
        let VoteToggle::Recorded(vote) = toggled else {
            return Err(AppError::not_found("Post", post_id));
        };
        tracing::debug!(?vote, "post vote recorded");

        if vote == Some(VoteDirection::Up) {
            self.award(&actor.id, badges::KIND_HEART).await;
        }
        self.echo(post_id).await
    }

    #[tracing::instrument(skip(self, actor, text), fields(user_id = %actor.id))]
    pub async fn add_comment(&self, actor: &UserProfile, post_id: Uuid, text: &str) -> Result<Comment> {
        let text = comment_text(text)?;
        self.get_post(post_id).await?;

        let comment = Comment {
            id: Uuid::now_v7(),
            text,
            author_id: actor.id.clone(),
            author_name: actor.display_name(),
            created_at: self.clock.now(),
            edited_at: None,
            votes: Votes::default(),
        };
        self.posts
            .insert_comment(post_id, &comment)
            .await
            .map_err(storage_error("insert_comment"))?;
        tracing::info!(comment_id = %comment.id, "comment added");

        self.echo(post_id).await?;
        self.award(&actor.id, badges::FIRST_COMMENT).await;
        Ok(comment)
    }

    #[tracing::instrument(skip(self, actor, text), fields(user_id = %actor.id))]
    pub async fn edit_comment(
        &self,
        actor: &UserProfile,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
    ) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        let comment = post
            .comment(comment_id)
            .ok_or_else(|| AppError::not_found("Comment", comment_id))?;
        ensure_author(actor, &comment.author_id, "comment")?;
        let text = comment_text(text)?;

        let updated = self
            .posts
            .update_comment(post_id, comment_id, &text, self.clock.now())
            .await
            .map_err(storage_error("update_comment"))?;
        if !updated {
            return Err(AppError::not_found("Comment", comment_id));
        }
        self.echo(post_id).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn delete_comment(
        &self,
        actor: &UserProfile,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        let comment = post
            .comment(comment_id)
            .ok_or_else(|| AppError::not_found("Comment", comment_id))?;
        ensure_author(actor, &comment.author_id, "comment")?;

        let deleted = self
            .posts
            .delete_comment(post_id, comment_id)
            .await
            .map_err(storage_error("delete_comment"))?;
        if !deleted {
            return Err(AppError::not_found("Comment", comment_id));
        }
        self.echo(post_id).await
    }

    #[tracing::instrument(skip(self, actor), fields(user_id = %actor.id))]
    pub async fn toggle_comment_vote(
        &self,
        actor: &UserProfile,
        post_id: Uuid,
        comment_id: Uuid,
        pressed: VoteDirection,
    ) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        if post.comment(comment_id).is_none() {
            return Err(AppError::not_found("Comment", comment_id));
        }

        let toggled = self
            .posts
            .toggle_comment_vote(comment_id, &actor.id, pressed)
            .await
            .map_err(storage_error("toggle_comment_vote"))?;
        let VoteToggle::Recorded(vote) = toggled else {
            return Err(AppError::not_found("Comment", comment_id));
        };
        tracing::debug!(?vote, "comment vote recorded");
        self.echo(post_id).await
    }

    /// Re-reads a post after a write and broadcasts it.
    async fn echo(&self, post_id: Uuid) -> Result<Post> {
        let post = self.get_post(post_id).await?;
        self.publish(ForumEvent::PostUpdated(post.clone()));
        Ok(post)
    }

    fn publish(&self, event: ForumEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    async fn award(&self, user_id: &str, badge_id: &str) {
        if let Some(achievements) = &self.achievements {
            achievements.award(user_id, badge_id).await;
        }
    }
}

fn ensure_author(actor: &UserProfile, author_id: &str, what: &str) -> Result<()> {
    if actor.id == author_id {
        Ok(())
    } else {
        tracing::warn!(user_id = %actor.id, author_id, "refused to modify another user's {what}");
        Err(AppError::Forbidden(format!("only the author can modify this {what}")))
    }
}
