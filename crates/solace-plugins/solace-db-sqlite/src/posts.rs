//! Mapping between the posts/comments/votes tables and `Post` documents.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solace_core::{
    next_vote, Comment, Post, PostContent, PostRepo, VoteDirection, VoteToggle, Votes,
};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{decode_direction, SqliteStore};

const POST_COLUMNS: &str = "id, title, content, image_url, video_url, category, author_id, \
     author_name, created_at, edited_at, version";
const COMMENT_COLUMNS: &str = "id, post_id, text, author_id, author_name, created_at, edited_at";

fn post_from_row(row: &SqliteRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        image_url: row.try_get("image_url")?,
        video_url: row.try_get("video_url")?,
        category: row.try_get("category")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        created_at: row.try_get("created_at")?,
        edited_at: row.try_get("edited_at")?,
        votes: Votes::default(),
        comments: Vec::new(),
        version: u64::try_from(row.try_get::<i64, _>("version")?)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
    })
}

/// Returns the owning post ID alongside the comment.
fn comment_from_row(row: &SqliteRow) -> Result<(Uuid, Comment), sqlx::Error> {
    Ok((
        row.try_get("post_id")?,
        Comment {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            author_id: row.try_get("author_id")?,
            author_name: row.try_get("author_name")?,
            created_at: row.try_get("created_at")?,
            edited_at: row.try_get("edited_at")?,
            votes: Votes::default(),
        },
    ))
}

/// Groups `(target_id, user_id, direction)` rows into per-target vote sets.
fn collect_votes(rows: Vec<SqliteRow>, id_column: &str) -> anyhow::Result<HashMap<Uuid, Votes>> {
    let mut votes: HashMap<Uuid, Votes> = HashMap::new();
    for row in rows {
        let target: Uuid = row.try_get(id_column)?;
        let user_id: String = row.try_get("user_id")?;
        let direction = decode_direction(row.try_get("direction")?)?;
        votes.entry(target).or_default().set(&user_id, Some(direction));
    }
    Ok(votes)
}

fn assemble(
    mut posts: Vec<Post>,
    mut post_votes: HashMap<Uuid, Votes>,
    comments: Vec<(Uuid, Comment)>,
    mut comment_votes: HashMap<Uuid, Votes>,
) -> Vec<Post> {
    let mut by_post: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for (post_id, mut comment) in comments {
        comment.votes = comment_votes.remove(&comment.id).unwrap_or_default();
        by_post.entry(post_id).or_default().push(comment);
    }
    for post in &mut posts {
        post.votes = post_votes.remove(&post.id).unwrap_or_default();
        post.comments = by_post.remove(&post.id).unwrap_or_default();
    }
    posts
}

#[async_trait]
impl PostRepo for SqliteStore {
    async fn insert_post(&self, post: &Post) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(&post.video_url)
        .bind(&post.category)
        .bind(&post.author_id)
        .bind(&post.author_name)
        .bind(post.created_at)
        .bind(post.edited_at)
        .bind(i64::try_from(post.version)?)
        .execute(&mut *tx)
        .await?;

        // New posts normally arrive empty, but imports may carry votes and comments.
        for (user_id, direction) in post
            .votes
            .upvotes
            .iter()
            .map(|u| (u, VoteDirection::Up))
            .chain(post.votes.downvotes.iter().map(|u| (u, VoteDirection::Down)))
        {
            sqlx::query("INSERT INTO post_votes (post_id, user_id, direction) VALUES (?, ?, ?)")
                .bind(post.id)
                .bind(user_id)
                .bind(direction.as_i64())
                .execute(&mut *tx)
                .await?;
        }
        for comment in &post.comments {
            insert_comment_row(&mut tx, post.id, comment).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> anyhow::Result<Option<Post>> {
        // One transaction so the version matches the rows read with it.
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let post = post_from_row(&row)?;

        let post_votes = collect_votes(
            sqlx::query("SELECT post_id, user_id, direction FROM post_votes WHERE post_id = ?")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?,
            "post_id",
        )?;
        let comments = sqlx::query(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = ? ORDER BY rowid"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(comment_from_row)
        .collect::<Result<Vec<_>, _>>()?;
        let comment_votes = collect_votes(
            sqlx::query(
                "SELECT v.comment_id, v.user_id, v.direction FROM comment_votes v \
                 JOIN comments c ON c.id = v.comment_id WHERE c.post_id = ?",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await?,
            "comment_id",
        )?;

        tx.commit().await?;

        Ok(assemble(vec![post], post_votes, comments, comment_votes).pop())
    }

    async fn list_posts(&self) -> anyhow::Result<Vec<Post>> {
        let mut tx = self.pool.begin().await?;
        let posts = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts ORDER BY rowid"))
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(post_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let post_votes = collect_votes(
            sqlx::query("SELECT post_id, user_id, direction FROM post_votes")
                .fetch_all(&mut *tx)
                .await?,
            "post_id",
        )?;
        let comments = sqlx::query(&format!("SELECT {COMMENT_COLUMNS} FROM comments ORDER BY rowid"))
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(comment_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        let comment_votes = collect_votes(
            sqlx::query("SELECT comment_id, user_id, direction FROM comment_votes")
                .fetch_all(&mut *tx)
                .await?,
            "comment_id",
        )?;

        tx.commit().await?;

        Ok(assemble(posts, post_votes, comments, comment_votes))
    }

    async fn update_post(
        &self,
        id: Uuid,
        content: &PostContent,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE posts SET title = ?, content = ?, image_url = ?, video_url = ?, category = ?, edited_at = ?, \
             version = version + 1 WHERE id = ?",
        )
        .bind(&content.title)
        .bind(&content.content)
        .bind(&content.image_url)
        .bind(&content.video_url)
        .bind(&content.category)
        .bind(edited_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_post(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn toggle_post_vote(
        &self,
        post_id: Uuid,
        user_id: &str,
        pressed: VoteDirection,
    ) -> anyhow::Result<VoteToggle> {
        let mut tx = self.pool.begin().await?;
        // Writing first takes the database write lock, so the read below cannot go stale.
        let bumped = sqlx::query("UPDATE posts SET version = version + 1 WHERE id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        if bumped.rows_affected() == 0 {
            return Ok(VoteToggle::Missing);
        }

        let current: Option<i64> =
            sqlx::query_scalar("SELECT direction FROM post_votes WHERE post_id = ? AND user_id = ?")
                .bind(post_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        let vote = next_vote(current.map(decode_direction).transpose()?, pressed);
        match vote {
            Some(direction) => {
                sqlx::query(
                    "INSERT INTO post_votes (post_id, user_id, direction) VALUES (?, ?, ?) \
                     ON CONFLICT (post_id, user_id) DO UPDATE SET direction = excluded.direction",
                )
                .bind(post_id)
                .bind(user_id)
                .bind(direction.as_i64())
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM post_votes WHERE post_id = ? AND user_id = ?")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(VoteToggle::Recorded(vote))
    }

    async fn insert_comment(&self, post_id: Uuid, comment: &Comment) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        bump_version(&mut tx, post_id).await?;
        insert_comment_row(&mut tx, post_id, comment).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result =
            sqlx::query("UPDATE comments SET text = ?, edited_at = ? WHERE id = ? AND post_id = ?")
                .bind(text)
                .bind(edited_at)
                .bind(comment_id)
                .bind(post_id)
                .execute(&mut *tx)
                .await?;
        if result.rows_affected() != 1 {
            return Ok(false);
        }
        bump_version(&mut tx, post_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM comments WHERE id = ? AND post_id = ?")
            .bind(comment_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() != 1 {
            return Ok(false);
        }
        bump_version(&mut tx, post_id).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn toggle_comment_vote(
        &self,
        comment_id: Uuid,
        user_id: &str,
        pressed: VoteDirection,
    ) -> anyhow::Result<VoteToggle> {
        let mut tx = self.pool.begin().await?;
        let bumped = sqlx::query(
            "UPDATE posts SET version = version + 1 \
             WHERE id = (SELECT post_id FROM comments WHERE id = ?)",
        )
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;
        if bumped.rows_affected() == 0 {
            return Ok(VoteToggle::Missing);
        }

        let current: Option<i64> = sqlx::query_scalar(
            "SELECT direction FROM comment_votes WHERE comment_id = ? AND user_id = ?",
        )
        .bind(comment_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let vote = next_vote(current.map(decode_direction).transpose()?, pressed);
        match vote {
            Some(direction) => {
                sqlx::query(
                    "INSERT INTO comment_votes (comment_id, user_id, direction) VALUES (?, ?, ?) \
                     ON CONFLICT (comment_id, user_id) DO UPDATE SET direction = excluded.direction",
                )
                .bind(comment_id)
                .bind(user_id)
                .bind(direction.as_i64())
                .execute(&mut *tx)
                .await?;
            }
            None => {
                sqlx::query("DELETE FROM comment_votes WHERE comment_id = ? AND user_id = ?")
                    .bind(comment_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(VoteToggle::Recorded(vote))
    }
}

async fn bump_version(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query("UPDATE posts SET version = version + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn insert_comment_row(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: Uuid,
    comment: &Comment,
) -> anyhow::Result<()> {
    sqlx::query(&format!(
        "INSERT INTO comments ({COMMENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(comment.id)
    .bind(post_id)
    .bind(&comment.text)
    .bind(&comment.author_id)
    .bind(&comment.author_name)
    .bind(comment.created_at)
    .bind(comment.edited_at)
    .execute(&mut **tx)
    .await?;

    for (user_id, direction) in comment
        .votes
        .upvotes
        .iter()
        .map(|u| (u, VoteDirection::Up))
        .chain(comment.votes.downvotes.iter().map(|u| (u, VoteDirection::Down)))
    {
        sqlx::query("INSERT INTO comment_votes (comment_id, user_id, direction) VALUES (?, ?, ?)")
            .bind(comment.id)
            .bind(user_id)
            .bind(direction.as_i64())
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
