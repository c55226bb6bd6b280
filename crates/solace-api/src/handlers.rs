//! # solace-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the services.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use solace_core::{
    is_known_category, AppError, AuthProvider, Clock, Post, ProgressFn, UserRepo,
    VoteDirection, ALL_CATEGORIES, CATEGORIES,
};
use solace_services::utils::time_ago;
use solace_services::{
    AchievementService, CheckInService, CommunityFeed, FeedPage, ForumService, ImageUpload,
    JournalService, PostDraft, SortOrder, UploadService,
};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentUser;

/// State shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub forum: Arc<ForumService>,
    pub achievements: Arc<AchievementService>,
    pub check_ins: Arc<CheckInService>,
    pub journal: Arc<JournalService>,
    pub uploads: Arc<UploadService>,
    pub users: Arc<dyn UserRepo>,
    pub auth: Arc<dyn AuthProvider>,
    pub clock: Arc<dyn Clock>,
    /// Request body ceiling for image uploads
    pub upload_limit: usize,
}

/// A post as the client displays it.
#[derive(Debug, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub score: i64,
    pub comment_count: usize,
    pub time_ago: String,
}

impl PostView {
    fn new(post: Post, now: DateTime<Utc>) -> Self {
        Self {
            score: post.votes.score(),
            comment_count: post.comments.len(),
            time_ago: time_ago(post.created_at, now),
            post,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedResponse {
    pub posts: Vec<PostView>,
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub focused_post_id: Option<Uuid>,
}

impl FeedResponse {
    fn new(page: FeedPage, now: DateTime<Utc>) -> Self {
        Self {
            posts: page.posts.into_iter().map(|p| PostView::new(p, now)).collect(),
            page: page.page,
            total_pages: page.total_pages,
            total_items: page.total_items,
            focused_post_id: page.focused_post_id,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
    /// Deep link: jump to the page holding this post
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct JournalRequest {
    pub content: String,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<serde_json::Value> {
    Json(json!({
        "profile": &user,
        "display_name": user.display_name(),
    }))
}

pub async fn categories(_user: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "all": ALL_CATEGORIES, "categories": CATEGORIES }))
}

// ── Community ───────────────────────────────────────────────────────────────

/// Filter, search, sort and page the feed; `post_id` overrides `page`.
pub async fn list_posts(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> ApiResult<Json<FeedResponse>> {
    let mut feed = CommunityFeed::new(state.forum.list_posts().await?);
    let view = feed.state_mut();

    if let Some(category) = query.category {
        if category != ALL_CATEGORIES && !is_known_category(&category) {
            return Err(AppError::ValidationError(format!("unknown category '{category}'")).into());
        }
        view.set_category(category);
    }
    if let Some(search) = query.search {
        view.set_search(search);
    }
    if let Some(sort) = query.sort {
        view.set_sort(sort.parse::<SortOrder>().map_err(AppError::ValidationError)?);
    }
    if let Some(page) = query.page {
        view.set_page(page);
    }
    if let Some(post_id) = query.post_id {
        if !feed.focus(post_id) {
            tracing::debug!(%post_id, "deep-linked post is not in the current view");
        }
    }

    Ok(Json(FeedResponse::new(feed.render(), state.clock.now())))
}

pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(draft): ApiJson<PostDraft>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    let post = state.forum.create_post(&user, draft).await?;
    Ok((StatusCode::CREATED, Json(PostView::new(post, state.clock.now()))))
}

pub async fn get_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<Json<PostView>> {
    let post = state.forum.get_post(post_id).await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

pub async fn edit_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(draft): ApiJson<PostDraft>,
) -> ApiResult<Json<PostView>> {
    let post = state.forum.edit_post(&user, post_id, draft).await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.forum.delete_post(&user, post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn vote_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(vote): ApiJson<VoteRequest>,
) -> ApiResult<Json<PostView>> {
    let post = state.forum.toggle_post_vote(&user, post_id, vote.direction).await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(post_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> ApiResult<Response> {
    let comment = state.forum.add_comment(&user, post_id, &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn edit_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<CommentRequest>,
) -> ApiResult<Json<PostView>> {
    let post = state
        .forum
        .edit_comment(&user, post_id, comment_id, &body.text)
        .await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<PostView>> {
    let post = state.forum.delete_comment(&user, post_id, comment_id).await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

pub async fn vote_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath((post_id, comment_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(vote): ApiJson<VoteRequest>,
) -> ApiResult<Json<PostView>> {
    let post = state
        .forum
        .toggle_comment_vote(&user, post_id, comment_id, vote.direction)
        .await?;
    Ok(Json(PostView::new(post, state.clock.now())))
}

/// Accepts the first `file` field of a multipart form.
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?;

        let progress: ProgressFn = Arc::new(|percent: u8| {
            tracing::trace!(percent, "upload progress");
        });
        let upload = ImageUpload {
            file_name,
            content_type,
            data,
        };
        let url = state.uploads.upload(&user.id, upload, progress).await?;
        return Ok((StatusCode::CREATED, Json(json!({ "url": url }))));
    }
    Err(AppError::ValidationError("the form has no 'file' field".to_string()).into())
}

// ── Achievements ────────────────────────────────────────────────────────────

pub async fn achievements(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let summary = state.achievements.summary(&user.id).await?;
    Ok(Json(summary).into_response())
}

/// 204 when nothing is waiting.
pub async fn next_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    match state.achievements.next_notification(&user.id).await? {
        Some(notice) => Ok(Json(notice).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub async fn dismiss_notification(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    state.achievements.dismiss_notification(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ── Self-care ───────────────────────────────────────────────────────────────

pub async fn check_in_state(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let current = state.check_ins.state(&user.id).await?;
    Ok(Json(current).into_response())
}

pub async fn check_in(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let report = state.check_ins.check_in(&user.id).await?;
    Ok(Json(report).into_response())
}

pub async fn list_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<Response> {
    let entries = state.journal.list(&user.id).await?;
    Ok(Json(entries).into_response())
}

pub async fn create_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<JournalRequest>,
) -> ApiResult<Response> {
    let entry = state.journal.create(&user.id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(entry)).into_response())
}

pub async fn update_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<JournalRequest>,
) -> ApiResult<Response> {
    let entry = state.journal.update(&user.id, id, &body.content).await?;
    Ok(Json(entry).into_response())
}

pub async fn delete_journal(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<StatusCode> {
    state.journal.delete(&user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
