//! # solace-api
//!
//! The HTTP routing and orchestration layer for Solace.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;

pub use error::{ApiError, ApiResult};
pub use handlers::AppState;
pub use middleware::CurrentUser;

/// Room for multipart boundaries and headers around the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Builds the `/api/v1` router.
///
/// The binary adds media serving and the outer middleware stack; keeping
/// them out of here lets tests drive the routes directly.
pub fn router(state: AppState) -> Router {
    let upload_limit = state.upload_limit + MULTIPART_OVERHEAD;

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/me", get(handlers::me))
        // Community forum
        .route("/community/categories", get(handlers::categories))
        .route(
            "/community/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/community/posts/{id}",
            get(handlers::get_post)
                .put(handlers::edit_post)
                .delete(handlers::delete_post),
        )
        .route("/community/posts/{id}/vote", post(handlers::vote_post))
        .route("/community/posts/{id}/comments", post(handlers::add_comment))
        .route(
            "/community/posts/{id}/comments/{cid}",
            put(handlers::edit_comment).delete(handlers::delete_comment),
        )
        .route(
            "/community/posts/{id}/comments/{cid}/vote",
            post(handlers::vote_comment),
        )
        .route(
            "/community/images",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Achievements
        .route("/achievements", get(handlers::achievements))
        .route(
            "/achievements/notifications/next",
            get(handlers::next_notification),
        )
        .route(
            "/achievements/notifications/{id}",
            axum::routing::delete(handlers::dismiss_notification),
        )
        // Self-care
        .route(
            "/self-care/check-in",
            get(handlers::check_in_state).post(handlers::check_in),
        )
        .route(
            "/journal",
            get(handlers::list_journal).post(handlers::create_journal),
        )
        .route(
            "/journal/{id}",
            put(handlers::update_journal).delete(handlers::delete_journal),
        );

    Router::new().nest("/api/v1", api).with_state(state)
}
