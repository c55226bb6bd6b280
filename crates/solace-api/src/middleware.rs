//! Authentication, tracing and response-header middleware.

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use solace_core::{AppError, UserProfile};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::ApiError;
use crate::handlers::AppState;

/// The signed-in user, resolved from `Authorization: Bearer <token>`.
///
/// Users without a stored profile get an empty one and show up as "Anonymous".
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserProfile);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;

        let user_id = state
            .auth
            .verify_token(token)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::Unauthorized("invalid or expired token".to_string()))?;

        let profile = state
            .users
            .get_profile(&user_id)
            .await
            .map_err(AppError::from)?
            .unwrap_or_else(|| UserProfile {
                id: user_id,
                first_name: String::new(),
                last_name: String::new(),
                photo_url: None,
            });

        tracing::debug!(user_id = %profile.id, "request authenticated");
        Ok(CurrentUser(profile))
    }
}

/// Request/response tracing at INFO.
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Important if the web client and the API are served from different origins.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Stops browsers from sniffing uploaded media into something executable.
pub fn nosniff() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"))
}
