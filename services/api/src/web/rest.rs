//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for verse search and profile reads, and the
//! master definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use verse_companion_core::domain::{Profile, VerseContent};
use verse_companion_core::ports::PortError;

use crate::web::auth;
use crate::web::chat;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        chat::open_today_handler,
        chat::send_message_handler,
        search_verses_handler,
        profile_handler,
    ),
    components(
        schemas(
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            chat::VersePayload,
            chat::MessagePayload,
            chat::DailyChatResponse,
            chat::SendMessageRequest,
            chat::ExchangeResponse,
            VerseSearchResult,
            SearchResponse,
            ProfileResponse,
        )
    ),
    tags(
        (name = "Verse Companion API", description = "API endpoints for the daily verse chat companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One verse in a search result. A passage spanning several verses returns
/// one entry per verse.
#[derive(Serialize, ToSchema)]
pub struct VerseSearchResult {
    pub reference: String,
    pub text: String,
    pub translation: String,
}

impl From<VerseContent> for VerseSearchResult {
    fn from(content: VerseContent) -> Self {
        Self {
            reference: content.reference,
            text: content.text,
            translation: content.translation,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SearchResponse {
    pub results: Vec<VerseSearchResult>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub current_streak: u32,
    pub last_engaged_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            current_streak: profile.current_streak,
            last_engaged_date: profile.last_engaged_date,
            created_at: profile.created_at,
        }
    }
}

#[derive(Deserialize, IntoParams)]
pub struct SearchParams {
    /// A verse reference like "John 3:16" or "Psalm 23".
    pub q: Option<String>,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// GET /verses/search - Look up a passage by reference
#[utoipa::path(
    get,
    path = "/verses/search",
    params(SearchParams),
    responses(
        (status = 200, description = "Matching verses", body = SearchResponse),
        (status = 400, description = "Missing search query"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No passage matches the query"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn search_verses_handler(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let query = params.q.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "A search query is required".to_string(),
        ));
    }

    match app_state.verses.search_passage(query).await {
        Ok(results) => {
            let results = results.into_iter().map(VerseSearchResult::from).collect();
            Ok(Json(SearchResponse { results }))
        }
        Err(PortError::NotFound(msg)) => Err((StatusCode::NOT_FOUND, msg)),
        Err(e) => {
            error!("Failed to search verses: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to search verses".to_string(),
            ))
        }
    }
}

/// GET /profile - The authenticated user's profile and streak
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The user's profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Profile not found"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match app_state.db.get_profile(user_id).await {
        Ok(profile) => Ok(Json(ProfileResponse::from(profile))),
        Err(PortError::NotFound(msg)) => Err((StatusCode::NOT_FOUND, msg)),
        Err(e) => {
            error!("Failed to load profile: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load profile".to_string(),
            ))
        }
    }
}
