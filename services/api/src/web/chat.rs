//! services/api/src/web/chat.rs
//!
//! HTTP surface for the daily chat: opening today's conversation and sending
//! a message. Handlers resolve the client's calendar day, then run the flow
//! in a detached task so a dropped connection cannot abandon a half-finished
//! write sequence.

use axum::{
    extract::{Extension, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use verse_companion_core::domain::{DailyVerse, Message};
use verse_companion_core::ports::PortError;

use crate::web::chat_flow::{self, DailyChat, Exchange};
use crate::web::state::AppState;

/// Clients send their local calendar day here so "today" follows the user's
/// timezone, not the server's.
pub const CLIENT_DATE_HEADER: &str = "x-client-date";

/// The calendar day this request belongs to.
///
/// Reads `x-client-date` as `YYYY-MM-DD`; a missing or malformed header falls
/// back to the server's local date.
fn effective_today(headers: &HeaderMap) -> NaiveDate {
    headers
        .get(CLIENT_DATE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok())
        .unwrap_or_else(|| Local::now().date_naive())
}

fn port_error_response(e: PortError, action: &str) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(msg) => {
            error!("{} failed: {}", action, msg);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("{} failed", action))
        }
    }
}

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct VersePayload {
    pub reference: String,
    pub text: String,
    pub translation: String,
    pub assigned_date: NaiveDate,
}

impl From<DailyVerse> for VersePayload {
    fn from(verse: DailyVerse) -> Self {
        Self {
            reference: verse.reference,
            text: verse.text,
            translation: verse.translation,
            assigned_date: verse.assigned_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct MessagePayload {
    pub id: Uuid,
    pub content: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub conversation_date: NaiveDate,
}

impl From<Message> for MessagePayload {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            content: message.content,
            role: message.role.as_str().to_string(),
            created_at: message.created_at,
            conversation_date: message.conversation_date,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DailyChatResponse {
    pub verse: VersePayload,
    pub current_streak: u32,
    pub messages: Vec<MessagePayload>,
}

impl From<DailyChat> for DailyChatResponse {
    fn from(chat: DailyChat) -> Self {
        Self {
            verse: chat.verse.into(),
            current_streak: chat.current_streak,
            messages: chat.messages.into_iter().map(MessagePayload::from).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExchangeResponse {
    pub user_message: MessagePayload,
    pub assistant_message: MessagePayload,
}

impl From<Exchange> for ExchangeResponse {
    fn from(exchange: Exchange) -> Self {
        Self {
            user_message: exchange.user_message.into(),
            assistant_message: exchange.assistant_message.into(),
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /chat/today - Open today's chat: verse of the day, streak, transcript
#[utoipa::path(
    post,
    path = "/chat/today",
    params(
        ("x-client-date" = Option<String>, Header, description = "Client's local day as YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Today's chat", body = DailyChatResponse),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn open_today_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let today = effective_today(&headers);

    // Detached so a client disconnect cannot cancel the verse assignment or
    // the streak write mid-sequence.
    let task = tokio::spawn({
        let state = state.clone();
        async move {
            chat_flow::open_today(state.db.as_ref(), state.verses.as_ref(), user_id, today).await
        }
    });

    let chat = task
        .await
        .map_err(|e| {
            error!("Daily chat task failed to complete: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to open today's chat".to_string(),
            )
        })?
        .map_err(|e| port_error_response(e, "Opening today's chat"))?;

    Ok(Json(DailyChatResponse::from(chat)))
}

/// POST /chat/messages - Send a message and receive the reflection reply
#[utoipa::path(
    post,
    path = "/chat/messages",
    request_body = SendMessageRequest,
    params(
        ("x-client-date" = Option<String>, Header, description = "Client's local day as YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "The stored user and assistant messages", body = ExchangeResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Not authenticated"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn send_message_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if req.content.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Message content must not be empty".to_string(),
        ));
    }

    let today = effective_today(&headers);

    let task = tokio::spawn({
        let state = state.clone();
        async move {
            chat_flow::send_message(
                state.db.as_ref(),
                state.verses.as_ref(),
                state.reflection.as_ref(),
                user_id,
                today,
                &req.content,
            )
            .await
        }
    });

    let exchange = task
        .await
        .map_err(|e| {
            error!("Send message task failed to complete: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to send message".to_string(),
            )
        })?
        .map_err(|e| port_error_response(e, "Sending a message"))?;

    Ok(Json(ExchangeResponse::from(exchange)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_date_header_sets_the_day() {
        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_DATE_HEADER, HeaderValue::from_static("2024-05-01"));
        assert_eq!(
            effective_today(&headers),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
        );
    }

    #[test]
    fn malformed_or_missing_header_falls_back_to_local_today() {
        let local_today = Local::now().date_naive();

        assert_eq!(effective_today(&HeaderMap::new()), local_today);

        let mut headers = HeaderMap::new();
        headers.insert(CLIENT_DATE_HEADER, HeaderValue::from_static("05/01/2024"));
        assert_eq!(effective_today(&headers), local_today);
    }

    #[test]
    fn message_payload_serializes_roles_as_strings() {
        use verse_companion_core::domain::MessageRole;

        let message = Message {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: "hello".to_string(),
            role: MessageRole::Assistant,
            created_at: Utc::now(),
            conversation_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        let payload = MessagePayload::from(message);
        assert_eq!(payload.role, "assistant");
    }
}
