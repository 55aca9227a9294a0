//! crates/verse_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// Translation code used whenever the verse provider does not name one.
pub const DEFAULT_TRANSLATION: &str = "WEB";

/// The separator between reference and body in the durable system-message
/// encoding of a daily verse ("John 3:16 - For God so loved...").
const SYSTEM_CONTENT_SEPARATOR: &str = " - ";

/// A scripture passage as returned by the verse provider, not yet tied to
/// any calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerseContent {
    pub reference: String,
    pub text: String,
    pub translation: String,
}

/// The verse designated as "today's verse" for one user on one calendar day.
///
/// At most one `DailyVerse` is authoritative per user per `assigned_date`.
/// Once created it is never mutated; the next calendar day supersedes it
/// with a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyVerse {
    pub reference: String,
    pub text: String,
    pub translation: String,
    /// Day granularity only; no time component.
    pub assigned_date: NaiveDate,
}

impl DailyVerse {
    /// The durable encoding stored as a `system` message: reference and body
    /// joined by `" - "`.
    pub fn to_system_content(&self) -> String {
        format!(
            "{}{}{}",
            self.reference, SYSTEM_CONTENT_SEPARATOR, self.text
        )
    }

    /// Decodes a stored `system` message back into a verse.
    ///
    /// Returns `None` when the content cannot be split into a reference and a
    /// body; a malformed row means "no usable verse", never an error. The
    /// translation is not part of the encoding, so it comes back as the
    /// default.
    pub fn from_system_message(content: &str, conversation_date: NaiveDate) -> Option<Self> {
        let (reference, text) = content.split_once(SYSTEM_CONTENT_SEPARATOR)?;
        let reference = reference.trim();
        let text = text.trim();
        if reference.is_empty() || text.is_empty() {
            return None;
        }
        Some(Self {
            reference: reference.to_string(),
            text: text.to_string(),
            translation: DEFAULT_TRANSLATION.to_string(),
            assigned_date: conversation_date,
        })
    }
}

/// A user's profile, including the engagement record the streak rules read
/// and write.
///
/// `current_streak` only ever increments by exactly 1 across a day boundary,
/// resets to 1, or stays unchanged within the same day.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub current_streak: u32,
    /// `None` until the user's first engagement.
    pub last_engaged_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    /// Carries the daily verse, not conversation.
    System,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    /// Parses the stored encoding; unknown strings yield `None` so a bad row
    /// can be skipped instead of failing a whole history read.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

/// One message in a user's chat transcript.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub role: MessageRole,
    pub created_at: DateTime<Utc>,
    /// The calendar day this message belongs to. For `system` messages this
    /// is the day the encoded verse was assigned.
    pub conversation_date: NaiveDate,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn system_content_round_trips() {
        let verse = DailyVerse {
            reference: "John 3:16".to_string(),
            text: "For God so loved the world...".to_string(),
            translation: DEFAULT_TRANSLATION.to_string(),
            assigned_date: date(2024, 5, 1),
        };

        let decoded =
            DailyVerse::from_system_message(&verse.to_system_content(), date(2024, 5, 1)).unwrap();
        assert_eq!(decoded, verse);
    }

    #[test]
    fn verse_body_may_contain_the_separator() {
        // Only the first " - " splits; the rest belongs to the body.
        let decoded =
            DailyVerse::from_system_message("Psalm 23:1 - The Lord - my shepherd.", date(2024, 5, 1))
                .unwrap();
        assert_eq!(decoded.reference, "Psalm 23:1");
        assert_eq!(decoded.text, "The Lord - my shepherd.");
    }

    #[test]
    fn malformed_system_content_decodes_to_none() {
        let day = date(2024, 5, 1);
        assert!(DailyVerse::from_system_message("no separator here", day).is_none());
        assert!(DailyVerse::from_system_message("", day).is_none());
        assert!(DailyVerse::from_system_message(" - missing reference", day).is_none());
        assert!(DailyVerse::from_system_message("John 3:16 - ", day).is_none());
    }

    #[test]
    fn role_encoding_is_stable() {
        for role in [MessageRole::User, MessageRole::Assistant, MessageRole::System] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("moderator"), None);
    }
}
