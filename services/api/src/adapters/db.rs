//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;
use verse_companion_core::domain::{Message, MessageRole, Profile, UserCredentials};
use verse_companion_core::ports::{DatabaseService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation to `Conflict` and anything else to
/// `Unexpected`.
fn conflict_or_unexpected(e: sqlx::Error, conflict_msg: &str) -> PortError {
    match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            PortError::Conflict(conflict_msg.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    email: String,
    current_streak: i32,
    last_engaged_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            id: self.id,
            email: self.email,
            // The column has CHECK (current_streak >= 0).
            current_streak: self.current_streak.max(0) as u32,
            last_engaged_date: self.last_engaged_date,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    user_id: Uuid,
    content: String,
    role: String,
    created_at: DateTime<Utc>,
    conversation_date: NaiveDate,
}
impl MessageRecord {
    /// `None` when the stored role is not one we know; the caller skips
    /// such rows rather than failing the whole read.
    fn to_domain(self) -> Option<Message> {
        let role = MessageRole::parse(&self.role)?;
        Some(Message {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            role,
            created_at: self.created_at,
            conversation_date: self.conversation_date,
        })
    }
}

#[derive(FromRow)]
struct SessionUserRecord {
    user_id: Uuid,
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_profile(&self, email: &str, hashed_password: &str) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "INSERT INTO profiles (id, email, hashed_password, current_streak, last_engaged_date) \
             VALUES ($1, $2, $3, 0, NULL) \
             RETURNING id, email, current_streak, last_engaged_date, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, "An account with this email already exists"))?;

        Ok(record.to_domain())
    }

    async fn get_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, email, current_streak, last_engaged_date, created_at \
             FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("Profile {} not found", user_id)),
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM profiles WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("No account for email {}", email))
            }
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.to_domain())
    }

    async fn record_engagement(
        &self,
        user_id: Uuid,
        streak: u32,
        engaged_on: NaiveDate,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE profiles SET current_streak = $1, last_engaged_date = $2 WHERE id = $3",
        )
        .bind(streak as i32)
        .bind(engaged_on)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Profile {} not found", user_id)));
        }
        Ok(())
    }

    async fn append_message(
        &self,
        user_id: Uuid,
        content: &str,
        role: MessageRole,
        conversation_date: NaiveDate,
    ) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, user_id, content, role, conversation_date) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, content, role, created_at, conversation_date",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(content)
        .bind(role.as_str())
        .bind(conversation_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_unexpected(e, "A daily verse message already exists for this day")
        })?;

        record
            .to_domain()
            .ok_or_else(|| PortError::Unexpected("Inserted message read back with an unknown role".to_string()))
    }

    async fn message_history(&self, user_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(
            "SELECT id, user_id, content, role, created_at, conversation_date \
             FROM messages WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let messages = records
            .into_iter()
            .filter_map(|r| {
                let id = r.id;
                let message = r.to_domain();
                if message.is_none() {
                    warn!("Skipping message {} with an unknown role", id);
                }
                message
            })
            .collect();
        Ok(messages)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let record = sqlx::query_as::<_, SessionUserRecord>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })?;

        Ok(record.user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
