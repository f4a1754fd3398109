use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// User record in the database. Never serialized directly.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,                             // unique user ID
    pub email: String,                        // user email, unique
    pub password_hash: String,                // Argon2 hash, not exposed in JSON
    pub display_name: String,
    pub dob: Date,
    pub refresh_token_hash: Option<String>,   // SHA-256 of the latest refresh token
    pub created_at: OffsetDateTime,           // creation timestamp
}

/// Fields supplied when a user signs up.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub dob: Date,
}
