//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Full user row, including the password hash. Never serialized to clients.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub photographer_id: Option<i32>,
    pub organizer_id: Option<i32>,
    pub avatar_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// User as returned by the API: everything but the password hash.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub photographer_id: Option<i32>,
    pub organizer_id: Option<i32>,
    pub avatar_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl PublicUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            active: user.active,
            photographer_id: user.photographer_id,
            organizer_id: user.organizer_id,
            avatar_id: user.avatar_id,
            created_at: user.created_at,
        }
    }
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Account fields an update may touch; `None` leaves the column as is.
#[derive(Debug, Clone, Default)]
pub struct AccountChanges {
    pub email: Option<String>,
    pub role: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Photographer {
    pub id: i32,
    pub name: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub avatar_id: Option<i32>,
    pub is_beginner: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Organizer {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub website: Option<String>,
    pub avatar_id: Option<i32>,
    pub is_beginner: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub organizer_id: Option<i32>,
    pub cover_image_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Photo {
    pub id: i32,
    pub event_id: Option<i32>,
    pub photographer_id: i32,
    pub likes: i32,
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// Photo joined with its event, photographer and tag names.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PhotoDetails {
    pub id: i32,
    pub event_id: Option<i32>,
    pub photographer_id: i32,
    pub likes: i32,
    pub date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub event_name: Option<String>,
    pub photographer_name: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Tag {
    pub id: i32,
    pub name: String,
}

/// Binary payload loaded from one of the `storage.*` tables.
#[derive(Debug, Clone, FromRow)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub content_type: String,
    pub original_name: Option<String>,
}
