//! User storage seam used by the auth module.
//!
//! Postgres backs it in production. `MemoryUserStore` keeps accounts in a
//! process-local vector and is used when no database is configured and in tests.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::models::{AccountChanges, NewUser, User, ROLE_USER};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, active, \
                            photographer_id, organizer_id, avatar_id, created_at";

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, sqlx::Error>;

    async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error>;

    async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error>;

    /// Inserts the account and returns its id.
    async fn insert(&self, user: NewUser) -> Result<i32, sqlx::Error>;

    async fn update_password(&self, id: i32, password_hash: &str) -> Result<(), sqlx::Error>;

    /// Applies `changes` and returns the updated row, `None` for an unknown id.
    async fn update_account(
        &self,
        id: i32,
        changes: &AccountChanges,
    ) -> Result<Option<User>, sqlx::Error>;
}

#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn insert(&self, user: NewUser) -> Result<i32, sqlx::Error> {
        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO users (username, email, password_hash, role, active, created_at)
            VALUES ($1, $2, $3, $4, true, now())
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(ROLE_USER)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update_password(&self, id: i32, password_hash: &str) -> Result<(), sqlx::Error> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(sqlx::Error::RowNotFound);
        }
        Ok(())
    }

    async fn update_account(
        &self,
        id: i32,
        changes: &AccountChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($1, email),
                role = COALESCE($2, role),
                active = COALESCE($3, active)
            WHERE id = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&changes.email)
        .bind(&changes.role)
        .bind(changes.active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_active(&self, id: i32, active: bool) {
        if let Some(user) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            user.active = active;
        }
    }

    pub async fn set_role(&self, id: i32, role: &str) {
        if let Some(user) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            user.role = role.to_string();
        }
    }

    pub async fn link_photographer(&self, id: i32, photographer_id: Option<i32>) {
        if let Some(user) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            user.photographer_id = photographer_id;
        }
    }

    pub async fn link_organizer(&self, id: i32, organizer_id: Option<i32>) {
        if let Some(user) = self.users.write().await.iter_mut().find(|u| u.id == id) {
            user.organizer_id = organizer_id;
        }
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, sqlx::Error> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn username_exists(&self, username: &str) -> Result<bool, sqlx::Error> {
        Ok(self.find_by_username(username).await?.is_some())
    }

    async fn email_exists(&self, email: &str) -> Result<bool, sqlx::Error> {
        let users = self.users.read().await;
        Ok(users.iter().any(|u| u.email.eq_ignore_ascii_case(email)))
    }

    async fn insert(&self, user: NewUser) -> Result<i32, sqlx::Error> {
        let mut users = self.users.write().await;
        let id = users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        users.push(User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: ROLE_USER.to_string(),
            active: true,
            photographer_id: None,
            organizer_id: None,
            avatar_id: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn update_password(&self, id: i32, password_hash: &str) -> Result<(), sqlx::Error> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(sqlx::Error::RowNotFound)?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn update_account(
        &self,
        id: i32,
        changes: &AccountChanges,
    ) -> Result<Option<User>, sqlx::Error> {
        let mut users = self.users.write().await;
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        if let Some(role) = &changes.role {
            user.role = role.clone();
        }
        if let Some(active) = changes.active {
            user.active = active;
        }
        Ok(Some(user.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_assigns_sequential_ids() {
        let store = MemoryUserStore::new();
        let first = store.insert(new_user("fox", "fox@example.com")).await.unwrap();
        let second = store.insert(new_user("wolf", "wolf@example.com")).await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn test_memory_store_email_lookup_ignores_case() {
        let store = MemoryUserStore::new();
        store.insert(new_user("fox", "Fox@Example.com")).await.unwrap();
        assert!(store.email_exists("fox@example.com").await.unwrap());
        assert!(!store.email_exists("wolf@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_update_account_applies_only_given_fields() {
        let store = MemoryUserStore::new();
        let id = store.insert(new_user("fox", "fox@example.com")).await.unwrap();

        let changes = AccountChanges {
            active: Some(false),
            ..AccountChanges::default()
        };
        let user = store.update_account(id, &changes).await.unwrap().unwrap();
        assert!(!user.active);
        assert_eq!(user.email, "fox@example.com");
        assert_eq!(user.role, ROLE_USER);

        assert!(store.update_account(42, &changes).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_update_password_unknown_user() {
        let store = MemoryUserStore::new();
        let err = store.update_password(99, "x").await.unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }
}
