pub mod models;
pub mod users;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::DbConfig;

pub async fn init_pool(config: &DbConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!("Initializing database connection pool...");
    tracing::debug!(
        "Database URL: {}",
        config.url.replace(
            |c: char| !c.is_ascii_alphanumeric() && c != ':' && c != '/' && c != '@' && c != '.',
            "*"
        )
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").fetch_one(&pool).await?;

    tracing::info!("Database connection pool initialized successfully");

    Ok(pool)
}

/// Round-trip latency of a trivial query, or an error when no pool is configured.
pub async fn health_check(pool: Option<&PgPool>) -> Result<Duration, sqlx::Error> {
    let pool =
        pool.ok_or_else(|| sqlx::Error::Configuration("Database pool not initialized".into()))?;

    let start = std::time::Instant::now();
    sqlx::query("SELECT 1").fetch_one(pool).await?;

    Ok(start.elapsed())
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photographers (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            bio TEXT,
            website TEXT,
            avatar_id INTEGER,
            is_beginner BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizers (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            website TEXT,
            avatar_id INTEGER,
            is_beginner BOOLEAN NOT NULL DEFAULT false,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id SERIAL PRIMARY KEY,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            active BOOLEAN NOT NULL DEFAULT true,
            photographer_id INTEGER UNIQUE REFERENCES photographers(id),
            organizer_id INTEGER UNIQUE REFERENCES organizers(id),
            avatar_id INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id SERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            location TEXT,
            date DATE,
            organizer_id INTEGER REFERENCES organizers(id),
            cover_image_id INTEGER,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            id SERIAL PRIMARY KEY,
            event_id INTEGER REFERENCES events(id),
            photographer_id INTEGER NOT NULL REFERENCES photographers(id),
            likes INTEGER NOT NULL DEFAULT 0 CHECK (likes >= 0),
            date DATE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tags (
            id SERIAL PRIMARY KEY,
            name TEXT UNIQUE NOT NULL
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS photo_tags (
            photo_id INTEGER NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            PRIMARY KEY (photo_id, tag_id)
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Several statements in one round trip need the simple query protocol.
    sqlx::raw_sql(
        r#"
        CREATE INDEX IF NOT EXISTS idx_photos_event_id ON photos(event_id);
        CREATE INDEX IF NOT EXISTS idx_photos_photographer_id ON photos(photographer_id);
        CREATE INDEX IF NOT EXISTS idx_events_organizer_id ON events(organizer_id);
        CREATE INDEX IF NOT EXISTS idx_photo_tags_tag_id ON photo_tags(tag_id)
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE SCHEMA IF NOT EXISTS storage")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage.avatars (
            id SERIAL PRIMARY KEY,
            data BYTEA NOT NULL,
            content_type TEXT NOT NULL,
            user_id INTEGER REFERENCES users(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage.photo_files (
            id SERIAL PRIMARY KEY,
            photo_id INTEGER UNIQUE NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            data BYTEA NOT NULL,
            content_type TEXT NOT NULL,
            original_name TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage.photo_thumbnails (
            id SERIAL PRIMARY KEY,
            photo_id INTEGER UNIQUE NOT NULL REFERENCES photos(id) ON DELETE CASCADE,
            data BYTEA NOT NULL,
            content_type TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage.profile_images (
            id SERIAL PRIMARY KEY,
            data BYTEA NOT NULL,
            content_type TEXT NOT NULL,
            user_id INTEGER REFERENCES users(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage.markdown_images (
            id SERIAL PRIMARY KEY,
            data BYTEA NOT NULL,
            content_type TEXT NOT NULL,
            original_name TEXT,
            user_id INTEGER REFERENCES users(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
    "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}
