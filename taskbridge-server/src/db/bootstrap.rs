//! Idempotent schema bootstrap and database health probes.

use sqlx::PgPool;
use tracing::{debug, info};

/// Statements applied on startup, in order. Every statement is idempotent so
/// restarts and horizontally-scaled instances can all run the bootstrap.
const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS chat_message (
        id BIGSERIAL PRIMARY KEY,
        sender_username TEXT NOT NULL,
        recipient_username TEXT NOT NULL,
        content TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL,
        deleted_by_sender BOOLEAN NOT NULL DEFAULT FALSE,
        deleted_by_recipient BOOLEAN NOT NULL DEFAULT FALSE
    )",
    "CREATE INDEX IF NOT EXISTS idx_chat_message_sender
        ON chat_message (sender_username, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_chat_message_recipient
        ON chat_message (recipient_username, created_at)",
];

/// Applies the chat schema.
///
/// # Errors
/// Returns the first statement failure; nothing later is attempted.
pub async fn run(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA_STATEMENTS {
        debug!(statement, "applying bootstrap statement");
        sqlx::query(statement).execute(pool).await?;
    }
    info!("database bootstrap complete");
    Ok(())
}

/// Cheapest possible connectivity probe.
pub async fn ensure_liveness(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Readiness probe used by `/readyz`: verifies the chat schema is queryable.
pub async fn ensure_readiness(pool: &PgPool) -> Result<(), sqlx::Error> {
    #[cfg(test)]
    if let Some(result) = readiness_override() {
        return result.map_err(sqlx::Error::Protocol);
    }

    sqlx::query("SELECT 1 FROM chat_message LIMIT 1")
        .execute(pool)
        .await
        .map(|_| ())
}

#[cfg(test)]
static READINESS_OVERRIDE: std::sync::Mutex<Option<Result<(), String>>> =
    std::sync::Mutex::new(None);

#[cfg(test)]
pub(crate) fn set_readiness_override(value: Option<Result<(), String>>) {
    *READINESS_OVERRIDE.lock().unwrap() = value;
}

#[cfg(test)]
fn readiness_override() -> Option<Result<(), String>> {
    READINESS_OVERRIDE.lock().unwrap().clone()
}
