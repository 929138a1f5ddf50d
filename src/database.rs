use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::configuration::DatabaseSettings;
use crate::error::{AppError, DatabaseError};

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped
/// at ten seconds.
pub fn backoff_delay(base_delay_ms: u64, attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt);
    Duration::from_millis(base_delay_ms.saturating_mul(factor).min(10_000))
}

/// Open the connection pool, retrying with exponential backoff while the
/// database is not reachable yet.
pub async fn connect_with_retry(settings: &DatabaseSettings) -> Result<PgPool, AppError> {
    let mut attempt = 0;

    loop {
        let result = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(settings.connect_options())
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(attempt = attempt + 1, "Connected to Postgres");
                return Ok(pool);
            }
            Err(e) if attempt < settings.connect_retries => {
                let delay = backoff_delay(settings.retry_base_delay_ms, attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Postgres not reachable, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(error = %e, "Giving up on Postgres");
                return Err(AppError::Database(DatabaseError::ConnectionPool(
                    e.to_string(),
                )));
            }
        }
    }
}

/// Apply the embedded migrations
pub async fn migrate(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::Database(DatabaseError::UnexpectedError(e.to_string())))
}
