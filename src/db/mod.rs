use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{info, warn};

use crate::config::DbWaitConfig;

pub mod memory;

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(3))
        .connect(database_url)
        .await
        .context("connect to database")?;
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("ping database")?;
    Ok(pool)
}

/// Retries `probe` until it succeeds or the attempt budget runs out.
pub async fn wait_until_ready<T, F, Fut>(cfg: &DbWaitConfig, mut probe: F) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match probe().await {
            Ok(value) => {
                info!(attempt, "database available");
                return Ok(value);
            }
            Err(e) if cfg.max_attempts != 0 && attempt >= cfg.max_attempts => {
                return Err(e.context(format!("database unavailable after {attempt} attempts")));
            }
            Err(e) => {
                warn!(attempt, error = %e, "database unavailable, waiting {} ms", cfg.interval_ms);
                tokio::time::sleep(Duration::from_millis(cfg.interval_ms)).await;
            }
        }
    }
}

pub async fn wait_for_db(database_url: &str, cfg: &DbWaitConfig) -> anyhow::Result<PgPool> {
    info!("waiting for database");
    wait_until_ready(cfg, || connect(database_url)).await
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("run migrations")?;
    info!("migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn cfg(max_attempts: u32) -> DbWaitConfig {
        DbWaitConfig {
            interval_ms: 1,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_ready() {
        let calls = AtomicU32::new(0);
        let value = wait_until_ready(&cfg(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, anyhow::Error>(7) }
        })
        .await
        .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wait_retries_until_available() {
        let calls = AtomicU32::new(0);
        let value = wait_until_ready(&cfg(10), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 5 {
                    anyhow::bail!("connection refused");
                }
                Ok(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn wait_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = wait_until_ready(&cfg(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(anyhow::anyhow!("connection refused")) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(format!("{err:#}").contains("after 3 attempts"));
    }
}
