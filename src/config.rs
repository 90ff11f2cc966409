use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// S3/MinIO bucket holding recipe images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub url_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbWaitConfig {
    pub interval_ms: u64,
    /// 0 means wait forever.
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub db_wait: DbWaitConfig,
    pub max_upload_bytes: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "recipe-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "recipe-api-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24),
        };
        let storage = StorageConfig {
            endpoint: std::env::var("MINIO_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:9000".into()),
            bucket: std::env::var("MINIO_BUCKET").unwrap_or_else(|_| "recipes".into()),
            access_key: std::env::var("MINIO_ACCESS_KEY")?,
            secret_key: std::env::var("MINIO_SECRET_KEY")?,
            region: std::env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".into()),
            url_ttl_secs: env_or("IMAGE_URL_TTL_SECS", 30 * 60),
        };
        let db_wait = DbWaitConfig {
            interval_ms: env_or("DB_WAIT_INTERVAL_MS", 1000),
            max_attempts: env_or("DB_WAIT_MAX_ATTEMPTS", 60),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            db_wait,
            max_upload_bytes: env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::env_or;

    #[test]
    fn env_or_falls_back_on_missing_or_garbage() {
        std::env::remove_var("RECIPE_API_TEST_MISSING");
        assert_eq!(env_or("RECIPE_API_TEST_MISSING", 42u32), 42);

        std::env::set_var("RECIPE_API_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("RECIPE_API_TEST_GARBAGE", 7i64), 7);

        std::env::set_var("RECIPE_API_TEST_SET", "15");
        assert_eq!(env_or("RECIPE_API_TEST_SET", 7u64), 15);
    }
}
