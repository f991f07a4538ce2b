use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded from the environment (and `.env`).
///
/// Every setting reads `MAKERBOARD_*` first; a few fall back to an
/// unprefixed name. Blank values count as unset.
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub api_addr: Option<String>,
    pub migrate_on_startup: bool,
    /// Static job list served when Postgres is unreachable. `None` uses the
    /// built-in demo set.
    pub fallback_path: Option<PathBuf>,
    pub feed_retry_ms: u64,
    pub poll_interval_ms: u64,
    pub poll_timeout_ms: u64,
    pub list_limit: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is missing"))?;
        Ok(Self::with_database_url(database_url))
    }

    /// Everything but the database URL from the environment.
    pub fn with_database_url(database_url: String) -> Self {
        let api_addr = match env_or_fallback("MAKERBOARD_API_ADDR", "API_ADDR") {
            Some(s) => normalize_optional_addr(&s),
            None => Some("127.0.0.1:8080".to_string()),
        };

        let migrate_on_startup = env_bool("MAKERBOARD_MIGRATE_ON_STARTUP").unwrap_or(false);

        let fallback_path = env_or_fallback("MAKERBOARD_FALLBACK_PATH", "FALLBACK_PATH").map(PathBuf::from);

        let feed_retry_ms = env_parse("MAKERBOARD_FEED_RETRY_MS").unwrap_or(2_000);
        let poll_interval_ms = env_parse("MAKERBOARD_POLL_INTERVAL_MS").unwrap_or(3_000);
        let poll_timeout_ms = env_parse("MAKERBOARD_POLL_TIMEOUT_MS").unwrap_or(45_000);

        let list_limit = env_parse::<i64>("MAKERBOARD_LIST_LIMIT")
            .unwrap_or(100)
            .clamp(1, 500);

        Self {
            database_url,
            api_addr,
            migrate_on_startup,
            fallback_path,
            feed_retry_ms,
            poll_interval_ms,
            poll_timeout_ms,
            list_limit,
        }
    }

    pub fn feed_retry(&self) -> Duration {
        Duration::from_millis(self.feed_retry_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}

#[cfg(test)]
mod tests {
    use super::normalize_optional_addr;

    #[test]
    fn api_can_be_switched_off() {
        assert_eq!(normalize_optional_addr("off"), None);
        assert_eq!(normalize_optional_addr(" NONE "), None);
        assert_eq!(
            normalize_optional_addr("0.0.0.0:9000").as_deref(),
            Some("0.0.0.0:9000")
        );
    }
}
