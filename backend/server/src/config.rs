use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{Error, anyhow};
use bank::BANK_PATH;
use kitchen::CacheConfig;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bank_path: String,
    /// Fetched instead of `bank_path` when set.
    pub bank_url: Option<String>,
    pub cache_stale_secs: u64,
    pub cache_idle_secs: u64,
    pub cache_sweep_secs: u64,
    pub page_size: usize,
    pub cors_max_age_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            bank_path: BANK_PATH.to_string(),
            bank_url: None,
            cache_stale_secs: 60,
            cache_idle_secs: 300,
            cache_sweep_secs: 60,
            page_size: 20,
            cors_max_age_secs: 60 * 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            bank_path: try_load("BANK_PATH", BANK_PATH)?,
            bank_url: var("BANK_URL").ok().filter(|url| !url.trim().is_empty()),
            cache_stale_secs: try_load("CACHE_STALE_SECS", "60")?,
            cache_idle_secs: try_load("CACHE_IDLE_SECS", "300")?,
            cache_sweep_secs: try_load("CACHE_SWEEP_SECS", "60")?,
            page_size: try_load("PAGE_SIZE", "20")?,
            cors_max_age_secs: try_load("CORS_MAX_AGE_SECS", "3600")?,
        })
    }

    pub fn cache(&self) -> CacheConfig {
        CacheConfig {
            stale_after: Duration::from_secs(self.cache_stale_secs),
            idle_after: Duration::from_secs(self.cache_idle_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache_sweep_secs.max(1))
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        info!("Environment variable {key} not found");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
            anyhow!("Environment misconfigured: invalid {key} value: {e}")
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_config_from_seconds() {
        let config = Config {
            cache_stale_secs: 5,
            cache_idle_secs: 30,
            ..Default::default()
        };

        let cache = config.cache();

        assert_eq!(cache.stale_after, Duration::from_secs(5));
        assert_eq!(cache.idle_after, Duration::from_secs(30));
    }

    #[test]
    fn test_sweep_interval_is_never_zero() {
        let config = Config {
            cache_sweep_secs: 0,
            ..Default::default()
        };

        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_try_load_default_and_invalid() {
        let port: u16 = try_load("RECIPES_TEST_UNSET_PORT", "1111").unwrap();
        assert_eq!(port, 1111);

        assert!(try_load::<u16>("RECIPES_TEST_UNSET_PORT", "not-a-port").is_err());
    }
}
