//! Console configuration: CLI flags, falling back to env vars, falling back to
//! defaults.

use std::time::Duration;

use anyhow::ensure;

use crate::or_env::OrEnvExt;

pub const DEFAULT_HUB_URL: &str = "http://localhost:8080";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Matches the admin UI, which revalidates on focus rather than on a timer.
pub const DEFAULT_CACHE_MAX_AGE: Duration = Duration::from_secs(30);
pub const DEFAULT_METADATA_RETRIES: usize = 2;

pub const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConsoleConfig {
    /// Base url of the Hub, e.g. `http://localhost:8080`.
    pub hub_url: String,
    pub user_agent: String,
    pub request_timeout: Duration,
    /// How long a cached read is served before it's refetched.
    pub cache_max_age: Duration,
    /// Retries for idempotent reads, incl. node metadata lookups.
    pub metadata_retries: usize,
}

/// Values which can be overridden from the command line or env.
#[derive(Clone, Debug, Default)]
pub struct ConfigArgs {
    /// Env: `HUB_URL`.
    pub hub_url: Option<String>,
    /// Env: `HUB_REQUEST_TIMEOUT_SECS`.
    pub request_timeout_secs: Option<u64>,
    /// Env: `HUB_CACHE_MAX_AGE_SECS`.
    pub cache_max_age_secs: Option<u64>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            hub_url: DEFAULT_HUB_URL.to_owned(),
            user_agent: USER_AGENT.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            metadata_retries: DEFAULT_METADATA_RETRIES,
        }
    }
}

impl ConsoleConfig {
    /// Read the config from env vars only.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_args(ConfigArgs::default())
    }

    /// Args which are set win; unset args are read from env.
    pub fn from_args(mut args: ConfigArgs) -> anyhow::Result<Self> {
        args.hub_url.or_env_mut("HUB_URL")?;
        args.request_timeout_secs
            .or_env_mut("HUB_REQUEST_TIMEOUT_SECS")?;
        args.cache_max_age_secs.or_env_mut("HUB_CACHE_MAX_AGE_SECS")?;
        Self::from_resolved(args)
    }

    /// Apply already-resolved args over the defaults.
    fn from_resolved(args: ConfigArgs) -> anyhow::Result<Self> {
        let default = Self::default();

        let hub_url = args.hub_url.unwrap_or(default.hub_url);
        ensure!(
            hub_url.starts_with("http://") || hub_url.starts_with("https://"),
            "Hub url must start with http:// or https://: '{hub_url}'"
        );

        let request_timeout = args
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(default.request_timeout);
        ensure!(!request_timeout.is_zero(), "Request timeout can't be zero");

        let cache_max_age = args
            .cache_max_age_secs
            .map(Duration::from_secs)
            .unwrap_or(default.cache_max_age);

        Ok(Self {
            hub_url,
            request_timeout,
            cache_max_age,
            ..default
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConsoleConfig::from_resolved(ConfigArgs::default()).unwrap();
        assert_eq!(config, ConsoleConfig::default());
        assert!(config.user_agent.starts_with("console/"));
    }

    #[test]
    fn args_override_defaults() {
        let args = ConfigArgs {
            hub_url: Some("https://hub.example.com/".to_owned()),
            request_timeout_secs: Some(5),
            cache_max_age_secs: Some(0),
        };
        let config = ConsoleConfig::from_resolved(args).unwrap();
        assert_eq!(config.hub_url, "https://hub.example.com/");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.cache_max_age, Duration::ZERO);
        assert_eq!(config.metadata_retries, DEFAULT_METADATA_RETRIES);
    }

    #[test]
    fn rejects_bad_values() {
        let args = ConfigArgs {
            hub_url: Some("localhost:8080".to_owned()),
            ..Default::default()
        };
        assert!(ConsoleConfig::from_resolved(args).is_err());

        let args = ConfigArgs {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(ConsoleConfig::from_resolved(args).is_err());
    }
}
