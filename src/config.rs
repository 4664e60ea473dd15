use std::net::IpAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub csrf_token: Option<String>,
    pub max_attempts: i64,
    pub termination: TerminationPolicy,
    pub replay_timeout: Duration,
    /// Zero disables the periodic sync trigger.
    pub sync_interval: Duration,
    /// Zero disables connectivity probing.
    pub probe_interval: Duration,
    pub probe_url: String,
    pub assume_online: bool,
    pub max_body_size: usize,
    pub log_level: String,
}

/// What happens to an entry whose failed replay brings it to the attempt bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationPolicy {
    /// Persist it at the bound; the next pass drops it without a network call.
    Deferred,
    /// Drop it in the same pass.
    Immediate,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let api_base_url = lookup("FORMSYNC_API_BASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or("Missing required environment variable: FORMSYNC_API_BASE_URL")?
            .trim_end_matches('/')
            .to_string();

        let database_url = env_or("FORMSYNC_DATABASE_URL", "sqlite://formsync.db");

        let host: IpAddr = env_or("FORMSYNC_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| format!("Invalid FORMSYNC_HOST: {e}"))?;

        let port: u16 = env_or("FORMSYNC_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid FORMSYNC_PORT: {e}"))?;

        let csrf_token = lookup("FORMSYNC_CSRF_TOKEN").filter(|s| !s.is_empty());

        let max_attempts: i64 = env_or("FORMSYNC_MAX_ATTEMPTS", "3")
            .parse()
            .map_err(|e| format!("Invalid FORMSYNC_MAX_ATTEMPTS: {e}"))?;
        if max_attempts < 1 {
            return Err("FORMSYNC_MAX_ATTEMPTS must be at least 1".to_string());
        }

        let termination = match env_or("FORMSYNC_TERMINATION", "deferred").as_str() {
            "deferred" => TerminationPolicy::Deferred,
            "immediate" => TerminationPolicy::Immediate,
            other => return Err(format!("Invalid FORMSYNC_TERMINATION: {other}")),
        };

        let replay_timeout = secs(&env_or("FORMSYNC_REPLAY_TIMEOUT_SECS", "30"), "FORMSYNC_REPLAY_TIMEOUT_SECS")?;
        if replay_timeout.is_zero() {
            return Err("FORMSYNC_REPLAY_TIMEOUT_SECS must be positive".to_string());
        }
        let sync_interval = secs(&env_or("FORMSYNC_SYNC_INTERVAL_SECS", "300"), "FORMSYNC_SYNC_INTERVAL_SECS")?;
        let probe_interval = secs(&env_or("FORMSYNC_PROBE_INTERVAL_SECS", "15"), "FORMSYNC_PROBE_INTERVAL_SECS")?;

        let probe_url = env_or("FORMSYNC_PROBE_URL", &api_base_url);

        let assume_online = match env_or("FORMSYNC_ASSUME_ONLINE", "true").as_str() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => return Err(format!("Invalid FORMSYNC_ASSUME_ONLINE: {other}")),
        };

        let max_body_size: usize = env_or("FORMSYNC_MAX_BODY_SIZE", "1048576")
            .parse()
            .map_err(|e| format!("Invalid FORMSYNC_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("FORMSYNC_LOG_LEVEL", "info");

        Ok(Config {
            api_base_url,
            database_url,
            host,
            port,
            csrf_token,
            max_attempts,
            termination,
            replay_timeout,
            sync_interval,
            probe_interval,
            probe_url,
            assume_online,
            max_body_size,
            log_level,
        })
    }
}

fn secs(value: &str, key: &str) -> Result<Duration, String> {
    value
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| format!("Invalid {key}: {e}"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("FORMSYNC_API_BASE_URL", "http://books.local/")]).unwrap();
        assert_eq!(config.api_base_url, "http://books.local");
        assert_eq!(config.probe_url, "http://books.local");
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.termination, TerminationPolicy::Deferred);
        assert_eq!(config.replay_timeout, Duration::from_secs(30));
        assert_eq!(config.port, 3000);
        assert!(config.assume_online);
        assert!(config.csrf_token.is_none());
    }

    #[test]
    fn api_base_url_is_required() {
        let err = load(&[]).unwrap_err();
        assert!(err.contains("FORMSYNC_API_BASE_URL"));
    }

    #[test]
    fn rejects_unknown_termination_policy() {
        let err = load(&[
            ("FORMSYNC_API_BASE_URL", "http://books.local"),
            ("FORMSYNC_TERMINATION", "never"),
        ])
        .unwrap_err();
        assert!(err.contains("FORMSYNC_TERMINATION"));
    }

    #[test]
    fn immediate_termination_and_disabled_timers() {
        let config = load(&[
            ("FORMSYNC_API_BASE_URL", "http://books.local"),
            ("FORMSYNC_TERMINATION", "immediate"),
            ("FORMSYNC_SYNC_INTERVAL_SECS", "0"),
            ("FORMSYNC_PROBE_INTERVAL_SECS", "0"),
            ("FORMSYNC_ASSUME_ONLINE", "false"),
        ])
        .unwrap();
        assert_eq!(config.termination, TerminationPolicy::Immediate);
        assert!(config.sync_interval.is_zero());
        assert!(config.probe_interval.is_zero());
        assert!(!config.assume_online);
    }
}
