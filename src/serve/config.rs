/// Configuration for the serve subcommand.
use std::time::Duration;

use crate::config::Profile;
use crate::reasoning;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 48;
/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 366;
pub const DEFAULT_MAX_RUNS_PER_SESSION: i32 = 5;
pub const DEFAULT_REASONING_TIMEOUT_SECS: u64 = 30;

/// Per-request policy knobs.
#[derive(Debug, Clone)]
pub struct Settings {
    pub session_ttl: chrono::Duration,
    pub max_runs_per_session: i32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            session_ttl: chrono::Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            max_runs_per_session: DEFAULT_MAX_RUNS_PER_SESSION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs against the in-memory store.
    pub database_url: Option<String>,
    pub listen_addr: String,
    pub static_dir: Option<String>,
    pub settings: Settings,
    /// `None` when no API key is configured; the reasoning step then uses canned output.
    pub reasoning: Option<ReasoningConfig>,
}

impl Config {
    pub fn from_profile(profile: &Profile, in_memory: bool) -> Result<Self, String> {
        let database_url = if in_memory {
            None
        } else {
            Some(profile.connection.clone().ok_or(
                "No connection string. Use --db, AGENTLENS_DATABASE_URL, or --in-memory",
            )?)
        };

        let session_ttl_hours = profile.session_ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            return Err(format!(
                "session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}, got {session_ttl_hours}"
            ));
        }
        let session_ttl = chrono::Duration::try_hours(session_ttl_hours)
            .ok_or_else(|| format!("session_ttl_hours out of range: {session_ttl_hours}"))?;
        let max_runs_per_session = profile
            .max_runs_per_session
            .unwrap_or(DEFAULT_MAX_RUNS_PER_SESSION);
        if max_runs_per_session < 0 {
            return Err(format!(
                "max_runs_per_session must not be negative, got {max_runs_per_session}"
            ));
        }

        let reasoning = profile
            .reasoning_api_key
            .as_ref()
            .filter(|k| !k.is_empty())
            .map(|api_key| ReasoningConfig {
                endpoint: profile
                    .reasoning_endpoint
                    .clone()
                    .unwrap_or_else(|| reasoning::DEFAULT_ENDPOINT.to_string()),
                model: profile
                    .reasoning_model
                    .clone()
                    .unwrap_or_else(|| reasoning::DEFAULT_MODEL.to_string()),
                api_key: api_key.clone(),
                timeout: Duration::from_secs(
                    profile
                        .reasoning_timeout_secs
                        .unwrap_or(DEFAULT_REASONING_TIMEOUT_SECS),
                ),
            });

        Ok(Self {
            database_url,
            listen_addr: profile
                .listen
                .clone()
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            static_dir: profile.static_dir.clone(),
            settings: Settings {
                session_ttl,
                max_runs_per_session,
            },
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply() {
        let profile = Profile {
            connection: Some("postgres://localhost/agentlens".into()),
            ..Profile::default()
        };
        let config = Config::from_profile(&profile, false).unwrap();
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.settings.max_runs_per_session, 5);
        assert_eq!(config.settings.session_ttl, chrono::Duration::hours(48));
        assert!(config.reasoning.is_none());
    }

    #[test]
    fn database_required_unless_in_memory() {
        assert!(Config::from_profile(&Profile::default(), false).is_err());
        let config = Config::from_profile(&Profile::default(), true).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn api_key_enables_reasoning() {
        let profile = Profile {
            reasoning_api_key: Some("key".into()),
            reasoning_timeout_secs: Some(5),
            ..Profile::default()
        };
        let reasoning = Config::from_profile(&profile, true).unwrap().reasoning.unwrap();
        assert_eq!(reasoning.endpoint, reasoning::DEFAULT_ENDPOINT);
        assert_eq!(reasoning.model, reasoning::DEFAULT_MODEL);
        assert_eq!(reasoning.timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_non_positive_ttl() {
        let profile = Profile {
            session_ttl_hours: Some(0),
            ..Profile::default()
        };
        assert!(Config::from_profile(&profile, true).is_err());
    }

    #[test]
    fn ttl_has_an_upper_bound() {
        let at_max = Profile {
            session_ttl_hours: Some(MAX_SESSION_TTL_HOURS),
            ..Profile::default()
        };
        let config = Config::from_profile(&at_max, true).unwrap();
        assert_eq!(config.settings.session_ttl, chrono::Duration::hours(MAX_SESSION_TTL_HOURS));

        for hours in [MAX_SESSION_TTL_HOURS + 1, 10_000_000_000, i64::MAX] {
            let profile = Profile {
                session_ttl_hours: Some(hours),
                ..Profile::default()
            };
            assert!(Config::from_profile(&profile, true).is_err(), "{hours} accepted");
        }
    }
}
