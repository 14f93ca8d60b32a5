use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    pub default: Option<Profile>,
    pub profiles: Option<HashMap<String, Profile>>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Profile {
    pub connection: Option<String>,
    pub listen: Option<String>,
    pub static_dir: Option<String>,
    pub session_ttl_hours: Option<i64>,
    pub max_runs_per_session: Option<i32>,
    pub reasoning_endpoint: Option<String>,
    pub reasoning_model: Option<String>,
    pub reasoning_api_key: Option<String>,
    pub reasoning_timeout_secs: Option<u64>,
}

fn take<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
    if src.is_some() {
        dst.clone_from(src);
    }
}

impl Profile {
    /// Merge another profile into this one (other takes priority for set fields).
    pub fn merge(&mut self, other: &Profile) {
        take(&mut self.connection, &other.connection);
        take(&mut self.listen, &other.listen);
        take(&mut self.static_dir, &other.static_dir);
        take(&mut self.session_ttl_hours, &other.session_ttl_hours);
        take(&mut self.max_runs_per_session, &other.max_runs_per_session);
        take(&mut self.reasoning_endpoint, &other.reasoning_endpoint);
        take(&mut self.reasoning_model, &other.reasoning_model);
        take(&mut self.reasoning_api_key, &other.reasoning_api_key);
        take(&mut self.reasoning_timeout_secs, &other.reasoning_timeout_secs);
    }

    /// Apply environment overrides, looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("AGENTLENS_DATABASE_URL") {
            self.connection = Some(url);
        }
        if let Some(dir) = var("STATIC_DIR") {
            self.static_dir = Some(dir);
        }
        if let Some(key) = var("AGENTLENS_REASONING_API_KEY") {
            self.reasoning_api_key = Some(key);
        }
    }
}

/// Walk up from the current directory looking for `.agentlens/config.toml`.
pub fn find_project_config() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(".agentlens").join("config.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Global config path: `~/.config/agentlens/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("agentlens").join("config.toml"))
}

fn load_file(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            tracing::warn!("ignoring unreadable config {}: {}", path.display(), e);
            None
        }
    }
}

/// Fold one config file into `result`: its defaults, then the named profile.
fn apply_file(result: &mut Profile, cfg: &ConfigFile, profile_name: &str) {
    if let Some(default) = &cfg.default {
        result.merge(default);
    }
    if profile_name != "default" {
        if let Some(named) = cfg.profiles.as_ref().and_then(|p| p.get(profile_name)) {
            result.merge(named);
        }
    }
}

/// Resolve a profile by name: global file → project file → environment.
pub fn load_config(profile_name: &str) -> Profile {
    let mut result = Profile::default();

    for path in [global_config_path(), find_project_config()].into_iter().flatten() {
        if let Some(cfg) = load_file(&path) {
            apply_file(&mut result, &cfg, profile_name);
        }
    }

    result.apply_env(|k| std::env::var(k).ok());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[default]
connection = "postgres://localhost/agentlens"
max_runs_per_session = 5

[profiles.staging]
connection = "postgres://staging/agentlens"
reasoning_model = "google/gemini-2.5-flash"
"#;

    #[test]
    fn named_profile_overrides_default() {
        let cfg: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let mut profile = Profile::default();
        apply_file(&mut profile, &cfg, "staging");

        assert_eq!(profile.connection.as_deref(), Some("postgres://staging/agentlens"));
        assert_eq!(profile.max_runs_per_session, Some(5));
        assert_eq!(profile.reasoning_model.as_deref(), Some("google/gemini-2.5-flash"));
    }

    #[test]
    fn default_profile_ignores_named_sections() {
        let cfg: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let mut profile = Profile::default();
        apply_file(&mut profile, &cfg, "default");
        assert_eq!(profile.connection.as_deref(), Some("postgres://localhost/agentlens"));
        assert_eq!(profile.reasoning_model, None);
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut base = Profile {
            listen: Some("0.0.0.0:8080".into()),
            session_ttl_hours: Some(48),
            ..Profile::default()
        };
        base.merge(&Profile {
            session_ttl_hours: Some(2),
            ..Profile::default()
        });
        assert_eq!(base.listen.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(base.session_ttl_hours, Some(2));
    }

    #[test]
    fn environment_wins() {
        let mut profile = Profile {
            connection: Some("postgres://file".into()),
            ..Profile::default()
        };
        profile.apply_env(|k| match k {
            "AGENTLENS_DATABASE_URL" => Some("postgres://env".into()),
            "AGENTLENS_REASONING_API_KEY" => Some("secret".into()),
            _ => None,
        });
        assert_eq!(profile.connection.as_deref(), Some("postgres://env"));
        assert_eq!(profile.reasoning_api_key.as_deref(), Some("secret"));
        assert_eq!(profile.static_dir, None);
    }
}
