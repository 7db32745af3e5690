use anyhow::{Context, Result};
use globset::Glob;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Connection settings for the Appwrite database.
///
/// Every field can be overridden by an environment variable (see
/// [`ENV_OVERRIDES`]).
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub database_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            project_id: None,
            database_id: None,
            api_key: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScanConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.py".to_string()]
}

/// Environment variables that override `[store]` settings.
pub const ENV_OVERRIDES: [&str; 4] = ["API_ENDPOINT", "PROJECT_ID", "DATABASE_ID", "API_KEY"];

/// Store settings with every required field present.
#[derive(Debug, Clone)]
pub struct StoreCredentials {
    pub endpoint: String,
    pub project_id: String,
    pub database_id: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl StoreConfig {
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let slots = [
            &mut self.endpoint,
            &mut self.project_id,
            &mut self.database_id,
            &mut self.api_key,
        ];
        for (var, slot) in ENV_OVERRIDES.iter().zip(slots) {
            if let Some(value) = lookup(*var).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }
    }

    /// Fails with the list of missing settings.
    pub fn credentials(&self) -> Result<StoreCredentials> {
        let fields = [
            ("store.endpoint", "API_ENDPOINT", &self.endpoint),
            ("store.project_id", "PROJECT_ID", &self.project_id),
            ("store.database_id", "DATABASE_ID", &self.database_id),
            ("store.api_key", "API_KEY", &self.api_key),
        ];
        let missing: Vec<String> = fields
            .iter()
            .filter(|(_, _, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(key, env, _)| format!("{} (or ${})", key, env))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("missing store settings: {}", missing.join(", "));
        }
        Ok(StoreCredentials {
            endpoint: self.endpoint.clone().unwrap_or_default(),
            project_id: self.project_id.clone().unwrap_or_default(),
            database_id: self.database_id.clone().unwrap_or_default(),
            api_key: self.api_key.clone().unwrap_or_default(),
            timeout_secs: self.timeout_secs,
        })
    }
}

/// Loads the config file (if present) and applies environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    load_config_with_env(path, |var| std::env::var(var).ok())
}

pub fn load_config_with_env(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.store.apply_env(lookup);

    if config.store.timeout_secs == 0 {
        anyhow::bail!("store.timeout_secs must be > 0");
    }
    if config.scan.include_globs.is_empty() {
        anyhow::bail!("scan.include_globs must not be empty");
    }
    for (field, patterns) in [
        ("scan.include_globs", &config.scan.include_globs),
        ("scan.exclude_globs", &config.scan.exclude_globs),
    ] {
        for pattern in patterns {
            Glob::new(pattern).with_context(|| format!("invalid glob in {}: {}", field, pattern))?;
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_uses_defaults() {
        let cfg = load_config_with_env(Path::new("/nonexistent/schemasync.toml"), |_| None).unwrap();
        assert_eq!(cfg.scan.include_globs, vec!["**/*.py"]);
        assert_eq!(cfg.store.timeout_secs, 30);
        assert!(cfg.store.credentials().is_err());
    }

    #[test]
    fn env_overrides_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("schemasync.toml");
        std::fs::write(
            &path,
            r#"[store]
endpoint = "https://file.example/v1"
project_id = "file-project"
database_id = "main"
api_key = "file-key"
"#,
        )
        .unwrap();
        let cfg = load_config_with_env(&path, |var| match var {
            "API_KEY" => Some("env-key".to_string()),
            "PROJECT_ID" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        let creds = cfg.store.credentials().unwrap();
        assert_eq!(creds.api_key, "env-key");
        assert_eq!(creds.project_id, "file-project");
        assert_eq!(creds.endpoint, "https://file.example/v1");
    }

    #[test]
    fn missing_credentials_are_listed() {
        let cfg = load_config_with_env(Path::new("/nonexistent.toml"), |var| match var {
            "API_ENDPOINT" => Some("https://x/v1".to_string()),
            _ => None,
        })
        .unwrap();
        let err = cfg.store.credentials().unwrap_err().to_string();
        assert!(err.contains("store.api_key"));
        assert!(!err.contains("store.endpoint"));
    }

    #[test]
    fn zero_timeout_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("schemasync.toml");
        std::fs::write(&path, "[store]\ntimeout_secs = 0\n").unwrap();
        assert!(load_config_with_env(&path, |_| None).is_err());
    }

    #[test]
    fn invalid_glob_rejected_at_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("schemasync.toml");
        std::fs::write(&path, "[scan]\nexclude_globs = [\"models/[\"]\n").unwrap();
        let err = load_config_with_env(&path, |_| None).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid glob in scan.exclude_globs: models/["));
    }
}
