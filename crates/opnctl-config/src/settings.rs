use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Pretty
    }
}

/// Engine-wide settings: where state lives, how much concurrency and lease
/// time each run gets, and per-resource-type timeout overrides. Loaded from
/// a TOML file with environment variable overrides layered on top, rather
/// than from a directory of desired-state YAML: desired state arrives over
/// the caller interface as RPC parameters, not from a config tree on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub store_path: String,
    pub default_max_concurrency: usize,
    pub lease_ttl_secs: i64,
    pub log_format: LogFormat,
    /// Per-type-name override of the effector call timeout, in seconds.
    pub per_type_timeout_secs: BTreeMap<String, u64>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            store_path: "opnctl.redb".to_string(),
            default_max_concurrency: 4,
            lease_ttl_secs: 300,
            log_format: LogFormat::Pretty,
            per_type_timeout_secs: BTreeMap::new(),
        }
    }
}

impl EngineSettings {
    /// Load settings from a TOML file, then apply `OPNCTL_`-prefixed
    /// environment variable overrides (`OPNCTL_STORE_PATH`,
    /// `OPNCTL_DEFAULT_MAX_CONCURRENCY`, `OPNCTL_LEASE_TTL_SECS`,
    /// `OPNCTL_LOG_FORMAT`).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut settings: EngineSettings =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
                path: path.display().to_string(),
                source: e,
            })?;
        settings.apply_env_overrides(path)?;
        debug!(?settings, "loaded engine settings");
        Ok(settings)
    }

    fn apply_env_overrides(&mut self, path: &Path) -> Result<(), ConfigError> {
        if let Ok(v) = std::env::var("OPNCTL_STORE_PATH") {
            self.store_path = v;
        }
        if let Ok(v) = std::env::var("OPNCTL_DEFAULT_MAX_CONCURRENCY") {
            self.default_max_concurrency = v.parse().map_err(|_| ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("OPNCTL_DEFAULT_MAX_CONCURRENCY='{v}' is not a valid integer"),
            })?;
        }
        if let Ok(v) = std::env::var("OPNCTL_LEASE_TTL_SECS") {
            self.lease_ttl_secs = v.parse().map_err(|_| ConfigError::Conversion {
                path: path.display().to_string(),
                message: format!("OPNCTL_LEASE_TTL_SECS='{v}' is not a valid integer"),
            })?;
        }
        if let Ok(v) = std::env::var("OPNCTL_LOG_FORMAT") {
            self.log_format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::Conversion {
                        path: path.display().to_string(),
                        message: format!("OPNCTL_LOG_FORMAT='{other}' must be 'json' or 'pretty'"),
                    })
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_applies_file_values() {
        let file = tempfile_config(
            "store_path = \"/var/lib/opnctl/state.redb\"\ndefault_max_concurrency = 8\n",
        );
        let settings = EngineSettings::load(file.path()).unwrap();
        assert_eq!(settings.store_path, "/var/lib/opnctl/state.redb");
        assert_eq!(settings.default_max_concurrency, 8);
        assert_eq!(settings.lease_ttl_secs, 300);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let file = tempfile_config("store_path = \"/tmp/opnctl.redb\"\n");
        let settings = EngineSettings::load(file.path()).unwrap();
        assert_eq!(settings.default_max_concurrency, 4);
    }

    struct TempConfigFile {
        path: std::path::PathBuf,
    }

    impl TempConfigFile {
        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TempConfigFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_config(contents: &str) -> TempConfigFile {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "opnctl-config-test-{}-{}.toml",
            std::process::id(),
            n
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        TempConfigFile { path }
    }
}
