use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, CODER, DREAMER};

/// Default project config file
pub const DEFAULT_CONFIG_FILE: &str = "seer.yaml";
/// Optional local overrides next to the project config
pub const LOCAL_CONFIG_FILE: &str = "seer.local.yaml";
/// Environment variable prefix
pub const ENV_PREFIX: &str = "SEER_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid worker_count: {0}. Must be between 1 and 64")]
    InvalidWorkerCount(usize),

    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid max_attempts: {0}. Must be at least 1")]
    InvalidMaxAttempts(u32),

    #[error("Invalid sandbox configuration: {0}")]
    InvalidSandbox(String),

    #[error("Required role '{0}' is not configured")]
    MissingRole(String),

    #[error("Invalid role '{role}': {reason}")]
    InvalidRole { role: String, reason: String },

    #[error("Config file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Referenced file {0} is outside the config directory")]
    FileOutsideConfigDir(PathBuf),

    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. `seer.yaml` in the working directory, or `explicit` when given
    /// 3. `seer.local.yaml` next to that file (optional)
    /// 4. Environment variables (`SEER_*` prefix, `__` separates levels)
    ///
    /// File references in the result are resolved relative to the config
    /// file's directory.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigError::MissingFile(path.to_path_buf()).into());
            }
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Self::figment(&path)
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;

        let base_dir = config_dir(&path);
        let config = Self::resolve_references(config, &base_dir)
            .with_context(|| format!("Failed to resolve files referenced by {}", path.display()))?;
        Ok(config)
    }

    /// The merged provider chain for a config file path.
    pub fn figment(path: &Path) -> Figment {
        let local = config_dir(path).join(LOCAL_CONFIG_FILE);
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Yaml::file(local))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.worker_count == 0 || config.worker_count > 64 {
            return Err(ConfigError::InvalidWorkerCount(config.worker_count));
        }

        for required in [DREAMER, CODER] {
            if !config.roles.contains_key(required) {
                return Err(ConfigError::MissingRole(required.to_string()));
            }
        }
        for (name, role) in &config.roles {
            if role.model.trim().is_empty() {
                return Err(ConfigError::InvalidRole {
                    role: name.clone(),
                    reason: "model cannot be empty".to_string(),
                });
            }
            if role.max_output_tokens == 0 {
                return Err(ConfigError::InvalidRole {
                    role: name.clone(),
                    reason: "max_output_tokens must be positive".to_string(),
                });
            }
            if let Some(t) = role.temperature {
                if !(0.0..=2.0).contains(&t) {
                    return Err(ConfigError::InvalidRole {
                        role: name.clone(),
                        reason: format!("temperature {t} is outside 0.0..=2.0"),
                    });
                }
            }
        }

        let rate = &config.rate_limit;
        if rate.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "requests_per_minute must be positive".to_string(),
            ));
        }
        if rate.acquire_timeout_secs == 0 {
            return Err(ConfigError::InvalidRateLimit(
                "acquire_timeout_secs must be positive".to_string(),
            ));
        }
        if !(rate.chars_per_token.is_finite() && rate.chars_per_token > 0.0) {
            return Err(ConfigError::InvalidRateLimit(format!(
                "chars_per_token must be positive, got {}",
                rate.chars_per_token
            )));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        let sandbox = &config.sandbox;
        if sandbox.python.trim().is_empty() {
            return Err(ConfigError::InvalidSandbox("python cannot be empty".to_string()));
        }
        if sandbox.timeout_secs == 0 {
            return Err(ConfigError::InvalidSandbox("timeout_secs must be positive".to_string()));
        }
        if !is_identifier(&sandbox.entry_point) {
            return Err(ConfigError::InvalidSandbox(format!(
                "entry_point '{}' is not a valid identifier",
                sandbox.entry_point
            )));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }

    /// Read every `*_file` reference into its inline field and append the
    /// task context to each role's system prompt.
    ///
    /// Consumed references are cleared so resolution is idempotent.
    pub fn resolve_references(mut config: Config, base_dir: &Path) -> Result<Config, ConfigError> {
        let base = base_dir
            .canonicalize()
            .map_err(|source| ConfigError::ReadFile {
                path: base_dir.to_path_buf(),
                source,
            })?;

        for role in config.roles.values_mut() {
            if let Some(file) = role.system_prompt_file.take() {
                role.system_prompt = Some(read_within(&base, &file)?);
            }
        }

        let instructions = &mut config.instructions;
        for (text, file) in [
            (&mut instructions.investigate_dreamer, &mut instructions.investigate_dreamer_file),
            (&mut instructions.investigate_coder, &mut instructions.investigate_coder_file),
            (&mut instructions.refine_dreamer, &mut instructions.refine_dreamer_file),
            (&mut instructions.refine_coder, &mut instructions.refine_coder_file),
        ] {
            if let Some(path) = file.take() {
                *text = read_within(&base, &path)?;
            }
        }

        let context = match config.task_context_file.take() {
            Some(file) => Some(read_within(&base, &file)?),
            None => config.task_context.take(),
        };
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            for role in config.roles.values_mut() {
                role.system_prompt = Some(match role.system_prompt.take() {
                    Some(prompt) => format!("{prompt}\n\n{context}"),
                    None => context.clone(),
                });
            }
        }
        config.task_context = None;

        Ok(config)
    }
}

fn config_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn read_within(base: &Path, file: &Path) -> Result<String, ConfigError> {
    let joined = base.join(file);
    let resolved = joined.canonicalize().map_err(|source| ConfigError::ReadFile {
        path: joined.clone(),
        source,
    })?;
    if !resolved.starts_with(base) {
        return Err(ConfigError::FileOutsideConfigDir(file.to_path_buf()));
    }
    std::fs::read_to_string(&resolved).map_err(|source| ConfigError::ReadFile {
        path: resolved,
        source,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::WorkflowKind;
    use crate::domain::models::TestGating;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.rate_limit.requests_per_minute, 15);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.sandbox.entry_point, "transform");
        assert_eq!(config.workflow, WorkflowKind::Default);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
workflow: incremental
worker_count: 8
max_iterations: 3
rate_limit:
  requests_per_minute: 30
  tokens_per_minute: 0
sandbox:
  timeout_secs: 5
  test_gating: always
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.workflow, WorkflowKind::Incremental);
        assert_eq!(config.worker_count, 8);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(config.rate_limit.requests_per_minute, 30);
        assert_eq!(config.rate_limit.tokens_per_minute, 0);
        assert_eq!(config.sandbox.timeout_secs, 5);
        assert_eq!(config.sandbox.test_gating, TestGating::Always);
        assert_eq!(config.logging.level, "debug");
        assert!(config.roles.contains_key(DREAMER));

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_worker_count_bounds() {
        for bad in [0, 65] {
            let config = Config {
                worker_count: bad,
                ..Default::default()
            };
            assert!(matches!(
                ConfigLoader::validate(&config),
                Err(ConfigError::InvalidWorkerCount(n)) if n == bad
            ));
        }
    }

    #[test]
    fn test_validate_missing_role() {
        let mut config = Config::default();
        config.roles.remove(CODER);
        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::MissingRole(role) => assert_eq!(role, "coder"),
            other => panic!("Expected MissingRole error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            _ => panic!("Expected InvalidLogLevel error"),
        }
    }

    #[test]
    fn test_validate_rate_limit() {
        let mut config = Config::default();
        config.rate_limit.requests_per_minute = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));

        let mut config = Config::default();
        config.rate_limit.chars_per_token = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));
    }

    #[test]
    fn test_validate_entry_point() {
        let mut config = Config::default();
        config.sandbox.entry_point = "not valid".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidSandbox(_))
        ));
    }

    #[test]
    fn test_validate_zero_max_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxAttempts(0))
        ));
    }

    #[test]
    fn test_load_from_file_with_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seer.yaml");
        std::fs::write(&path, "worker_count: 6\nmax_iterations: 2\n").unwrap();
        std::fs::write(dir.path().join(LOCAL_CONFIG_FILE), "max_iterations: 7\n").unwrap();

        temp_env::with_vars(
            [
                ("SEER_WORKER_COUNT", Some("9")),
                ("SEER_RATE_LIMIT__REQUESTS_PER_MINUTE", Some("40")),
            ],
            || {
                let config = ConfigLoader::load(Some(&path)).unwrap();
                assert_eq!(config.worker_count, 9);
                assert_eq!(config.max_iterations, 7);
                assert_eq!(config.rate_limit.requests_per_minute, 40);
            },
        );
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let err = ConfigLoader::load(Some(Path::new("/nonexistent/seer.yaml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_resolve_references() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dreamer.md"), "You dream.").unwrap();
        std::fs::write(dir.path().join("context.md"), "Grids are small.").unwrap();
        std::fs::write(dir.path().join("refine.md"), "Try again.").unwrap();

        let mut config = Config::default();
        config.roles.get_mut(DREAMER).unwrap().system_prompt_file = Some("dreamer.md".into());
        config.task_context_file = Some("context.md".into());
        config.instructions.refine_coder_file = Some("refine.md".into());

        let resolved = ConfigLoader::resolve_references(config, dir.path()).unwrap();
        assert_eq!(
            resolved.roles[DREAMER].system_prompt.as_deref(),
            Some("You dream.\n\nGrids are small.")
        );
        assert!(resolved.roles[CODER]
            .system_prompt
            .as_deref()
            .unwrap()
            .ends_with("Grids are small."));
        assert_eq!(resolved.instructions.refine_coder, "Try again.");
        assert!(resolved.task_context_file.is_none());
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("cfg");
        std::fs::create_dir(&inner).unwrap();
        std::fs::write(outer.path().join("secret.md"), "nope").unwrap();

        let mut config = Config::default();
        config.task_context_file = Some("../secret.md".into());

        assert!(matches!(
            ConfigLoader::resolve_references(config, &inner),
            Err(ConfigError::FileOutsideConfigDir(_))
        ));
    }
}
