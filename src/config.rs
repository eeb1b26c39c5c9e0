//! Configuration for fanjoin runs.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (FANJOIN_TIME_SCALE, FANJOIN_DEADLINE_MS,
//!    FANJOIN_FAILURE_POLICY)
//! 2. Config file (.fanjoin/config.yaml)
//! 3. Defaults (scale 1.0, no deadline, wait_all)
//!
//! Config file discovery:
//! - Searches current directory and parents for .fanjoin/config.yaml
//! - Falls back to ~/.fanjoin/config.yaml

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::core::{FailurePolicy, RunPolicy};

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".fanjoin";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub run: Option<RunConfig>,
    #[serde(default)]
    pub demo: Option<DemoConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    pub time_scale: Option<f64>,
    pub deadline_ms: Option<u64>,
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DemoConfig {
    /// Default group width for the demo pipeline
    pub width: Option<usize>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Policy applied to runs unless overridden
    pub policy: RunPolicy,
    /// Group width for the demo pipeline
    pub demo_width: usize,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            policy: RunPolicy::default(),
            demo_width: 3,
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let home_config = dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE);
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Merge file settings and environment overrides onto defaults
fn resolve<E>(file: Option<(PathBuf, ConfigFile)>, env: E) -> Result<ResolvedConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let mut resolved = ResolvedConfig::default();

    if let Some((path, config)) = file {
        let run = config.run.unwrap_or_default();
        if let Some(scale) = run.time_scale {
            resolved.policy.time_scale = scale;
        }
        resolved.policy.deadline_ms = run.deadline_ms;
        if let Some(policy) = run.failure_policy {
            resolved.policy.failure_policy = policy;
        }
        if let Some(width) = config.demo.and_then(|d| d.width) {
            resolved.demo_width = width;
        }
        resolved.config_file = Some(path);
    }

    if let Some(raw) = env("FANJOIN_TIME_SCALE") {
        resolved.policy.time_scale = raw
            .parse()
            .with_context(|| format!("Invalid FANJOIN_TIME_SCALE: {}", raw))?;
    }
    if let Some(raw) = env("FANJOIN_DEADLINE_MS") {
        resolved.policy.deadline_ms = Some(
            raw.parse()
                .with_context(|| format!("Invalid FANJOIN_DEADLINE_MS: {}", raw))?,
        );
    }
    if let Some(raw) = env("FANJOIN_FAILURE_POLICY") {
        resolved.policy.failure_policy = raw.parse().map_err(anyhow::Error::msg)?;
    }

    resolved.policy.validate()?;

    Ok(resolved)
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let file = match find_config_file() {
        Some(path) => {
            let config = load_config_file(&path)?;
            Some((path, config))
        }
        None => None,
    };

    resolve(file, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_file() {
        let config = resolve(None, no_env).unwrap();

        assert_eq!(config.policy, RunPolicy::default());
        assert_eq!(config.demo_width, 3);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&dir).unwrap();

        let config_path = dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1.0"
run:
  time_scale: 0.1
  deadline_ms: 5000
  failure_policy: fail_fast
demo:
  width: 8
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        assert_eq!(parsed.version, "1.0");

        let config = resolve(Some((config_path.clone(), parsed)), no_env).unwrap();
        assert_eq!(config.policy.time_scale, 0.1);
        assert_eq!(config.policy.deadline_ms, Some(5000));
        assert_eq!(config.policy.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.demo_width, 8);
        assert_eq!(config.config_file, Some(config_path));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            version: "1.0".to_string(),
            run: Some(RunConfig {
                time_scale: Some(0.5),
                deadline_ms: None,
                failure_policy: None,
            }),
            demo: None,
        };
        let env: HashMap<&str, &str> = [
            ("FANJOIN_TIME_SCALE", "0.01"),
            ("FANJOIN_FAILURE_POLICY", "fail-fast"),
        ]
        .into_iter()
        .collect();

        let config = resolve(Some((PathBuf::from("/tmp/x.yaml"), file)), |k| {
            env.get(k).map(|v| v.to_string())
        })
        .unwrap();

        assert_eq!(config.policy.time_scale, 0.01);
        assert_eq!(config.policy.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_invalid_env_value() {
        let result = resolve(None, |k| {
            (k == "FANJOIN_DEADLINE_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());

        let result = resolve(None, |k| (k == "FANJOIN_TIME_SCALE").then(|| "-2".to_string()));
        assert!(result.is_err());
    }
}
