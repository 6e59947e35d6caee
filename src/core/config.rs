//! Configuration system with environment variable support and validation

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::errors::{ErrorContext, PostureError, PostureResult};
use super::types::Section;
use crate::probes::PROBE_IDS;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub weights: WeightsConfig,
    #[serde(default)]
    pub probes: ProbesConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub debug_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between refresh cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Timeout for probes that do not declare one and have no override
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Probes allowed to run at once within a cycle, 0 for no limit
    #[serde(default)]
    pub max_concurrent_probes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default)]
    pub sections: HashMap<Section, f64>,
    /// Per-probe weights, taking precedence over the section weight
    #[serde(default)]
    pub probes: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbesConfig {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub timeouts_ms: HashMap<String, u64>,
    /// Home directory inspected by the privacy probes, defaults to $HOME
    #[serde(default)]
    pub home_dir: Option<PathBuf>,
    #[serde(default = "default_public_ip_url")]
    pub public_ip_url: String,
    #[serde(default = "default_tor_socks_addr")]
    pub tor_socks_addr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_format")]
    pub format: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_app_name() -> String {
    "PostureGuard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_public_ip_url() -> String {
    "https://ifconfig.me".to_string()
}

fn default_tor_socks_addr() -> String {
    "127.0.0.1:9050".to_string()
}

fn default_output_format() -> String {
    "text".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
            debug_mode: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            max_concurrent_probes: 0,
        }
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            disabled: Vec::new(),
            timeouts_ms: HashMap::new(),
            home_dir: None,
            public_ip_url: default_public_ip_url(),
            tor_socks_addr: default_tor_socks_addr(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable expansion
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> PostureResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file '{}'", path.display()))?;

        let expanded_content = expand_env_vars(&content);
        let config: Config = serde_yaml::from_str(&expanded_content)
            .map_err(|e| PostureError::config(format!("Invalid YAML in config file: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file if one is given, then apply environment overrides
    pub fn load_with_overrides(path: Option<&Path>) -> PostureResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Config::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to existing configuration
    pub fn apply_env_overrides(&mut self) -> PostureResult<()> {
        if let Ok(log_level) = env::var("POSTUREGUARD_LOG_LEVEL") {
            self.app.log_level = log_level;
        }

        if let Ok(debug) = env::var("POSTUREGUARD_DEBUG") {
            self.app.debug_mode = debug.parse().unwrap_or(false);
        }

        if let Ok(interval) = env::var("POSTUREGUARD_INTERVAL_SECS") {
            self.scheduler.interval_seconds = interval.parse().map_err(|_| {
                PostureError::config(format!("POSTUREGUARD_INTERVAL_SECS is not a number: {}", interval))
            })?;
        }

        if let Ok(home) = env::var("POSTUREGUARD_HOME") {
            self.probes.home_dir = Some(PathBuf::from(home));
        }

        if let Ok(url) = env::var("POSTUREGUARD_PUBLIC_IP_URL") {
            self.probes.public_ip_url = url;
        }

        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> PostureResult<()> {
        if !["trace", "debug", "info", "warn", "error"].contains(&self.app.log_level.as_str()) {
            return Err(PostureError::validation(format!(
                "Invalid log level: {}",
                self.app.log_level
            )));
        }

        if self.scheduler.interval_seconds == 0 {
            return Err(PostureError::validation(
                "scheduler.interval_seconds must be greater than zero",
            ));
        }

        if self.executor.default_timeout_ms == 0 {
            return Err(PostureError::validation(
                "executor.default_timeout_ms must be greater than zero",
            ));
        }

        if !["json", "text"].contains(&self.output.format.as_str()) {
            return Err(PostureError::validation(format!(
                "Invalid output format: {}",
                self.output.format
            )));
        }

        let section_weights = self.weights.sections.values();
        for weight in section_weights.chain(self.weights.probes.values()) {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(PostureError::validation(format!(
                    "Weights must be finite and non-negative, got {}",
                    weight
                )));
            }
        }

        let referenced = self
            .weights
            .probes
            .keys()
            .chain(self.probes.timeouts_ms.keys())
            .chain(self.probes.disabled.iter());
        for id in referenced {
            if !PROBE_IDS.contains(&id.as_str()) {
                return Err(PostureError::validation(format!("Unknown probe id: {}", id)));
            }
        }

        if let Some((id, _)) = self.probes.timeouts_ms.iter().find(|(_, ms)| **ms == 0) {
            return Err(PostureError::validation(format!(
                "Timeout for probe '{}' must be greater than zero",
                id
            )));
        }

        Ok(())
    }

    /// Serialize to YAML
    pub fn to_yaml(&self) -> PostureResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> PostureResult<()> {
        let content = self.to_yaml()?;
        fs::write(&path, content).with_context(|| {
            format!("Failed to write config file '{}'", path.as_ref().display())
        })
    }
}

/// Expand `${VAR}` and `$VAR` references; unknown variables are left as-is
fn expand_env_vars(content: &str) -> String {
    let env_var_regex = match regex::Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)") {
        Ok(regex) => regex,
        Err(_) => return content.to_string(),
    };

    env_var_regex
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}
