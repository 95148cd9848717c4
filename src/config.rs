//! Application configuration: a JSON file under the config directory plus
//! `DICE_*` environment overrides.
//!
//! The core never reads configuration; the CLI resolves effective values
//! here and hands the core plain arguments. The config directory defaults
//! to `~/.dice-average` and can be redirected with `DICE_CONFIG_DIR`,
//! which the integration tests rely on.

use std::env;
use std::fmt::{self, Display};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

pub const ENV_CONFIG_DIR: &str = "DICE_CONFIG_DIR";
pub const ENV_DEFAULT_ITERATIONS: &str = "DICE_DEFAULT_ITERATIONS";
pub const ENV_DEFAULT_SEED: &str = "DICE_DEFAULT_SEED";
pub const ENV_OUTPUT_FORMAT: &str = "DICE_OUTPUT_FORMAT";
pub const ENV_VERBOSE: &str = "DICE_VERBOSE";
pub const ENV_SHOW_STATS: &str = "DICE_SHOW_STATS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Validation(format!(
                "unknown output format `{other}`, expected `text` or `json`"
            ))),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Persisted defaults for the CLI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_iterations: u64,
    pub default_seed: Option<u64>,
    pub output_format: OutputFormat,
    pub verbose: bool,
    pub show_stats: bool,
    /// Most recent sessions kept in the history file.
    pub history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            default_iterations: 1,
            default_seed: None,
            output_format: OutputFormat::Text,
            verbose: false,
            show_stats: false,
            history_limit: 100,
        }
    }
}

impl AppConfig {
    /// Applies `DICE_*` environment overrides on top of `self`.
    /// Unparsable values are warned about and ignored rather than failing
    /// the invocation.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parsed::<u64>(ENV_DEFAULT_ITERATIONS) {
            if v >= 1 {
                self.default_iterations = v;
            } else {
                warn!("ignoring {ENV_DEFAULT_ITERATIONS}=0, must be at least 1");
            }
        }
        if let Ok(raw) = env::var(ENV_DEFAULT_SEED) {
            match raw.parse::<u64>() {
                Ok(seed) => self.default_seed = Some(seed),
                Err(_) if raw == "null" => self.default_seed = None,
                Err(_) => warn!("ignoring invalid {ENV_DEFAULT_SEED}={raw}"),
            }
        }
        if let Some(v) = env_parsed::<OutputFormat>(ENV_OUTPUT_FORMAT) {
            self.output_format = v;
        }
        if let Some(v) = env_bool(ENV_VERBOSE) {
            self.verbose = v;
        }
        if let Some(v) = env_bool(ENV_SHOW_STATS) {
            self.show_stats = v;
        }
        self
    }

    /// Sets one field from its config key and a string value.
    ///
    /// # Errors
    /// [`Error::Validation`] for unknown keys or unparsable values.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        let invalid = |what: &str| Error::Validation(format!("invalid {what} `{value}`"));
        match key {
            "default_iterations" => {
                let v: u64 = value.parse().map_err(|_| invalid("iteration count"))?;
                if v < 1 {
                    return Err(Error::Validation(
                        "default_iterations must be at least 1".into(),
                    ));
                }
                self.default_iterations = v;
            }
            "default_seed" => {
                self.default_seed = if value == "null" {
                    None
                } else {
                    Some(value.parse().map_err(|_| invalid("seed"))?)
                };
            }
            "output_format" => self.output_format = value.parse()?,
            "verbose" => self.verbose = parse_bool(value).ok_or_else(|| invalid("flag"))?,
            "show_stats" => self.show_stats = parse_bool(value).ok_or_else(|| invalid("flag"))?,
            "history_limit" => {
                let v: usize = value.parse().map_err(|_| invalid("history limit"))?;
                if v < 1 {
                    return Err(Error::Validation("history_limit must be at least 1".into()));
                }
                self.history_limit = v;
            }
            other => {
                return Err(Error::Validation(format!(
                    "unknown configuration key `{other}`"
                )));
            }
        }
        Ok(())
    }
}

fn env_parsed<T: FromStr>(var: &str) -> Option<T> {
    let raw = env::var(var).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring invalid {var}={raw}");
            None
        }
    }
}

fn env_bool(var: &str) -> Option<bool> {
    let raw = env::var(var).ok()?;
    let parsed = parse_bool(&raw);
    if parsed.is_none() {
        warn!("ignoring invalid {var}={raw}");
    }
    parsed
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Loads and saves [`AppConfig`] as JSON in a config directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigStore { dir: dir.into() }
    }

    /// `$DICE_CONFIG_DIR`, or `~/.dice-average`, or `.dice-average` when
    /// no home directory is known.
    pub fn default_dir() -> PathBuf {
        if let Some(dir) = env::var_os(ENV_CONFIG_DIR) {
            return PathBuf::from(dir);
        }
        match env::var_os("HOME") {
            Some(home) => Path::new(&home).join(".dice-average"),
            None => PathBuf::from(".dice-average"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.json")
    }

    /// Reads the config file; a missing file yields defaults and an
    /// unreadable one is warned about and replaced by defaults, so a broken
    /// config never blocks rolling dice.
    pub fn load(&self) -> AppConfig {
        let path = self.config_path();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return AppConfig::default();
        }
        match fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(Error::from))
        {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %path.display(), %err, "could not load config, using defaults");
                AppConfig::default()
            }
        }
    }

    /// # Errors
    /// [`Error::Io`] when the directory or file cannot be written.
    pub fn save(&self, config: &AppConfig) -> Result<(), Error> {
        fs::create_dir_all(&self.dir)?;
        let raw = serde_json::to_string_pretty(config)?;
        fs::write(self.config_path(), raw)?;
        Ok(())
    }

    /// Overwrites the stored config with defaults.
    pub fn reset(&self) -> Result<AppConfig, Error> {
        let config = AppConfig::default();
        self.save(&config)?;
        Ok(config)
    }
}
