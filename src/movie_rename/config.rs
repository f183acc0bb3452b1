//! Configuration for movie renaming.

use std::path::PathBuf;
use std::time::Duration;
use std::{fmt, fs};

use anyhow::Context;
use serde::Deserialize;

/// Chat completion endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://chat.tuzumkuru.com/api/chat/completions";
pub const DEFAULT_MODEL: &str = "grok-beta";
pub const DEFAULT_MAX_TOKENS: u32 = 200;
pub const DEFAULT_TEMPERATURE: f64 = 0.5;
pub const DEFAULT_TOP_P: f64 = 1.0;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPEN_WEBUI_API_KEY";

/// Config from the user config file.
#[derive(Debug, Default, Deserialize)]
pub struct MovieRenameConfig {
    #[serde(default)]
    pub auto: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub dryrun: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub skip_hidden: bool,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub verbose: bool,
}

/// Wrapper needed for parsing the config section.
#[derive(Debug, Default, Deserialize)]
struct UserConfig {
    #[serde(default)]
    movie_rename: MovieRenameConfig,
}

/// Final config created from CLI arguments and user config file.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub auto: bool,
    pub debug: bool,
    pub dryrun: bool,
    pub endpoint: String,
    pub skip_hidden: bool,
    pub log_dir: PathBuf,
    pub max_tokens: u32,
    pub model: String,
    pub temperature: f64,
    pub timeout: Option<Duration>,
    pub top_p: f64,
    pub verbose: bool,
}

impl MovieRenameConfig {
    /// Try to read user config from the file if it exists.
    /// Otherwise, fall back to default config.
    ///
    /// # Errors
    /// Returns an error if config file exists but cannot be read or parsed.
    pub fn get_user_config() -> anyhow::Result<Self> {
        let Some(path) = crate::config_path() else {
            return Ok(Self::default());
        };

        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse config file {}:\n{e}", path.display())),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {error}",
                path.display()
            )),
        }
    }

    /// Parse config from a TOML string.
    ///
    /// # Errors
    /// Returns an error if the TOML string is invalid.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        toml::from_str::<UserConfig>(toml_str)
            .map(|config| config.movie_rename)
            .with_context(|| "Failed to parse config TOML")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_user_config(MovieRenameConfig::default())
    }
}

impl Config {
    /// Create config from user config file values, using defaults for anything missing.
    #[must_use]
    pub fn from_user_config(user_config: MovieRenameConfig) -> Self {
        Self {
            api_key: None,
            auto: user_config.auto,
            debug: user_config.debug,
            dryrun: user_config.dryrun,
            endpoint: user_config.endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            skip_hidden: user_config.skip_hidden,
            log_dir: user_config.log_dir.unwrap_or_else(|| PathBuf::from(".")),
            max_tokens: user_config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            model: user_config.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: user_config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            timeout: user_config.timeout.map(Duration::from_secs),
            top_p: user_config.top_p.unwrap_or(DEFAULT_TOP_P),
            verbose: user_config.verbose,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Config:")?;
        writeln!(f, "  auto:        {}", crate::colorize_bool(self.auto))?;
        writeln!(f, "  debug:       {}", crate::colorize_bool(self.debug))?;
        writeln!(f, "  dryrun:      {}", crate::colorize_bool(self.dryrun))?;
        writeln!(f, "  skip hidden: {}", crate::colorize_bool(self.skip_hidden))?;
        writeln!(f, "  verbose:     {}", crate::colorize_bool(self.verbose))?;
        writeln!(f, "  api key:     {}", crate::colorize_bool(self.api_key.is_some()))?;
        writeln!(f, "  endpoint:    {}", self.endpoint)?;
        writeln!(f, "  model:       {}", self.model)?;
        writeln!(f, "  max tokens:  {}", self.max_tokens)?;
        writeln!(f, "  temperature: {}", self.temperature)?;
        writeln!(f, "  top p:       {}", self.top_p)?;
        writeln!(
            f,
            "  timeout:     {}",
            self.timeout
                .map_or_else(|| "none".to_string(), |timeout| format!("{}s", timeout.as_secs()))
        )?;
        write!(f, "  log dir:     {}", self.log_dir.display())
    }
}
