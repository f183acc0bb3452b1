use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use clap_complete::Shell;

use movie_tools::movie_rename::{API_KEY_ENV, Config, MovieRenameConfig};

#[derive(Parser)]
#[command(
    author,
    version,
    name = env!("CARGO_BIN_NAME"),
    about = "Identify movie folders with AI, flatten them to the root and rename to 'Name [Year]'"
)]
pub struct MovieRenameArgs {
    /// Root directory containing movie folders
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub path: Option<PathBuf>,

    /// Print debug information
    #[arg(short = 'D', long)]
    debug: bool,

    /// Directory for the run log file
    #[arg(short = 'o', long, name = "DIR", value_hint = clap::ValueHint::DirPath)]
    log_dir: Option<PathBuf>,

    /// Chat model to use
    #[arg(short = 'm', long, name = "MODEL")]
    model: Option<String>,

    /// Only print changes without moving or renaming folders
    #[arg(short = 'p', long)]
    print: bool,

    /// Skip hidden directories and their contents
    #[arg(short = 's', long)]
    skip_hidden: bool,

    /// Request timeout in seconds
    #[arg(short = 't', long, name = "SECONDS")]
    timeout: Option<u64>,

    /// Chat completion endpoint URL
    #[arg(short = 'u', long, name = "URL")]
    url: Option<String>,

    /// Rename without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Generate shell completion
    #[arg(short = 'l', long, name = "SHELL")]
    pub completion: Option<Shell>,

    /// Print verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl MovieRenameArgs {
    /// Create config from command line args and the user config file.
    ///
    /// # Errors
    /// Returns an error if the user config file cannot be read or parsed.
    pub fn to_config(&self) -> Result<Config> {
        let user_config = MovieRenameConfig::get_user_config()?;
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
        Ok(self.merge(Config::from_user_config(user_config), api_key))
    }

    /// Apply command line values on top of the user config.
    fn merge(&self, config: Config, api_key: Option<String>) -> Config {
        Config {
            api_key,
            auto: self.yes || config.auto,
            debug: self.debug || config.debug,
            dryrun: self.print || config.dryrun,
            endpoint: self.url.clone().unwrap_or(config.endpoint),
            skip_hidden: self.skip_hidden || config.skip_hidden,
            log_dir: self.log_dir.clone().unwrap_or(config.log_dir),
            model: self.model.clone().unwrap_or(config.model),
            timeout: self.timeout.map(Duration::from_secs).or(config.timeout),
            verbose: self.verbose || config.verbose,
            ..config
        }
    }
}
