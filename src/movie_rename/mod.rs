//! Movie folder renaming.
//!
//! Flattens a directory tree of movie folders to its root,
//! identifies each folder with an AI chat-completion service,
//! and renames confirmed folders to `Movie Name [Year]`.

mod config;
mod identify;
mod logger;
mod organize;
mod stats;

pub use config::{
    API_KEY_ENV, Config, DEFAULT_ENDPOINT, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P,
    MovieRenameConfig,
};
pub use identify::{IdentifyError, MovieGuess, MovieIdentifier, parse_guess, strip_code_fence};
pub use logger::{FileLogger, LogLevel};
pub use organize::{FolderEntry, FolderOrganizer, FolderOutcome};
pub use stats::RunStats;
