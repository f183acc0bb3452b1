//! Movie identification with a chat completion API.

use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;

use anyhow::Context;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::movie_rename::{Config, FileLogger, LogLevel};

/// Matches one leading ```` ```json ```` marker or one trailing ```` ``` ```` marker.
static RE_CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```(?i:json)?\s*|\s*```$").expect("Failed to create regex pattern for code fence"));

/// Movie name and release year guessed from a folder name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieGuess {
    pub movie_name: String,
    pub release_year: String,
}

/// Why a folder could not be identified.
#[derive(Debug, Error)]
pub enum IdentifyError {
    #[error("An error occurred while querying movie info: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to decode JSON response: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not parse movie info from response: {0}")]
    IncompleteGuess(String),
}

/// Client for the chat completion endpoint.
#[derive(Debug)]
pub struct MovieIdentifier {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    top_p: f64,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl MovieGuess {
    /// Folder name for this movie: `Movie Name [Year]`.
    ///
    /// Path separators in the guessed values are replaced so the name stays a single path component.
    #[must_use]
    pub fn folder_name(&self) -> String {
        let name = format!("{} [{}]", self.movie_name, self.release_year);
        name.replace(['/', '\\'], "-")
    }

    /// Folder name with a running index for resolving name collisions.
    #[must_use]
    pub fn numbered_folder_name(&self, number: usize) -> String {
        format!("{} ({number})", self.folder_name())
    }
}

impl fmt::Display for MovieGuess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.movie_name, self.release_year)
    }
}

impl IdentifyError {
    /// Log level used when this error is recovered from.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        match self {
            Self::IncompleteGuess(_) => LogLevel::Warning,
            Self::Request(_) | Self::Parse(_) => LogLevel::Error,
        }
    }
}

impl MovieIdentifier {
    /// Create a new client from config.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    }

    /// Prompt sent for a folder name.
    #[must_use]
    pub fn prompt(folder_name: &str) -> String {
        format!(
            "Identify the movie from this folder name: {folder_name}. \
            Return only JSON with the keys 'movie_name' and 'release_year'."
        )
    }

    /// Guess the movie for a folder name.
    ///
    /// Request and parsing failures are logged and result in `None`.
    /// Every call performs a new request.
    pub async fn identify(&self, folder_name: &str, logger: &mut FileLogger) -> Option<MovieGuess> {
        logger.info(format!("Querying movie info for folder: {folder_name}"));
        match self.query(folder_name, logger).await {
            Ok(guess) => {
                logger.info(format!("Movie identified: {guess}"));
                Some(guess)
            }
            Err(error) => {
                logger.log(error.level(), &error.to_string());
                None
            }
        }
    }

    async fn query(&self, folder_name: &str, logger: &mut FileLogger) -> Result<MovieGuess, IdentifyError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: Self::prompt(folder_name),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await?.error_for_status()?;
        let body = response.text().await?;
        logger.debug(format!("Raw response: {body}"));

        let content = extract_content(&body)?;
        let movie_info = strip_code_fence(content.trim());
        logger.info(format!("AI Response: {movie_info}"));

        parse_guess(&movie_info)
    }
}

/// Get the message text of the first completion choice.
///
/// A response without `choices[0].message.content` is a `Parse` error.
fn extract_content(body: &str) -> Result<String, IdentifyError> {
    let response: ChatResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            IdentifyError::Parse(serde::de::Error::custom(
                "response did not contain choices[0].message.content",
            ))
        })
}

/// Remove a markdown code fence wrapping a JSON payload.
///
/// Strips at most one leading ```` ```json ```` marker and one trailing ```` ``` ```` marker.
/// Anything else is returned as is.
///
/// ```rust
/// use movie_tools::movie_rename::strip_code_fence;
///
/// let fenced = "```json\n{\"movie_name\": \"Heat\"}\n```";
/// assert_eq!(strip_code_fence(fenced), "{\"movie_name\": \"Heat\"}");
/// assert_eq!(strip_code_fence("{}"), "{}");
/// ```
#[must_use]
pub fn strip_code_fence(text: &str) -> Cow<'_, str> {
    RE_CODE_FENCE.replace_all(text, "")
}

/// Parse the AI reply into a movie guess.
///
/// Both `movie_name` and `release_year` must be present and non-empty.
/// A numeric `release_year` is accepted.
///
/// # Errors
/// Returns `Parse` for invalid JSON and `IncompleteGuess` for missing values.
pub fn parse_guess(text: &str) -> Result<MovieGuess, IdentifyError> {
    let value: Value = serde_json::from_str(text)?;
    match (field_text(&value, "movie_name"), field_text(&value, "release_year")) {
        (Some(movie_name), Some(release_year)) => Ok(MovieGuess {
            movie_name,
            release_year,
        }),
        _ => Err(IdentifyError::IncompleteGuess(text.to_string())),
    }
}

fn field_text(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}
