/*!
 * Error types for the subtrans application.
 *
 * Each layer gets its own thiserror enum:
 * - `ProviderError`: the HTTP call to the LLM provider
 * - `SubtitleError`: the subtitle text format
 * - `TranslationError`: translator client and batch orchestration
 * - `VerificationError`: the review workflow (scanner, gate, coordinator)
 * - `AppError`: everything above plus file and configuration failures
 *
 * Cancellation of a translation job is not an error: it is reported
 * through `TranslationOutcome::Cancelled`.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::ConnectionError(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors that can occur during subtitle processing
#[derive(Error, Debug)]
pub enum SubtitleError {
    /// The document contained no record with an id, a time range and text
    #[error("No valid subtitle blocks found in the content")]
    NoValidBlocks,

    /// Two records share the same block number
    #[error("Duplicate subtitle block number: {0}")]
    DuplicateBlockNumber(usize),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error with subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// The model answered, but not with anything we can use
    #[error("Malformed translator response: {0}")]
    MalformedResponse(String),

    /// The provider returned no content at all
    #[error("Translator returned an empty response")]
    EmptyResponse,

    /// A caller-supplied argument was rejected before any request was made
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Errors that stop a verification round
#[derive(Error, Debug)]
pub enum VerificationError {
    /// The translator failed while scanning or re-translating
    #[error("Translator failure during verification: {0}")]
    Translator(#[from] TranslationError),

    /// The approval round was closed before a decision arrived
    #[error("Approval gate for job {job_id} closed while waiting on block {block_number}")]
    GateClosed {
        /// Job the round belonged to
        job_id: String,
        /// Block whose decision never arrived
        block_number: usize,
    },

    /// A decision was submitted for a job with no open approval round
    #[error("No approval round is active for job {0}")]
    NoActiveRound(String),

    /// The decision queue of the job is full
    #[error("Decision queue for job {0} is full")]
    QueueFull(String),

    /// Original and translated documents cannot be aligned
    #[error("Invalid verification input: {0}")]
    InvalidInput(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the configuration layer
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from subtitle processing
    #[error("Subtitle error: {0}")]
    Subtitle(#[from] SubtitleError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Error from verification
    #[error("Verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
