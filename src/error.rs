//! Error types for the gateway, one enum per concern

use thiserror::Error;

/// Startup configuration failure. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError
{   /// Provider credential is not set
    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str)
  , /// Provider credential is set but obviously malformed
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String)
  , /// A variable could not be parsed or is out of range
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue
    {   key: &'static str
      , value: String
      , reason: String
    }
  , /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String)
}

/// Request body rejected before any provider call.
///
/// `label` is the human name of the checked field ("User input").
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError
{   #[error("Request body must be a JSON object")]
    MalformedBody
  , #[error("{label} is required")]
    MissingField { label: &'static str }
  , #[error("{label} must be a string")]
    WrongType { label: &'static str }
  , #[error(
      "Please provide more detailed input (minimum {min_chars} characters)"
    )]
    TooShort { min_chars: usize }
  , #[error("{label} must be at most {max_chars} characters")]
    TooLong { label: &'static str, max_chars: usize }
}

/// Failure reported by a chat-completion provider, by category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError
{   /// Credential rejected (401/403)
    #[error("Provider rejected credentials: {0}")]
    Auth(String)
  , /// Rate limit or quota exceeded (429)
    #[error("Provider rate limit exceeded: {0}")]
    RateLimit(String)
  , /// Any other non-success answer, or an unparseable body
    #[error("Provider API error: {0}")]
    Api(String)
  , /// The request never produced an HTTP answer
    #[error("Transport error: {0}")]
    Transport(String)
}

/// Outcome of a gateway call that did not produce usable text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError
{   /// Every attempt failed; carries the last provider error
    #[error("Provider failed after {attempts} attempt(s): {last}")]
    Exhausted
    {   attempts: u32
      , last: ProviderError
    }
  , /// The call succeeded but no choice carried content
    #[error("Provider returned an empty completion")]
    EmptyCompletion
}

/// Conversation store failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError
{   #[error("Conversation store is not running")]
    Disconnected
}

/// Failure to bring the HTTP server up or keep it running.
#[derive(Debug, Error)]
pub enum ServerError
{   #[error(transparent)]
    Config(#[from] ConfigError)
  , #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error)
}
