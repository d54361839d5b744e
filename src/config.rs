//! Process configuration, read once from the environment at startup

use std::time::Duration;
use log::{debug, warn};
use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_ORIGIN: &str = "https://nouvo.dev";

/// Persona sent as the first message of every completion call.
pub const DEFAULT_SYSTEM_PROMPT: &str
  = "You are a helpful assistant representing Nouvo, a professional web \
     development company. When providing website suggestions, frame them \
     as if Nouvo has already built similar solutions. Include specific \
     features, design elements, and user engagement strategies that Nouvo \
     has successfully implemented. Always mention that these are \
     solutions Nouvo has experience with and can build for the client.";

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const MIN_API_KEY_LEN: usize = 20;

/// Settings for the chat-completion provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig
{   /// Bearer credential
    pub api_key: String
  , /// Base URL, without trailing slash
    pub api_base: String
  , pub model: String
  , pub temperature: f32
  , /// Output token cap
    pub max_tokens: u32
  , /// Timeout for one HTTP call
    pub timeout: Duration
  , pub system_prompt: String
}

/// Fixed-delay retry settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig
{   /// Total attempts per request, at least 1
    pub attempts: u32
  , pub delay: Duration
}

impl Default for RetryConfig
{   fn default() -> Self
    {   RetryConfig
        {   attempts: 3
          , delay: Duration::from_secs(1)
        }
    }
}

/// HTTP surface settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig
{   pub host: String
  , pub port: u16
  , /// Empty means any origin
    pub allowed_origins: Vec<String>
  , /// Include internal error text in responses
    pub expose_error_details: bool
  , /// Stored messages kept per conversation
    pub chat_history_limit: usize
  , /// Conversations kept before the least recently used is evicted
    pub chat_max_conversations: usize
}

/// Whole-process configuration. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Config
{   pub provider: ProviderConfig
  , pub retry: RetryConfig
  , pub server: ServerConfig
}

impl Config
{   /// Load from the process environment, after seeding it from `.env`
    /// when one exists.
    pub fn from_env() -> Result<Self, ConfigError>
    {   match dotenvy::dotenv()
        {   Ok(path) => debug!("Loaded environment from {}", path.display())
          , Err(e) if e.not_found() => debug!("No .env file found")
          , Err(e) => warn!("Ignoring unreadable .env file: {}", e)
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
      F: Fn(&str) -> Option<String>
    {   let get = |key: &str| {
          lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
        };

        let api_key = get(API_KEY_VAR)
          .ok_or(ConfigError::MissingApiKey(API_KEY_VAR))?;
        check_api_key(&api_key)?;

        let temperature: f32
          = parse_or(&get, "OPENAI_TEMPERATURE", 0.7)?;
        if !(0.0..=2.0).contains(&temperature)
        {   return Err(invalid(
              "OPENAI_TEMPERATURE"
            , temperature.to_string()
            , "must be between 0.0 and 2.0"
            ));
        }

        let max_tokens: u32 = parse_or(&get, "OPENAI_MAX_TOKENS", 500)?;
        if max_tokens == 0
        {   return Err(invalid("OPENAI_MAX_TOKENS", "0", "must be > 0"));
        }

        let attempts: u32 = parse_or(&get, "RETRY_ATTEMPTS", 3)?;
        if attempts == 0
        {   return Err(invalid("RETRY_ATTEMPTS", "0", "must be >= 1"));
        }

        let chat_history_limit: usize
          = parse_or(&get, "CHAT_HISTORY_LIMIT", 20)?;
        if chat_history_limit == 0
        {   return Err(invalid("CHAT_HISTORY_LIMIT", "0", "must be > 0"));
        }

        let chat_max_conversations: usize
          = parse_or(&get, "CHAT_MAX_CONVERSATIONS", 1000)?;
        if chat_max_conversations == 0
        {   return Err(invalid("CHAT_MAX_CONVERSATIONS", "0", "must be > 0"));
        }

        let timeout_secs: u64 = parse_or(&get, "OPENAI_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0
        {   return Err(invalid("OPENAI_TIMEOUT_SECS", "0", "must be > 0"));
        }

        let origins = get("ALLOWED_ORIGINS")
          .or_else(|| get("FRONTEND_URL"))
          .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());

        let config = Config
        {   provider: ProviderConfig
            {   api_key
              , api_base: get("OPENAI_API_BASE")
                  .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                  .trim_end_matches('/')
                  .to_string()
              , model: get("OPENAI_MODEL")
                  .unwrap_or_else(|| DEFAULT_MODEL.to_string())
              , temperature
              , max_tokens
              , timeout: Duration::from_secs(timeout_secs)
              , system_prompt: get("SYSTEM_PROMPT")
                  .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
            }
          , retry: RetryConfig
            {   attempts
              , delay: Duration::from_millis(
                  parse_or(&get, "RETRY_DELAY_MS", 1000)?
                )
            }
          , server: ServerConfig
            {   host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string())
              , port: parse_or(&get, "PORT", 5000)?
              , allowed_origins: parse_origins(&origins)
              , expose_error_details: parse_flag(
                  &get
                , "DEBUG_ERROR_DETAILS"
                )?
              , chat_history_limit
              , chat_max_conversations
            }
        };

        debug!(
          "Configuration loaded: model={}, attempts={}, origins={:?}",
          config.provider.model,
          config.retry.attempts,
          config.server.allowed_origins
        );
        Ok(config)
    }
}

/// Sanity check only; the provider is the authority on validity.
fn check_api_key(key: &str) -> Result<(), ConfigError>
{   if key.chars().any(char::is_whitespace)
    {   return Err(ConfigError::InvalidApiKey(
          "contains whitespace".to_string()
        ));
    }
    if key.len() < MIN_API_KEY_LEN
    {   return Err(ConfigError::InvalidApiKey(format!(
          "shorter than {} characters", MIN_API_KEY_LEN
        )));
    }
    Ok(())
}

/// Comma-separated list; a lone `*` means any origin.
fn parse_origins(raw: &str) -> Vec<String>
{   let origins: Vec<String> = raw
      .split(',')
      .map(|o| o.trim().trim_end_matches('/').to_string())
      .filter(|o| !o.is_empty())
      .collect();
    if origins.iter().any(|o| o == "*")
    {   return vec![];
    }
    origins
}

fn parse_or<G, T>(
  get: &G
, key: &'static str
, default: T
) -> Result<T, ConfigError>
where
  G: Fn(&str) -> Option<String>
, T: std::str::FromStr
, T::Err: std::fmt::Display
{   match get(key)
    {   None => Ok(default)
      , Some(raw) => raw.parse::<T>().map_err(|e| {
          invalid(key, raw.clone(), &e.to_string())
        })
    }
}

fn parse_flag<G>(get: &G, key: &'static str) -> Result<bool, ConfigError>
where
  G: Fn(&str) -> Option<String>
{   match get(key).map(|v| v.to_ascii_lowercase()).as_deref()
    {   None | Some("0") | Some("false") | Some("no") | Some("off") => {
          Ok(false)
        }
      , Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true)
      , Some(other) => Err(invalid(key, other, "expected a boolean"))
    }
}

fn invalid(
  key: &'static str
, value: impl Into<String>
, reason: &str
) -> ConfigError
{   ConfigError::InvalidValue
    {   key
      , value: value.into()
      , reason: reason.to_string()
    }
}
