//! Request body validation, run before any provider call

use serde_json::Value;
use crate::error::ValidationError;

/// Minimum trimmed length of a `/generate` prompt.
pub const MIN_USER_INPUT_CHARS: usize = 10;

/// Checks one text field of a decoded JSON body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputValidator
{   /// JSON key to read
    pub field: &'static str
  , /// Name used in error messages
    pub label: &'static str
  , /// Minimum length after trimming, in characters
    pub min_chars: usize
  , /// Report a whitespace-only value as missing instead of too short
    pub blank_is_missing: bool
}

impl InputValidator
{   /// `{"userInput": ...}` on the generate route
    pub const USER_INPUT: InputValidator = InputValidator
    {   field: "userInput"
      , label: "User input"
      , min_chars: MIN_USER_INPUT_CHARS
      , blank_is_missing: false
    };

    /// `{"message": ...}` on the chat route
    pub const CHAT_MESSAGE: InputValidator = InputValidator
    {   field: "message"
      , label: "Message"
      , min_chars: 1
      , blank_is_missing: true
    };

    /// Returns the trimmed field value, or why the body was rejected.
    pub fn validate(&self, body: &Value)
      -> Result<String, ValidationError>
    {   let object = body.as_object()
          .ok_or(ValidationError::MalformedBody)?;

        let text = match object.get(self.field)
        {   None | Some(Value::Null) => {
              return Err(ValidationError::MissingField
              {   label: self.label
              });
            }
          , Some(Value::String(s)) => s
          , Some(_) => {
              return Err(ValidationError::WrongType
              {   label: self.label
              });
            }
        };

        let trimmed = text.trim();
        if text.is_empty() || (self.blank_is_missing && trimmed.is_empty())
        {   return Err(ValidationError::MissingField
            {   label: self.label
            });
        }
        if trimmed.chars().count() < self.min_chars
        {   return Err(ValidationError::TooShort
            {   min_chars: self.min_chars
            });
        }
        Ok(trimmed.to_string())
    }

    /// Decodes raw bytes first; undecodable JSON counts as malformed.
    pub fn validate_bytes(&self, raw: &[u8])
      -> Result<String, ValidationError>
    {   let body: Value = serde_json::from_slice(raw)
          .map_err(|_| ValidationError::MalformedBody)?;
        self.validate(&body)
    }
}

/// Reads an optional string field; absent or `null` gives `None`.
/// Blank strings count as absent. Longer than `max_chars` after trimming
/// is rejected.
pub fn optional_text(
  body: &Value
, field: &str
, label: &'static str
, max_chars: usize
) -> Result<Option<String>, ValidationError>
{   let object = body.as_object().ok_or(ValidationError::MalformedBody)?;
    match object.get(field)
    {   None | Some(Value::Null) => Ok(None)
      , Some(Value::String(s)) => {
          let trimmed = s.trim();
          if trimmed.chars().count() > max_chars
          {   return Err(ValidationError::TooLong { label, max_chars });
          }
          Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
      , Some(_) => Err(ValidationError::WrongType { label })
    }
}
