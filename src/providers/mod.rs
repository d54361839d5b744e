//! Chat-completion provider contract and implementations

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;

pub use openai::OpenAiClient;

/// Author of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role
{   System
  , User
  , Assistant
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage
{   pub role: Role
  , pub content: String
}

impl ChatMessage
{   pub fn system(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self
    {   ChatMessage { role: Role::Assistant, content: content.into() }
    }
}

/// One chat-completion call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest
{   pub model: String
  , pub messages: Vec<ChatMessage>
  , pub temperature: f32
  , pub max_tokens: u32
}

/// Content of each returned choice, in provider order.
/// `None` when a choice carried no message content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionResponse
{   pub choices: Vec<Option<String>>
}

impl CompletionResponse
{   /// Text of the first choice, if it is non-blank
    pub fn first_text(&self) -> Option<&str>
    {   self.choices
          .first()
          .and_then(|c| c.as_deref())
          .filter(|text| !text.trim().is_empty())
    }
}

/// A chat-completion backend
#[async_trait]
pub trait ChatProvider: Send + Sync
{   /// Provider name for logs
    fn name(&self) -> &str;

    /// Perform exactly one completion call, no retries.
    async fn complete(&self, request: &CompletionRequest)
      -> Result<CompletionResponse, ProviderError>;
}

#[cfg(test)]
mod tests
{   use super::*;

    #[test]
    fn roles_serialize_lowercase()
    {   let json = serde_json::to_value(ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hi"}));
    }

    #[test]
    fn first_text_skips_blank_content()
    {   let empty = CompletionResponse::default();
        assert_eq!(empty.first_text(), None);

        let blank = CompletionResponse { choices: vec![Some("  \n".into())] };
        assert_eq!(blank.first_text(), None);

        let missing = CompletionResponse { choices: vec![None] };
        assert_eq!(missing.first_text(), None);

        let ok = CompletionResponse { choices: vec![Some("text".into()), None] };
        assert_eq!(ok.first_text(), Some("text"));
    }
}
