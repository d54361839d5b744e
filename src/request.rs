//! JSON bodies returned by the HTTP routes

use serde::{Deserialize, Serialize};
use crate::providers::ChatMessage;

/// `POST /generate` success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionResponse
{   pub suggestion: String
}

/// `POST /chat` success
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse
{   pub response: String
  , pub conversation_id: String
}

/// `GET /chat/history/:id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse
{   pub history: Vec<ChatMessage>
}

/// Plain acknowledgement, e.g. after clearing a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse
{   pub message: String
}

/// `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse
{   pub status: String
}

/// Error envelope.
///
/// `details` is omitted entirely for client errors, and `null` for server
/// errors when diagnostic exposure is off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody
{   pub error: String
  , #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Option<String>>
}

#[cfg(test)]
mod tests
{   use super::*;
    use serde_json::json;

    #[test]
    fn details_are_omitted_null_or_present()
    {   let omitted = ErrorBody { error: "bad".into(), details: None };
        assert_eq!(serde_json::to_value(&omitted).unwrap(), json!({"error": "bad"}));

        let hidden = ErrorBody { error: "down".into(), details: Some(None) };
        assert_eq!(
          serde_json::to_value(&hidden).unwrap(),
          json!({"error": "down", "details": null})
        );

        let shown = ErrorBody
        {   error: "down".into()
          , details: Some(Some("429 slow down".into()))
        };
        assert_eq!(
          serde_json::to_value(&shown).unwrap(),
          json!({"error": "down", "details": "429 slow down"})
        );
    }
}
