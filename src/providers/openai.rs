use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use log::{debug, trace, error};
use reqwest::StatusCode;
use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError};
use super::{ChatMessage, ChatProvider, CompletionRequest, CompletionResponse};

// ===== Wire Types =====

#[derive(Debug, Clone, Serialize)]
struct OpenAiChatRequest<'a>
{   model: &'a str
  , messages: &'a [ChatMessage]
  , temperature: f32
  , max_tokens: u32
  , stream: bool
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChatResponse
{   #[serde(default)]
    choices: Vec<Choice>
}

#[derive(Debug, Clone, Deserialize)]
struct Choice
{   #[serde(default)]
    message: Option<ChoiceMessage>
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage
{   #[serde(default)]
    content: Option<String>
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorEnvelope
{   error: OpenAiErrorBody
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiErrorBody
{   message: String
}

// ===== Client =====

/// OpenAI-compatible `/chat/completions` client
pub struct OpenAiClient
{   api_key: String
  , api_base: String
  , http_client: reqwest::Client
}

impl OpenAiClient
{   pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError>
    {   debug!("Creating OpenAiClient for {}", config.api_base);
        let http_client = reqwest::Client::builder()
          .timeout(config.timeout)
          .build()
          .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(OpenAiClient
        {   api_key: config.api_key.clone()
          , api_base: config.api_base.clone()
          , http_client
        })
    }

    fn endpoint(&self) -> String
    {   format!("{}/chat/completions", self.api_base)
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient
{   fn name(&self) -> &str
    {   "openai"
    }

    async fn complete(&self, request: &CompletionRequest)
      -> Result<CompletionResponse, ProviderError>
    {   let body = OpenAiChatRequest
        {   model: &request.model
          , messages: &request.messages
          , temperature: request.temperature
          , max_tokens: request.max_tokens
          , stream: false
        };

        trace!("OpenAI request: {:?}", body);

        let response = self.http_client
          .post(self.endpoint())
          .bearer_auth(&self.api_key)
          .json(&body)
          .send()
          .await
          .map_err(|e| {
            error!("HTTP error: {}", e);
            ProviderError::Transport(e.to_string())
          })?;

        let status = response.status();
        trace!("OpenAI response status: {}", status);

        if !status.is_success()
        {   let error_text = response.text().await
              .unwrap_or_else(|_| "Unknown error".to_string());
            error!("OpenAI API error {}: {}", status, error_text);
            return Err(classify_status(status, &error_text));
        }

        let chat_response: OpenAiChatResponse
          = response.json().await.map_err(|e| {
            error!("Parse error: {}", e);
            ProviderError::Api(format!("unreadable response: {}", e))
          })?;

        debug!("OpenAI returned {} choice(s)", chat_response.choices.len());
        Ok(CompletionResponse
        {   choices: chat_response.choices
              .into_iter()
              .map(|c| c.message.and_then(|m| m.content))
              .collect()
        })
    }
}

/// Map a non-success answer to its error category.
pub(crate) fn classify_status(status: StatusCode, body: &str)
  -> ProviderError
{   let message = serde_json::from_str::<OpenAiErrorEnvelope>(body)
      .map(|e| e.error.message)
      .unwrap_or_else(|_| body.to_string());
    let detail = format!("{} {}", status.as_u16(), message);

    match status
    {   StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
          ProviderError::Auth(detail)
        }
      , StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimit(detail)
      , _ => ProviderError::Api(detail)
    }
}
