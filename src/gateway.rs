//! Completion gateway: prompt assembly, bounded retry, result checks

use std::sync::Arc;
use log::{debug, error, info};
use crate::config::ProviderConfig;
use crate::error::GatewayError;
use crate::providers::{ChatMessage, ChatProvider, CompletionRequest};
use crate::retry::RetryPolicy;

/// Fixed sampling parameters and persona applied to every call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings
{   pub model: String
  , pub system_prompt: String
  , pub temperature: f32
  , pub max_tokens: u32
}

impl From<&ProviderConfig> for CompletionSettings
{   fn from(config: &ProviderConfig) -> Self
    {   CompletionSettings
        {   model: config.model.clone()
          , system_prompt: config.system_prompt.clone()
          , temperature: config.temperature
          , max_tokens: config.max_tokens
        }
    }
}

/// Wraps one provider with the retry policy and the fixed prompt.
#[derive(Clone)]
pub struct CompletionGateway
{   provider: Arc<dyn ChatProvider>
  , settings: CompletionSettings
  , retry: RetryPolicy
}

impl CompletionGateway
{   pub fn new(
      provider: Arc<dyn ChatProvider>
    , settings: CompletionSettings
    , retry: RetryPolicy
    ) -> Self
    {   CompletionGateway
        {   provider
          , settings
          , retry
        }
    }

    /// Turn validated user text into a suggestion.
    ///
    /// The prompt is the system message followed by `text` verbatim.
    pub async fn generate(&self, text: &str)
      -> Result<String, GatewayError>
    {   self.complete(vec![ChatMessage::user(text)]).await
    }

    /// Complete a conversation. The system message is prepended here;
    /// `conversation` must not contain one.
    pub async fn complete(&self, conversation: Vec<ChatMessage>)
      -> Result<String, GatewayError>
    {   let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(self.settings.system_prompt.clone()));
        messages.extend(conversation);

        let request = CompletionRequest
        {   model: self.settings.model.clone()
          , messages
          , temperature: self.settings.temperature
          , max_tokens: self.settings.max_tokens
        };

        debug!(
          "Calling {} with {} message(s)",
          self.provider.name(),
          request.messages.len()
        );

        let response = self.retry
          .run(|_| self.provider.complete(&request))
          .await
          .map_err(|exhausted| {
            error!(
              "{} failed after {} attempt(s): {}",
              self.provider.name(),
              exhausted.attempts,
              exhausted.last
            );
            GatewayError::Exhausted
            {   attempts: exhausted.attempts
              , last: exhausted.last
            }
          })?;

        match response.first_text()
        {   Some(text) => {
              info!("Completion produced {} chars", text.chars().count());
              Ok(text.to_string())
            }
          , None => {
              error!(
                "{} returned {} choice(s) without content",
                self.provider.name(),
                response.choices.len()
              );
              Err(GatewayError::EmptyCompletion)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing
{   //! Scripted provider shared by unit tests
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::error::ProviderError;
    use crate::providers::{ChatProvider, CompletionRequest, CompletionResponse};

    /// Replays queued outcomes and records every request it receives.
    /// Once the script runs out, the last outcome repeats.
    pub struct ScriptedProvider
    {   script: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>
      , last: Mutex<Option<Result<CompletionResponse, ProviderError>>>
      , pub requests: Mutex<Vec<CompletionRequest>>
    }

    impl ScriptedProvider
    {   pub fn new(
          script: Vec<Result<CompletionResponse, ProviderError>>
        ) -> Self
        {   ScriptedProvider
            {   script: Mutex::new(script.into())
              , last: Mutex::new(None)
              , requests: Mutex::new(vec![])
            }
        }

        pub fn text(text: &str) -> Result<CompletionResponse, ProviderError>
        {   Ok(CompletionResponse { choices: vec![Some(text.to_string())] })
        }

        pub fn calls(&self) -> usize
        {   self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider
    {   fn name(&self) -> &str
        {   "scripted"
        }

        async fn complete(&self, request: &CompletionRequest)
          -> Result<CompletionResponse, ProviderError>
        {   self.requests.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(outcome) = next
            {   *last = Some(outcome);
            }
            last.clone().unwrap_or_else(|| {
              Err(ProviderError::Api("empty script".to_string()))
            })
        }
    }
}
