// Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use nouvo_gateway::providers::{CompletionRequest, CompletionResponse};
use nouvo_gateway::{
    build_app, AppState, ChatProvider, CompletionGateway, CompletionSettings,
    ConversationStore, ProviderError, RetryPolicy,
};
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = "You are Nouvo's assistant.";

// ===== Fake provider =====

/// Replays scripted outcomes in order; the last one repeats.
pub struct FakeProvider
{   script: Mutex<VecDeque<Result<CompletionResponse, ProviderError>>>
  , last: Mutex<Option<Result<CompletionResponse, ProviderError>>>
  , requests: Mutex<Vec<CompletionRequest>>
}

impl FakeProvider
{   pub fn new(
      script: Vec<Result<CompletionResponse, ProviderError>>
    ) -> Arc<Self>
    {   Arc::new(FakeProvider
        {   script: Mutex::new(script.into())
          , last: Mutex::new(None)
          , requests: Mutex::new(vec![])
        })
    }

    pub fn replying(text: &str) -> Arc<Self>
    {   Self::new(vec![text_reply(text)])
    }

    pub fn failing(err: ProviderError) -> Arc<Self>
    {   Self::new(vec![Err(err)])
    }

    pub fn calls(&self) -> usize
    {   self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest>
    {   self.requests.lock().unwrap().clone()
    }
}

pub fn text_reply(text: &str) -> Result<CompletionResponse, ProviderError>
{   Ok(CompletionResponse { choices: vec![Some(text.to_string())] })
}

#[async_trait]
impl ChatProvider for FakeProvider
{   fn name(&self) -> &str
    {   "fake"
    }

    async fn complete(&self, request: &CompletionRequest)
      -> Result<CompletionResponse, ProviderError>
    {   self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next
        {   *last = Some(outcome);
        }
        last.clone()
          .unwrap_or_else(|| Err(ProviderError::Api("no script".into())))
    }
}

// ===== App under test =====

pub struct TestApp
{   pub router: Router
  , pub store: ConversationStore
}

pub fn settings() -> CompletionSettings
{   CompletionSettings
    {   model: "gpt-4".to_string()
      , system_prompt: SYSTEM_PROMPT.to_string()
      , temperature: 0.7
      , max_tokens: 500
    }
}

/// Router over `provider` with 3 attempts and no delay between them.
pub fn test_app(provider: Arc<FakeProvider>, expose_details: bool) -> TestApp
{   let gateway = CompletionGateway::new(
      provider
    , settings()
    , RetryPolicy::new(3, Duration::ZERO)
    );
    let store = ConversationStore::spawn(20, 100);
    let state = Arc::new(AppState::new(gateway, store.clone(), expose_details));
    TestApp
    {   router: build_app(state, vec!["https://nouvo.dev".to_string()])
      , store
    }
}

// ===== Mock OpenAI server =====

/// Canned answer for one call to the mock server
#[derive(Clone)]
pub struct MockReply
{   pub status: StatusCode
  , pub body: Value
}

impl MockReply
{   pub fn ok(content: &str) -> Self
    {   MockReply
        {   status: StatusCode::OK
          , body: serde_json::json!({
              "id": "chatcmpl-test",
              "object": "chat.completion",
              "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
              }]
            })
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self
    {   MockReply
        {   status
          , body: serde_json::json!({
              "error": {"message": message, "type": "test_error"}
            })
        }
    }
}

#[derive(Clone, Default)]
struct MockState
{   replies: Arc<Mutex<VecDeque<MockReply>>>
  , received: Arc<Mutex<Vec<(Option<String>, Value)>>>
}

/// OpenAI-compatible server on an ephemeral port
pub struct MockOpenAi
{   pub base_url: String
  , state: MockState
  , shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>
}

impl MockOpenAi
{   pub async fn start(replies: Vec<MockReply>) -> Self
    {   let state = MockState::default();
        *state.replies.lock().unwrap() = replies.into();

        let app = Router::new()
          .route("/v1/chat/completions", post(chat_completions))
          .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
          .await
          .unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
          let server = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
              let _ = shutdown_rx.await;
            });
          if let Err(e) = server.await
          {   eprintln!("Mock server error: {}", e);
          }
        });

        MockOpenAi
        {   base_url: format!("http://{}/v1", addr)
          , state
          , shutdown_tx: Some(shutdown_tx)
        }
    }

    /// Authorization header and JSON body of each call, in order
    pub fn received(&self) -> Vec<(Option<String>, Value)>
    {   self.state.received.lock().unwrap().clone()
    }
}

impl Drop for MockOpenAi
{   fn drop(&mut self)
    {   if let Some(tx) = self.shutdown_tx.take()
        {   let _ = tx.send(());
        }
    }
}

async fn chat_completions(
  State(state): State<MockState>
, headers: axum::http::HeaderMap
, Json(body): Json<Value>
) -> Response
{   let auth = headers
      .get(axum::http::header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string);
    state.received.lock().unwrap().push((auth, body));

    let reply = state.replies.lock().unwrap().pop_front()
      .unwrap_or_else(|| MockReply::error(
        StatusCode::INTERNAL_SERVER_ERROR, "script exhausted"
      ));
    (reply.status, Json(reply.body)).into_response()
}
