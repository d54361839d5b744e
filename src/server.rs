//! HTTP surface: routes, error envelope, CORS, startup

use std::sync::Arc;
use std::time::Duration;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, trace, warn};
use serde_json::Value;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use crate::config::Config;
use crate::conversation::{
    ConversationStore, DEFAULT_CONVERSATION_ID, MAX_CONVERSATION_ID_CHARS,
};
use crate::error::{
    GatewayError, ProviderError, ServerError, StoreError, ValidationError,
};
use crate::gateway::{CompletionGateway, CompletionSettings};
use crate::providers::{ChatMessage, OpenAiClient};
use crate::request::{
    ChatResponse, ErrorBody, HealthResponse, HistoryResponse,
    MessageResponse, SuggestionResponse,
};
use crate::retry::RetryPolicy;
use crate::validator::{optional_text, InputValidator};

pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Shared, read-only request context
pub struct AppState
{   pub gateway: CompletionGateway
  , pub store: ConversationStore
  , /// Include internal error text in `details`
    pub expose_error_details: bool
}

impl AppState
{   pub fn new(
      gateway: CompletionGateway
    , store: ConversationStore
    , expose_error_details: bool
    ) -> Self
    {   AppState
        {   gateway
          , store
          , expose_error_details
        }
    }

    /// Turn any failure into the response the caller sees.
    pub fn reject(&self, err: impl Into<ApiError>) -> ErrorResponse
    {   err.into().into_response_with(self.expose_error_details)
    }
}

// ===== Error mapping =====

/// Every failure a route can end with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError
{   Validation(ValidationError)
  , /// Body larger than `MAX_BODY_BYTES`
    PayloadTooLarge
  , Gateway(GatewayError)
  , Unclassified(String)
}

impl From<ValidationError> for ApiError
{   fn from(e: ValidationError) -> Self
    {   ApiError::Validation(e)
    }
}

impl From<GatewayError> for ApiError
{   fn from(e: GatewayError) -> Self
    {   ApiError::Gateway(e)
    }
}

impl From<BytesRejection> for ApiError
{   fn from(e: BytesRejection) -> Self
    {   if e.status() == StatusCode::PAYLOAD_TOO_LARGE
        {   ApiError::PayloadTooLarge
        } else
        {   debug!("Unreadable request body: {}", e.body_text());
            ApiError::Validation(ValidationError::MalformedBody)
        }
    }
}

impl From<StoreError> for ApiError
{   fn from(e: StoreError) -> Self
    {   ApiError::Unclassified(e.to_string())
    }
}

const MSG_MISCONFIGURED: &str
  = "The AI service is misconfigured. Please try again later.";
const MSG_BUSY: &str
  = "The AI service is busy. Please try again in a moment.";
const MSG_UNAVAILABLE: &str
  = "The AI service is temporarily unavailable. Please try again later.";
const MSG_EMPTY: &str = "Invalid response from AI service";
const DETAIL_EMPTY: &str = "The AI service returned no content";
const MSG_UNEXPECTED: &str = "An unexpected error occurred";

impl ApiError
{   pub fn status(&self) -> StatusCode
    {   match self
        {   ApiError::Validation(_) => StatusCode::BAD_REQUEST
          , ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE
          , ApiError::Gateway(GatewayError::Exhausted { .. }) => {
              StatusCode::SERVICE_UNAVAILABLE
            }
          , ApiError::Gateway(GatewayError::EmptyCompletion)
          | ApiError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Stable, caller-safe message
    pub fn message(&self) -> String
    {   match self
        {   ApiError::Validation(e) => e.to_string()
          , ApiError::PayloadTooLarge => format!(
              "Request body must not exceed {} bytes", MAX_BODY_BYTES
            )
          , ApiError::Gateway(GatewayError::Exhausted { last, .. }) => {
              let message = match last
              {   ProviderError::Auth(_) => MSG_MISCONFIGURED
                , ProviderError::RateLimit(_) => MSG_BUSY
                , ProviderError::Api(_)
                | ProviderError::Transport(_) => MSG_UNAVAILABLE
              };
              message.to_string()
            }
          , ApiError::Gateway(GatewayError::EmptyCompletion) => {
              MSG_EMPTY.to_string()
            }
          , ApiError::Unclassified(_) => MSG_UNEXPECTED.to_string()
        }
    }

    fn details(&self, expose: bool) -> Option<Option<String>>
    {   match self
        {   ApiError::Validation(_) | ApiError::PayloadTooLarge => None
          , ApiError::Gateway(GatewayError::EmptyCompletion) => {
              Some(Some(DETAIL_EMPTY.to_string()))
            }
          , ApiError::Gateway(e) => Some(expose.then(|| e.to_string()))
          , ApiError::Unclassified(detail) => {
              Some(expose.then(|| detail.clone()))
            }
        }
    }

    pub fn into_response_with(self, expose_details: bool) -> ErrorResponse
    {   match &self
        {   ApiError::Validation(e) => debug!("Rejected request: {}", e)
          , ApiError::PayloadTooLarge => debug!("Rejected oversized body")
          , ApiError::Gateway(e) => warn!("Completion failed: {}", e)
          , ApiError::Unclassified(detail) => {
              error!("Unclassified failure: {}", detail)
            }
        }
        ErrorResponse
        {   status: self.status()
          , body: ErrorBody
            {   error: self.message()
              , details: self.details(expose_details)
            }
        }
    }
}

/// A rendered error envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse
{   pub status: StatusCode
  , pub body: ErrorBody
}

impl IntoResponse for ErrorResponse
{   fn into_response(self) -> Response
    {   (self.status, Json(self.body)).into_response()
    }
}

// ===== Handlers =====

pub async fn health() -> Json<HealthResponse>
{   Json(HealthResponse { status: "healthy".to_string() })
}

pub async fn generate(
  State(state): State<Arc<AppState>>
, body: Result<Bytes, BytesRejection>
) -> Result<Json<SuggestionResponse>, ErrorResponse>
{   let body = body.map_err(|e| state.reject(e))?;
    trace!("POST /generate body: {:?}", body);
    let text = InputValidator::USER_INPUT
      .validate_bytes(&body)
      .map_err(|e| state.reject(e))?;

    let suggestion = state.gateway
      .generate(&text)
      .await
      .map_err(|e| state.reject(e))?;

    info!("POST /generate -> 200");
    Ok(Json(SuggestionResponse { suggestion }))
}

pub async fn chat(
  State(state): State<Arc<AppState>>
, body: Result<Bytes, BytesRejection>
) -> Result<Json<ChatResponse>, ErrorResponse>
{   let body = body.map_err(|e| state.reject(e))?;
    trace!("POST /chat body: {:?}", body);
    let body: Value = serde_json::from_slice(&body)
      .map_err(|_| state.reject(ValidationError::MalformedBody))?;
    let message = InputValidator::CHAT_MESSAGE
      .validate(&body)
      .map_err(|e| state.reject(e))?;
    let conversation_id
      = optional_text(
          &body
        , "conversation_id"
        , "Conversation id"
        , MAX_CONVERSATION_ID_CHARS
        )
        .map_err(|e| state.reject(e))?
        .unwrap_or_else(|| DEFAULT_CONVERSATION_ID.to_string());

    let mut conversation = state.store
      .history(&conversation_id)
      .await
      .map_err(|e| state.reject(e))?;
    conversation.push(ChatMessage::user(message.clone()));

    let reply = state.gateway
      .complete(conversation)
      .await
      .map_err(|e| state.reject(e))?;

    state.store
      .append(&conversation_id, vec![
        ChatMessage::user(message)
      , ChatMessage::assistant(reply.clone())
      ])
      .await
      .map_err(|e| state.reject(e))?;

    info!("POST /chat ({}) -> 200", conversation_id);
    Ok(Json(ChatResponse
    {   response: reply
      , conversation_id
    }))
}

pub async fn chat_history(
  State(state): State<Arc<AppState>>
, Path(conversation_id): Path<String>
) -> Result<Json<HistoryResponse>, ErrorResponse>
{   let history = state.store
      .history(&conversation_id)
      .await
      .map_err(|e| state.reject(e))?;
    Ok(Json(HistoryResponse { history }))
}

pub async fn clear_chat_history(
  State(state): State<Arc<AppState>>
, Path(conversation_id): Path<String>
) -> Result<Json<MessageResponse>, ErrorResponse>
{   let existed = state.store
      .clear(&conversation_id)
      .await
      .map_err(|e| state.reject(e))?;
    debug!("Cleared {} (existed: {})", conversation_id, existed);
    Ok(Json(MessageResponse
    {   message: "Conversation history cleared".to_string()
    }))
}

// ===== Router =====

pub fn build_app(
  state: Arc<AppState>
, allowed_origins: Vec<String>
) -> Router
{   Router::new()
      .route("/", get(health))
      .route("/health", get(health))
      .route("/generate", post(generate))
      .route("/api/generate", post(generate))
      .route("/chat", post(chat))
      .route(
        "/chat/history/:conversation_id",
        get(chat_history).delete(clear_chat_history),
      )
      .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
      .layer(create_cors_layer(allowed_origins))
      .with_state(state)
}

/// Empty list allows any origin.
fn create_cors_layer(allowed_origins: Vec<String>) -> CorsLayer
{   let cors = if allowed_origins.is_empty()
    {   CorsLayer::new().allow_origin(Any)
    } else
    {   let origins: Vec<HeaderValue> = allowed_origins
          .into_iter()
          .filter_map(|origin| match origin.parse()
          {   Ok(value) => Some(value)
            , Err(_) => {
                warn!("Ignoring unparseable CORS origin {:?}", origin);
                None
              }
          })
          .collect();
        CorsLayer::new().allow_origin(origins)
    };

    cors
      .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
      .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
      .max_age(Duration::from_secs(3600))
}

// ===== Startup =====

/// Wire everything from `config` and serve until a shutdown signal.
pub async fn startup(config: Config) -> Result<(), ServerError>
{   let provider = Arc::new(OpenAiClient::new(&config.provider)?);
    let gateway = CompletionGateway::new(
      provider
    , CompletionSettings::from(&config.provider)
    , RetryPolicy::from_config(&config.retry)
    );
    let store = ConversationStore::spawn(
      config.server.chat_history_limit
    , config.server.chat_max_conversations
    );
    let state = Arc::new(AppState::new(
      gateway
    , store.clone()
    , config.server.expose_error_details
    ));

    if config.server.expose_error_details
    {   warn!("Error details are exposed to callers; do not run this in production");
    }

    let app = build_app(state, config.server.allowed_origins.clone());

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(
      "Listening on {} (model {}, {} attempt(s))",
      bind_addr, config.provider.model, config.retry.attempts
    );

    axum::serve(listener, app)
      .with_graceful_shutdown(shutdown_signal())
      .await?;

    if store.shutdown().await.is_err()
    {   debug!("Conversation store already stopped");
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal()
{   let ctrl_c = async {
      if let Err(e) = signal::ctrl_c().await
      {   error!("Failed to listen for Ctrl+C: {}", e);
          std::future::pending::<()>().await;
      }
    };

    #[cfg(unix)]
    let terminate = async {
      match signal::unix::signal(signal::unix::SignalKind::terminate())
      {   Ok(mut sig) => {
            sig.recv().await;
          }
        , Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
          }
      }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select!
    { _ = ctrl_c => {
        info!("Received Ctrl+C, starting graceful shutdown");
      }
    , _ = terminate => {
        info!("Received terminate signal, starting graceful shutdown");
      }
    }
}
