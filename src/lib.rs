//! Website-suggestion gateway.
//!
//! Accepts a visitor's description of the site they want, checks it,
//! forwards it to a chat-completion provider behind a fixed persona
//! prompt, and relays the answer:
//!
//! ```text
//! POST /generate -> validator -> gateway (retry) -> provider -> JSON
//! ```
//!
//! A conversational `/chat` route shares the same gateway and keeps
//! per-conversation history in a single-owner in-memory store.

pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod providers;
pub mod request;
pub mod retry;
pub mod server;
pub mod validator;

pub use config::Config;
pub use conversation::ConversationStore;
pub use error::{
    ConfigError, GatewayError, ProviderError, ServerError, StoreError,
    ValidationError,
};
pub use gateway::{CompletionGateway, CompletionSettings};
pub use providers::{ChatMessage, ChatProvider, OpenAiClient, Role};
pub use retry::RetryPolicy;
pub use server::{build_app, startup, AppState};
pub use validator::InputValidator;
