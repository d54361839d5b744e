//! In-memory conversation history owned by a single task
//!
//! Every read and write goes through one command loop, so appends to the
//! same conversation can never interleave.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use log::{debug, info};
use crate::error::StoreError;
use crate::providers::ChatMessage;

/// Conversation id used when the caller does not send one
pub const DEFAULT_CONVERSATION_ID: &str = "default";

/// Longest conversation id accepted from callers
pub const MAX_CONVERSATION_ID_CHARS: usize = 128;

/// Commands for the store task
enum StoreCommand
{   History
    {   id: String
      , reply: oneshot::Sender<Vec<ChatMessage>>
    }
  , Append
    {   id: String
      , messages: Vec<ChatMessage>
      , reply: oneshot::Sender<usize>
    }
  , Clear
    {   id: String
      , reply: oneshot::Sender<bool>
    }
  , Shutdown
    {   reply: oneshot::Sender<()>
    }
}

/// One stored conversation
struct Conversation
{   messages: Vec<ChatMessage>
  , /// Store clock value of the last read or write
    last_used: u64
}

/// State owned by the store task
struct StoreState
{   conversations: HashMap<String, Conversation>
  , limit: usize
  , max_conversations: usize
  , clock: u64
}

impl StoreState
{   fn new(limit: usize, max_conversations: usize) -> Self
    {   StoreState
        {   conversations: HashMap::new()
          , limit: limit.max(1)
          , max_conversations: max_conversations.max(1)
          , clock: 0
        }
    }

    fn tick(&mut self) -> u64
    {   self.clock += 1;
        self.clock
    }

    fn history(&mut self, id: &str) -> Vec<ChatMessage>
    {   let now = self.tick();
        match self.conversations.get_mut(id)
        {   Some(conversation) => {
              conversation.last_used = now;
              conversation.messages.clone()
            }
          , None => vec![]
        }
    }

    /// Append and keep only the newest `limit` messages. A new id beyond
    /// `max_conversations` evicts the least recently used conversation.
    fn append(&mut self, id: String, messages: Vec<ChatMessage>) -> usize
    {   let now = self.tick();
        if !self.conversations.contains_key(&id)
          && self.conversations.len() >= self.max_conversations
        {   self.evict_least_recent();
        }

        let conversation = self.conversations
          .entry(id)
          .or_insert_with(|| Conversation
          {   messages: vec![]
            , last_used: now
          });
        conversation.last_used = now;
        conversation.messages.extend(messages);
        if conversation.messages.len() > self.limit
        {   let excess = conversation.messages.len() - self.limit;
            conversation.messages.drain(..excess);
        }
        conversation.messages.len()
    }

    fn evict_least_recent(&mut self)
    {   let oldest = self.conversations
          .iter()
          .min_by_key(|(_, c)| c.last_used)
          .map(|(id, _)| id.clone());
        if let Some(id) = oldest
        {   debug!("Evicting conversation {}", id);
            self.conversations.remove(&id);
        }
    }

    fn clear(&mut self, id: &str) -> bool
    {   self.conversations.remove(id).is_some()
    }
}

/// Handle to the store task. Cheap to clone.
#[derive(Clone)]
pub struct ConversationStore
{   tx: mpsc::UnboundedSender<StoreCommand>
}

impl ConversationStore
{   /// Spawn the store task. Must be called inside a tokio runtime.
    ///
    /// `limit` caps messages per conversation, `max_conversations` caps
    /// how many conversations are kept at once.
    pub fn spawn(limit: usize, max_conversations: usize) -> Self
    {   debug!(
          "Spawning conversation store (limit {}, max {} conversations)",
          limit, max_conversations
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let state = StoreState::new(limit, max_conversations);
        tokio::spawn(run_store_loop(rx, state));
        ConversationStore { tx }
    }

    pub async fn history(&self, id: &str)
      -> Result<Vec<ChatMessage>, StoreError>
    {   self.request(|reply| StoreCommand::History
        {   id: id.to_string()
          , reply
        }).await
    }

    /// Returns the stored length after trimming.
    pub async fn append(&self, id: &str, messages: Vec<ChatMessage>)
      -> Result<usize, StoreError>
    {   self.request(|reply| StoreCommand::Append
        {   id: id.to_string()
          , messages
          , reply
        }).await
    }

    /// Returns whether anything was stored under `id`.
    pub async fn clear(&self, id: &str) -> Result<bool, StoreError>
    {   self.request(|reply| StoreCommand::Clear
        {   id: id.to_string()
          , reply
        }).await
    }

    /// Stop the task; later calls fail with `Disconnected`.
    pub async fn shutdown(&self) -> Result<(), StoreError>
    {   self.request(|reply| StoreCommand::Shutdown { reply }).await
    }

    async fn request<T>(
      &self
    , build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand
    ) -> Result<T, StoreError>
    {   let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
          .send(build(reply_tx))
          .map_err(|_| StoreError::Disconnected)?;
        reply_rx.await.map_err(|_| StoreError::Disconnected)
    }
}

/// Main store event loop
async fn run_store_loop(
  mut rx: mpsc::UnboundedReceiver<StoreCommand>
, mut state: StoreState
)
{   debug!("Starting conversation store loop");

    while let Some(cmd) = rx.recv().await
    {   match cmd
        {   StoreCommand::History { id, reply } => {
              let _ = reply.send(state.history(&id));
            }
          , StoreCommand::Append { id, messages, reply } => {
              debug!("Appending {} message(s) to {}", messages.len(), id);
              let _ = reply.send(state.append(id, messages));
            }
          , StoreCommand::Clear { id, reply } => {
              debug!("Clearing conversation {}", id);
              let _ = reply.send(state.clear(&id));
            }
          , StoreCommand::Shutdown { reply } => {
              info!("Conversation store shutting down");
              let _ = reply.send(());
              break;
            }
        }
    }
    debug!("Conversation store loop exited");
}
