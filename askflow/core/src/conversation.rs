//! Conversation History
//!
//! The ordered sequence of turns exchanged with the query backend.
//!
//! # Design Philosophy
//!
//! History is append-only apart from two sanctioned mutations: dropping a
//! cancelled user turn, and adopting the backend's authoritative copy once a
//! turn completes. The store never touches presentation and never
//! deduplicates on its own; callers append exactly once per logical send.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};

/// Who sent a turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User input
    User,
    /// Backend reply
    Assistant,
    /// System note returned by the backend
    System,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in the conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who sent this turn
    pub role: Role,
    /// Message content
    pub content: String,
}

impl Turn {
    /// Create a user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Whether this is a user turn
    #[must_use]
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Ordered conversation history
#[derive(Clone, Debug, Default)]
pub struct ConversationStore {
    turns: Vec<Turn>,
}

impl ConversationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to the end of the history
    ///
    /// User turns with empty or whitespace-only content are rejected.
    pub fn append(&mut self, turn: Turn) -> ChatResult<()> {
        if turn.is_user() && turn.content.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Remove the final entry if it is a user turn
    ///
    /// Returns the removed turn, or `None` when the history is empty or ends
    /// with a non-user turn.
    pub fn pop_last_if_user(&mut self) -> Option<Turn> {
        if self.turns.last().is_some_and(Turn::is_user) {
            let turn = self.turns.pop();
            tracing::debug!(remaining = self.turns.len(), "Dropped cancelled user turn");
            turn
        } else {
            None
        }
    }

    /// Swap in the backend's authoritative history
    pub fn replace_all(&mut self, history: Vec<Turn>) {
        tracing::debug!(
            previous = self.turns.len(),
            adopted = history.len(),
            "Adopted server history"
        );
        self.turns = history;
    }

    /// All turns in order
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Owned copy of the history for a request payload
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Last turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the history is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of user turns
    #[must_use]
    pub fn user_turn_count(&self) -> usize {
        self.turns.iter().filter(|t| t.is_user()).count()
    }
}
