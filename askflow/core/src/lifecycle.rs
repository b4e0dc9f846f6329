//! Turn Lifecycle
//!
//! Tracks the state of the most recent user turn and decides how keyboard and
//! button input is routed.
//!
//! ```text
//! Composing ──send──▶ Sent ──reply──▶ Resolved
//!                      │
//!                   cancel
//!                      ▼
//!                  Editable ──commit──▶ Resent ──reply──▶ Resolved
//!                      ▲                  │
//!                      └──────cancel──────┘
//! ```
//!
//! A plain send while a turn is editable abandons that edit.

use crate::presenter::TurnRef;

/// State of the most recent user turn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TurnState {
    /// Nothing sent yet, or the user is typing a fresh message
    #[default]
    Composing,
    /// Sent and awaiting a reply
    Sent {
        /// Bubble of the sent turn
        turn: TurnRef,
    },
    /// Cancelled; the bubble can be edited and resent
    Editable {
        /// Bubble being edited
        turn: TurnRef,
    },
    /// Edited text resent and awaiting a reply
    Resent {
        /// Bubble that was edited
        turn: TurnRef,
    },
    /// The reply (of any kind) arrived
    Resolved,
}

impl TurnState {
    /// Whether a reply is outstanding in this state
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::Sent { .. } | Self::Resent { .. })
    }
}

/// State machine over the most recent user turn
#[derive(Debug, Default)]
pub struct TurnLifecycle {
    state: TurnState,
}

impl TurnLifecycle {
    /// Create a lifecycle in `Composing`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The editable bubble, if an edit is pending
    #[must_use]
    pub fn editable_turn(&self) -> Option<TurnRef> {
        match self.state {
            TurnState::Editable { turn } => Some(turn),
            _ => None,
        }
    }

    /// A fresh turn was sent
    pub fn sent(&mut self, turn: TurnRef) {
        self.transition(TurnState::Sent { turn });
    }

    /// The outstanding turn was cancelled
    ///
    /// Returns the bubble that became editable, or `None` if nothing was
    /// awaiting a reply.
    pub fn cancelled(&mut self) -> Option<TurnRef> {
        match self.state {
            TurnState::Sent { turn } | TurnState::Resent { turn } => {
                self.transition(TurnState::Editable { turn });
                Some(turn)
            }
            _ => None,
        }
    }

    /// The pending edit was committed and resent
    ///
    /// Returns the edited bubble, or `None` if no edit was pending.
    pub fn resent(&mut self) -> Option<TurnRef> {
        let turn = self.editable_turn()?;
        self.transition(TurnState::Resent { turn });
        Some(turn)
    }

    /// Abandon a pending edit
    ///
    /// Returns the abandoned bubble, if any.
    pub fn discard_edit(&mut self) -> Option<TurnRef> {
        let turn = self.editable_turn()?;
        self.transition(TurnState::Composing);
        Some(turn)
    }

    /// The outstanding turn got its reply
    pub fn resolved(&mut self) {
        if self.state.is_awaiting() {
            self.transition(TurnState::Resolved);
        }
    }

    fn transition(&mut self, next: TurnState) {
        tracing::trace!(from = ?self.state, to = ?next, "Turn state change");
        self.state = next;
    }
}

/// The single send/stop action control
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionControl {
    /// Idle: activating sends the input
    Send,
    /// In flight: activating cancels
    Stop,
}

/// What an Enter keypress should do
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnterAction {
    /// A request is in flight; ignore the key
    Suppressed,
    /// Shift+Enter inserts a line break
    Newline,
    /// Commit the pending edit
    CommitEdit,
    /// Send the input as a new turn
    Submit,
}

/// Route an Enter keypress
#[must_use]
pub fn route_enter(shift: bool, in_edit_mode: bool, in_flight: bool) -> EnterAction {
    if shift {
        EnterAction::Newline
    } else if in_flight {
        EnterAction::Suppressed
    } else if in_edit_mode {
        EnterAction::CommitEdit
    } else {
        EnterAction::Submit
    }
}

/// The action control shown for the current request state
#[must_use]
pub fn action_control(in_flight: bool) -> ActionControl {
    if in_flight {
        ActionControl::Stop
    } else {
        ActionControl::Send
    }
}
