//! Ordered transcript with per-turn optimistic state
//!
//! A user message is added as *pending* when submitted, then either
//! *committed* once the agent replies or *rolled back* (removed) when the
//! round trip fails.

use super::Message;

/// Identifies one user submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(usize);

/// Lifecycle of a user submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Shown optimistically, awaiting the agent
    Pending,
    /// Confirmed by a reply
    Committed,
    /// Removed after a failed round trip
    RolledBack,
}

/// Ordered sequence of messages
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Pending turns and the index of their user message
    pending: Vec<(TurnId, usize)>,
    next_turn: usize,
}

impl Transcript {
    /// Create a transcript seeded with committed history
    #[must_use]
    pub fn with_history(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// All messages, pending ones included, in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages excluding pending submissions
    #[must_use]
    pub fn committed(&self) -> Vec<Message> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.pending.iter().any(|(_, p)| p == i))
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Number of messages, pending ones included
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript holds no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Append `message` optimistically and open a turn for it
    pub fn begin_turn(&mut self, message: Message) -> TurnId {
        let id = TurnId(self.next_turn);
        self.next_turn += 1;
        self.pending.push((id, self.messages.len()));
        self.messages.push(message);
        id
    }

    /// Confirm a pending turn
    ///
    /// Returns the state the turn settled into, or `None` if it was not
    /// pending. Only pending turns are tracked, so a settled turn is
    /// forgotten here.
    pub fn commit(&mut self, turn: TurnId) -> Option<TurnState> {
        self.take_pending(turn)?;
        Some(TurnState::Committed)
    }

    /// Remove a pending turn's message
    ///
    /// Returns `None` and leaves the transcript untouched if the turn was not
    /// pending.
    pub fn rollback(&mut self, turn: TurnId) -> Option<TurnState> {
        let index = self.take_pending(turn)?;

        self.messages.remove(index);
        for (_, other) in &mut self.pending {
            if *other > index {
                *other -= 1;
            }
        }
        Some(TurnState::RolledBack)
    }

    /// `Pending` while `turn` awaits the agent, `None` once settled
    #[must_use]
    pub fn turn_state(&self, turn: TurnId) -> Option<TurnState> {
        self.pending
            .iter()
            .any(|(id, _)| *id == turn)
            .then_some(TurnState::Pending)
    }

    /// Number of turns still awaiting the agent
    #[must_use]
    pub fn pending_turns(&self) -> usize {
        self.pending.len()
    }

    /// Append a committed message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Remove every message; pending turns are dropped as rolled back
    pub fn clear(&mut self) {
        self.pending.clear();
        self.messages.clear();
    }

    fn take_pending(&mut self, turn: TurnId) -> Option<usize> {
        let pos = self.pending.iter().position(|(id, _)| *id == turn)?;
        Some(self.pending.remove(pos).1)
    }
}
