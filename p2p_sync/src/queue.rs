use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

/// Why a `HandoffQueue` stopped handing out tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closed {
    /// The run finished normally.
    Shutdown,
    /// Some worker failed and the whole tree is being torn down.
    Aborted,
}

/// Failures of a `HandoffQueue` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffErr {
    /// `sender` pushed while its previous token was still pending.
    Duplicate(usize),
    Closed(Closed),
}

#[derive(Debug, Default)]
struct State {
    tokens: VecDeque<usize>,
    closed: Option<Closed>,
}

/// A blocking queue of "this peer is ready" signals.
///
/// Tokens identify the sender. Each sender may have at most one pending token, the step
/// barrier guarantees the consumer takes it before the sender pushes again.
#[derive(Debug, Default)]
pub struct HandoffQueue {
    state: Mutex<State>,
    available: Condvar,
}

impl HandoffQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals the owner of this queue that `sender` is ready.
    ///
    /// # Returns
    /// A `Duplicate` error if `sender` already has a pending token, or `Closed` if the
    /// queue was closed.
    pub fn push(&self, sender: usize) -> Result<(), HandoffErr> {
        let mut state = self.state.lock();

        if let Some(reason) = state.closed {
            return Err(HandoffErr::Closed(reason));
        }

        if state.tokens.contains(&sender) {
            return Err(HandoffErr::Duplicate(sender));
        }

        state.tokens.push_back(sender);
        self.available.notify_one();
        Ok(())
    }

    /// Blocks until a token is available and takes it.
    ///
    /// # Returns
    /// The oldest pending sender, or `Closed` once the queue is closed. Pending tokens are
    /// discarded by closing.
    pub fn pop(&self) -> Result<usize, HandoffErr> {
        let mut state = self.state.lock();

        loop {
            if let Some(reason) = state.closed {
                return Err(HandoffErr::Closed(reason));
            }

            if let Some(sender) = state.tokens.pop_front() {
                return Ok(sender);
            }

            self.available.wait(&mut state);
        }
    }

    /// Closes the queue and wakes every blocked consumer.
    ///
    /// An abort overrides a previous shutdown, never the other way around.
    pub fn close(&self, reason: Closed) {
        let mut state = self.state.lock();

        if state.closed.is_none() || reason == Closed::Aborted {
            state.closed = Some(reason);
        }

        self.available.notify_all();
    }

    /// Returns the amount of pending tokens.
    pub fn len(&self) -> usize {
        self.state.lock().tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
