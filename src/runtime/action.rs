//! Ephemeral, cooperatively cancellable action threads
//!
//! A runtime instance owns one [`ActionSlot`]. At most one action thread
//! lives in the slot at a time. Each action gets a child of the runtime's
//! cancellation token, so cancelling the runtime also cancels its action.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct ActionThread {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ActionThread {
    /// Still running and not asked to stop
    fn is_live(&self) -> bool {
        !self.handle.is_finished() && !self.token.is_cancelled()
    }

    fn cancel_and_join(self) {
        self.token.cancel();
        if self.handle.join().is_err() {
            warn!("action thread panicked");
        }
    }
}

/// Holder of a runtime instance's current action thread
///
/// Cloning yields another handle to the same slot, so hotkey callbacks
/// running on foreign threads can start and interrupt actions.
#[derive(Clone)]
pub struct ActionSlot {
    name: Arc<str>,
    parent: CancellationToken,
    current: Arc<Mutex<Option<ActionThread>>>,
}

impl ActionSlot {
    pub fn new(name: &str, parent: CancellationToken) -> Self {
        Self {
            name: Arc::from(name),
            parent,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Start `action` unless another action is still live
    ///
    /// Returns `Ok(false)` when an action is already running or the owning
    /// runtime is shutting down. A previous action that was cancelled but
    /// has not yet finished its current step is joined first.
    pub fn spawn_if_idle<F>(&self, action: F) -> io::Result<bool>
    where
        F: FnOnce(CancellationToken) + Send + 'static,
    {
        let mut current = self.lock();
        if self.parent.is_cancelled() {
            return Ok(false);
        }
        if current.as_ref().is_some_and(ActionThread::is_live) {
            return Ok(false);
        }
        if let Some(previous) = current.take() {
            previous.cancel_and_join();
        }

        let token = self.parent.child_token();
        let action_token = token.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-action", self.name))
            .spawn(move || action(action_token))?;

        debug!(runtime = %self.name, "action started");
        *current = Some(ActionThread { token, handle });
        Ok(true)
    }

    /// Ask the live action to stop at its next step; returns false if none
    pub fn interrupt(&self) -> bool {
        let current = self.lock();
        match current.as_ref() {
            Some(action) if action.is_live() => {
                action.token.cancel();
                debug!(runtime = %self.name, "action cancelled");
                true
            }
            _ => false,
        }
    }

    /// Whether an action thread is still executing
    pub fn is_active(&self) -> bool {
        self.lock()
            .as_ref()
            .is_some_and(|action| !action.handle.is_finished())
    }

    /// Cancel the current action and wait for it to finish
    pub fn shutdown(&self) {
        let previous = self.lock().take();
        if let Some(action) = previous {
            action.cancel_and_join();
            debug!(runtime = %self.name, "action drained");
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActionThread>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
