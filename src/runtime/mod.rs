//! Message-driven runtime instances with cooperative cancellation
//!
//! A runtime instance is an OS thread that repeatedly:
//! - reads one message from its input queue (never blocking)
//! - cancels its current action on `INTERRUPT`
//! - on `EXIT`, cancels every registered peer, then itself
//! - otherwise dispatches to the handler registered for the message kind
//! - runs its per-iteration tick callback
//!
//! Instances are configured, not subclassed: see [`RuntimeBuilder`].

mod action;
mod instance;
mod registry;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

pub use action::ActionSlot;
pub use instance::{Context, Runtime, RuntimeBuilder, RuntimeHandle};
pub use registry::{Peer, Registry};

use crate::broker::MessageKind;
use crate::platform::CollaboratorError;

/// Top-level state of a runtime instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Processing messages
    Running,
    /// Cancelled, draining its action and running exit callbacks
    ShuttingDown,
    /// Run loop has returned
    Terminated,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeState::Running => write!(f, "Running"),
            RuntimeState::ShuttingDown => write!(f, "ShuttingDown"),
            RuntimeState::Terminated => write!(f, "Terminated"),
        }
    }
}

/// Shared, lock-free view of a runtime instance's [`RuntimeState`]
#[derive(Debug, Clone)]
pub struct Lifecycle(Arc<AtomicU8>);

impl Lifecycle {
    const RUNNING: u8 = 0;
    const SHUTTING_DOWN: u8 = 1;
    const TERMINATED: u8 = 2;

    pub fn new() -> Self {
        Self(Arc::new(AtomicU8::new(Self::RUNNING)))
    }

    pub fn state(&self) -> RuntimeState {
        match self.0.load(Ordering::SeqCst) {
            Self::RUNNING => RuntimeState::Running,
            Self::SHUTTING_DOWN => RuntimeState::ShuttingDown,
            _ => RuntimeState::Terminated,
        }
    }

    /// Move from `Running` to `ShuttingDown`; no effect in later states
    pub fn begin_shutdown(&self) {
        let _ = self.0.compare_exchange(
            Self::RUNNING,
            Self::SHUTTING_DOWN,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn terminate(&self) {
        self.0.store(Self::TERMINATED, Ordering::SeqCst);
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Failures of a message handler or lifecycle callback
///
/// These are logged by the run loop and never stop it.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("invalid {kind} message: missing {field}")]
    InvalidMessage {
        kind: MessageKind,
        field: &'static str,
    },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), RuntimeState::Running);

        lifecycle.begin_shutdown();
        assert_eq!(lifecycle.state(), RuntimeState::ShuttingDown);

        lifecycle.terminate();
        assert_eq!(lifecycle.state(), RuntimeState::Terminated);

        // Never goes back
        lifecycle.begin_shutdown();
        assert_eq!(lifecycle.state(), RuntimeState::Terminated);
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::InvalidMessage {
            kind: MessageKind::SetHotkey,
            field: "action",
        };
        assert_eq!(err.to_string(), "invalid SET_HOTKEY message: missing action");

        let err: HandlerError = CollaboratorError::NotRegistered.into();
        assert_eq!(err.to_string(), "hotkey is not registered");
    }
}
