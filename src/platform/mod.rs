//! Contracts for the desktop collaborators the worker drives
//!
//! The clipboard and keyboard are opened per typing action, on the action
//! thread, and closed when the returned handle is dropped. Back-ends for a
//! real desktop live in `desktop` (feature `desktop`).

#[cfg(feature = "desktop")]
mod desktop;
#[cfg(test)]
pub(crate) mod fake;

#[cfg(feature = "desktop")]
pub use desktop::{SystemClipboard, SystemKeyboard};

/// Failures reported by external collaborators
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("hotkey hook error: {0}")]
    Hotkey(String),

    #[error("hotkey is not registered")]
    NotRegistered,

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error("keyboard error: {0}")]
    Keyboard(String),

    #[error("ui error: {0}")]
    Ui(String),
}

/// Source of clipboard text
pub trait Clipboard: Send + Sync {
    /// Open the clipboard; it stays open until the handle is dropped
    fn open(&self) -> Result<Box<dyn ClipboardHandle + '_>, CollaboratorError>;
}

/// An open clipboard
pub trait ClipboardHandle {
    /// Current text contents, `None` when the clipboard holds no text
    fn text(&mut self) -> Result<Option<String>, CollaboratorError>;
}

/// Source of synthetic keystrokes
pub trait Keyboard: Send + Sync {
    /// Start a keystroke session for one typing action
    fn session(&self) -> Result<Box<dyn KeystrokeSink + '_>, CollaboratorError>;
}

/// Emits keystrokes into whatever application has focus
pub trait KeystrokeSink {
    /// Type a single character
    fn emit(&mut self, ch: char) -> Result<(), CollaboratorError>;

    /// Release every key of a hotkey combination still held by the user
    fn release(&mut self, _combination: &str) -> Result<(), CollaboratorError> {
        Ok(())
    }
}
