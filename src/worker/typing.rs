//! Cooperative clipboard typing
//!
//! Typing is split into one step per character. The cancellation token is
//! checked after each inter-character delay, right before the keystroke,
//! so a cancelled action emits nothing further.

use std::thread;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::platform::{Clipboard, CollaboratorError, Keyboard, KeystrokeSink};

/// Random pause before each keystroke, uniform in `[0, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeystrokeDelay {
    max: Duration,
}

impl KeystrokeDelay {
    pub fn new(max: Duration) -> Self {
        Self { max }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn sample(&self) -> Duration {
        if self.max.is_zero() {
            return Duration::ZERO;
        }
        rand::thread_rng().gen_range(Duration::ZERO..self.max)
    }
}

impl Default for KeystrokeDelay {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

/// How a typing action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingOutcome {
    /// The clipboard held no text
    Empty,
    /// Every character was typed
    Completed { typed: usize },
    /// Cancelled after `typed` characters
    Cancelled { typed: usize },
}

impl std::fmt::Display for TypingOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypingOutcome::Empty => write!(f, "clipboard empty"),
            TypingOutcome::Completed { typed } => write!(f, "completed ({} chars)", typed),
            TypingOutcome::Cancelled { typed } => write!(f, "cancelled ({} chars)", typed),
        }
    }
}

/// Type the clipboard text, one cancellable step per character
///
/// The clipboard is open only while its text is copied out; the handle is
/// dropped on every path, including errors. `release` is the hotkey that
/// triggered the action, released before typing starts.
pub fn type_clipboard(
    token: &CancellationToken,
    clipboard: &dyn Clipboard,
    keyboard: &dyn Keyboard,
    delay: KeystrokeDelay,
    release: Option<&str>,
) -> Result<TypingOutcome, CollaboratorError> {
    let text = {
        let mut handle = clipboard.open()?;
        handle.text()?
    };
    let text = match text {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(TypingOutcome::Empty),
    };

    let mut sink = keyboard.session()?;
    if let Some(combination) = release {
        if let Err(e) = sink.release(combination) {
            debug!(%combination, error = %e, "failed to release hotkey");
        }
    }

    type_text(token, sink.as_mut(), &text, delay)
}

/// Emit `text` character by character until done or cancelled
pub fn type_text(
    token: &CancellationToken,
    sink: &mut dyn KeystrokeSink,
    text: &str,
    delay: KeystrokeDelay,
) -> Result<TypingOutcome, CollaboratorError> {
    let mut typed = 0;
    for ch in text.chars() {
        thread::sleep(delay.sample());
        if token.is_cancelled() {
            return Ok(TypingOutcome::Cancelled { typed });
        }
        sink.emit(ch)?;
        typed += 1;
    }
    Ok(TypingOutcome::Completed { typed })
}
