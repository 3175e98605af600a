//! Desktop back-ends: arboard for the clipboard, enigo for keystrokes

use arboard::Clipboard as Arboard;
use enigo::{Direction, Enigo, Key, Keyboard as _, Settings};
use tracing::debug;

use super::{Clipboard, ClipboardHandle, CollaboratorError, Keyboard, KeystrokeSink};
use crate::hotkey::Combination;

/// The system clipboard
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

struct OpenClipboard {
    inner: Arboard,
}

impl Clipboard for SystemClipboard {
    fn open(&self) -> Result<Box<dyn ClipboardHandle + '_>, CollaboratorError> {
        let inner = Arboard::new().map_err(|e| {
            CollaboratorError::Clipboard(format!("failed to open clipboard: {}", e))
        })?;
        debug!("clipboard opened");
        Ok(Box::new(OpenClipboard { inner }))
    }
}

impl ClipboardHandle for OpenClipboard {
    fn text(&mut self) -> Result<Option<String>, CollaboratorError> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(CollaboratorError::Clipboard(format!(
                "failed to read clipboard: {}",
                e
            ))),
        }
    }
}

impl Drop for OpenClipboard {
    fn drop(&mut self) {
        debug!("clipboard closed");
    }
}

/// Synthetic keyboard input through enigo
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemKeyboard;

struct EnigoSink {
    enigo: Enigo,
}

impl Keyboard for SystemKeyboard {
    fn session(&self) -> Result<Box<dyn KeystrokeSink + '_>, CollaboratorError> {
        let enigo = Enigo::new(&Settings::default()).map_err(|e| {
            CollaboratorError::Keyboard(format!("failed to initialize enigo: {}", e))
        })?;
        Ok(Box::new(EnigoSink { enigo }))
    }
}

impl KeystrokeSink for EnigoSink {
    fn emit(&mut self, ch: char) -> Result<(), CollaboratorError> {
        let mut buf = [0u8; 4];
        self.enigo
            .text(ch.encode_utf8(&mut buf))
            .map_err(|e| CollaboratorError::Keyboard(format!("failed to type {:?}: {}", ch, e)))
    }

    fn release(&mut self, combination: &str) -> Result<(), CollaboratorError> {
        let combination: Combination = combination
            .parse()
            .map_err(|e| CollaboratorError::Keyboard(format!("{}", e)))?;

        let mut keys = Vec::new();
        if let Some(key) = combination.key.as_deref() {
            let mut chars = key.chars();
            if let (Some(ch), None) = (chars.next(), chars.next()) {
                keys.push(Key::Unicode(ch));
            }
        }
        let modifiers = combination.modifiers;
        for (held, key) in [
            (modifiers.control, Key::Control),
            (modifiers.alt, Key::Alt),
            (modifiers.shift, Key::Shift),
            (modifiers.meta, Key::Meta),
        ] {
            if held {
                keys.push(key);
            }
        }

        for key in keys {
            self.enigo
                .key(key, Direction::Release)
                .map_err(|e| CollaboratorError::Keyboard(format!("failed to release key: {}", e)))?;
        }
        Ok(())
    }
}
