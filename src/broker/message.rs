//! Message vocabulary exchanged between runtime instances
//!
//! Every message carries a kind, free text and a payload whose shape
//! depends on the kind (an Action for rebind requests, an Action plus
//! hotkey for rebind confirmations).

use serde::Deserialize;

/// Logical actions that can be bound to a hotkey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Type the clipboard contents
    Write,
    /// Stop the typing action in progress
    Interrupt,
}

impl Action {
    /// All actions, in display order
    pub const ALL: [Action; 2] = [Action::Write, Action::Interrupt];
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Write => write!(f, "write"),
            Action::Interrupt => write!(f, "interrupt"),
        }
    }
}

/// Kind of a message, used to dispatch to handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Sentinel for an empty queue, never enqueued
    QueueEmpty,
    /// Informational text
    Info,
    /// Cancel the current action, keep the loop alive
    Interrupt,
    /// Broadcast cancellation to peers and terminate
    Exit,
    /// Request to rebind the hotkey of an action
    SetHotkey,
    /// A rebind completed
    HotkeySet,
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::QueueEmpty => write!(f, "QUEUE_EMPTY"),
            MessageKind::Info => write!(f, "INFO"),
            MessageKind::Interrupt => write!(f, "INTERRUPT"),
            MessageKind::Exit => write!(f, "EXIT"),
            MessageKind::SetHotkey => write!(f, "SET_HOTKEY"),
            MessageKind::HotkeySet => write!(f, "HOTKEY_SET"),
        }
    }
}

/// Kind-specific message data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    Empty,
    /// The action a request refers to
    Action(Action),
    /// An action together with its new hotkey
    Binding { action: Action, hotkey: String },
}

/// A message travelling through the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub text: String,
    pub payload: Payload,
}

impl Message {
    /// Create a message of the given kind with no text and no payload
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            text: String::new(),
            payload: Payload::Empty,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Info).with_text(text)
    }

    pub fn interrupt() -> Self {
        Self::new(MessageKind::Interrupt)
    }

    pub fn exit() -> Self {
        Self::new(MessageKind::Exit)
    }

    /// Request a rebind of `action`
    pub fn set_hotkey(action: Action) -> Self {
        Self::new(MessageKind::SetHotkey).with_payload(Payload::Action(action))
    }

    /// Report that `action` is now bound to `hotkey`
    pub fn hotkey_set(action: Action, hotkey: impl Into<String>) -> Self {
        Self::new(MessageKind::HotkeySet).with_payload(Payload::Binding {
            action,
            hotkey: hotkey.into(),
        })
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// The action carried by the payload, if any
    pub fn action(&self) -> Option<Action> {
        match &self.payload {
            Payload::Empty => None,
            Payload::Action(action) => Some(*action),
            Payload::Binding { action, .. } => Some(*action),
        }
    }

    /// The hotkey carried by the payload, if any
    pub fn hotkey(&self) -> Option<&str> {
        match &self.payload {
            Payload::Binding { hotkey, .. } => Some(hotkey),
            _ => None,
        }
    }
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        match &self.payload {
            Payload::Empty => {}
            Payload::Action(action) => write!(f, " action={}", action)?,
            Payload::Binding { action, hotkey } => {
                write!(f, " action={} hotkey={}", action, hotkey)?
            }
        }
        if !self.text.is_empty() {
            write!(f, " \"{}\"", self.text)?;
        }
        Ok(())
    }
}
