//! Global hotkey listener using rdev
//!
//! Watches system-wide key presses on a dedicated thread, fires the
//! callbacks of matching registrations and records combinations for
//! rebinding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;

use rdev::{listen, Event, EventType, Key};
use tracing::{debug, error, info};

use super::keys::Combination;
use super::{HotkeyCallback, HotkeyHook, HotkeyId};
use crate::platform::CollaboratorError;

/// Hotkey hook backed by a global keyboard listener
pub struct HotkeyListener {
    shared: Arc<Shared>,
}

struct Shared {
    running: AtomicBool,
    next_id: AtomicU64,
    bindings: Mutex<HashMap<HotkeyId, (Combination, HotkeyCallback)>>,
    recorder: Mutex<Option<mpsc::Sender<Combination>>>,
    /// Bumped each time a recording starts
    recording_generation: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            bindings: Mutex::new(HashMap::new()),
            recorder: Mutex::new(None),
            recording_generation: AtomicU64::new(0),
        }
    }

    /// Start recording; chords begun before this call are never delivered
    fn begin_recording(&self) -> mpsc::Receiver<Combination> {
        let (tx, rx) = mpsc::channel();
        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        self.recording_generation.fetch_add(1, Ordering::SeqCst);
        *recorder = Some(tx);
        rx
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::new()),
        }
    }

    /// Start the hotkey listener
    ///
    /// Spawns a dedicated thread that receives every key event of the
    /// session. rdev offers no way to stop `listen`, so after `stop()` the
    /// thread keeps running but ignores events.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let shared = Arc::clone(&self.shared);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                let mut tracker = KeyTracker::default();
                let callback_shared = Arc::clone(&shared);
                let callback = move |event: Event| {
                    if callback_shared.running.load(Ordering::SeqCst) {
                        tracker.handle(&callback_shared, event);
                    }
                };

                // This blocks until an error occurs
                if let Err(e) = listen(callback) {
                    error!(?e, "hotkey listener error");
                }

                shared.running.store(false, Ordering::SeqCst);
                // Wake up a pending read_next_combination
                shared
                    .recorder
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| HotkeyError::ThreadSpawn(e.to_string()))?;

        Ok(())
    }

    /// Stop delivering hotkey events
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        self.shared
            .recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

impl Default for HotkeyListener {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyHook for HotkeyListener {
    fn register(
        &self,
        combination: &Combination,
        callback: HotkeyCallback,
    ) -> Result<HotkeyId, CollaboratorError> {
        if combination.is_empty() {
            return Err(CollaboratorError::Hotkey("empty combination".to_string()));
        }
        let id = HotkeyId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));
        self.shared
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, (combination.clone(), callback));
        debug!(%combination, ?id, "hotkey registered");
        Ok(id)
    }

    fn unregister(&self, id: HotkeyId) -> Result<(), CollaboratorError> {
        self.shared
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .map(|_| ())
            .ok_or(CollaboratorError::NotRegistered)
    }

    fn read_next_combination(&self) -> Result<Combination, CollaboratorError> {
        if !self.is_running() {
            return Err(CollaboratorError::Hotkey("listener is not running".to_string()));
        }
        self.shared
            .begin_recording()
            .recv()
            .map_err(|_| CollaboratorError::Hotkey("listener stopped while recording".to_string()))
    }
}

/// Pressed-key state of the listener thread
#[derive(Default)]
struct KeyTracker {
    held: Combination,
    /// Largest combination seen since the last full release, for recording
    chord: Option<Combination>,
    /// Recording generation when the chord's first key went down
    chord_generation: u64,
}

impl KeyTracker {
    fn handle(&mut self, shared: &Shared, event: Event) {
        match event.event_type {
            EventType::KeyPress(key) => self.press(shared, key),
            EventType::KeyRelease(key) => self.release(shared, key),
            _ => {}
        }
    }

    fn press(&mut self, shared: &Shared, key: Key) {
        let before = self.held.clone();
        match key_name(key) {
            Some(KeyName::Modifier(name)) => {
                self.held.modifiers.set(name, true);
            }
            Some(KeyName::Key(name)) => {
                self.held.key = Some(name.to_string());
            }
            None => return,
        }
        // Auto-repeat
        if self.held == before {
            return;
        }

        if before.is_empty() {
            self.chord_generation = shared.recording_generation.load(Ordering::SeqCst);
        }
        self.chord = Some(self.held.clone());

        let recording = shared
            .recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if recording {
            return;
        }

        let matching: Vec<HotkeyCallback> = shared
            .bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|(combination, _)| *combination == self.held)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in matching {
            callback();
        }
    }

    fn release(&mut self, shared: &Shared, key: Key) {
        match key_name(key) {
            Some(KeyName::Modifier(name)) => {
                self.held.modifiers.set(name, false);
            }
            Some(KeyName::Key(name)) => {
                if self.held.key.as_deref() == Some(name) {
                    self.held.key = None;
                }
            }
            None => return,
        }

        if !self.held.is_empty() {
            return;
        }
        let Some(chord) = self.chord.take() else {
            return;
        };
        if chord.key.is_none() {
            debug!(%chord, "modifier-only chord ignored");
            return;
        }

        let mut recorder = shared
            .recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if recorder.is_none() {
            return;
        }
        if self.chord_generation != shared.recording_generation.load(Ordering::SeqCst) {
            debug!(%chord, "chord began before recording, ignored");
            return;
        }
        if let Some(tx) = recorder.take() {
            debug!(%chord, "combination recorded");
            let _ = tx.send(chord);
        }
    }
}

/// Name of an rdev key; main key names are members of `KEY_NAMES`
enum KeyName {
    Modifier(&'static str),
    Key(&'static str),
}

fn key_name(key: Key) -> Option<KeyName> {
    use KeyName::{Key as K, Modifier as M};

    let name = match key {
        Key::ControlLeft | Key::ControlRight => M("ctrl"),
        Key::Alt | Key::AltGr => M("alt"),
        Key::ShiftLeft | Key::ShiftRight => M("shift"),
        Key::MetaLeft | Key::MetaRight => M("meta"),
        Key::KeyA => K("a"),
        Key::KeyB => K("b"),
        Key::KeyC => K("c"),
        Key::KeyD => K("d"),
        Key::KeyE => K("e"),
        Key::KeyF => K("f"),
        Key::KeyG => K("g"),
        Key::KeyH => K("h"),
        Key::KeyI => K("i"),
        Key::KeyJ => K("j"),
        Key::KeyK => K("k"),
        Key::KeyL => K("l"),
        Key::KeyM => K("m"),
        Key::KeyN => K("n"),
        Key::KeyO => K("o"),
        Key::KeyP => K("p"),
        Key::KeyQ => K("q"),
        Key::KeyR => K("r"),
        Key::KeyS => K("s"),
        Key::KeyT => K("t"),
        Key::KeyU => K("u"),
        Key::KeyV => K("v"),
        Key::KeyW => K("w"),
        Key::KeyX => K("x"),
        Key::KeyY => K("y"),
        Key::KeyZ => K("z"),
        Key::Num0 => K("0"),
        Key::Num1 => K("1"),
        Key::Num2 => K("2"),
        Key::Num3 => K("3"),
        Key::Num4 => K("4"),
        Key::Num5 => K("5"),
        Key::Num6 => K("6"),
        Key::Num7 => K("7"),
        Key::Num8 => K("8"),
        Key::Num9 => K("9"),
        Key::F1 => K("f1"),
        Key::F2 => K("f2"),
        Key::F3 => K("f3"),
        Key::F4 => K("f4"),
        Key::F5 => K("f5"),
        Key::F6 => K("f6"),
        Key::F7 => K("f7"),
        Key::F8 => K("f8"),
        Key::F9 => K("f9"),
        Key::F10 => K("f10"),
        Key::F11 => K("f11"),
        Key::F12 => K("f12"),
        Key::Space => K("space"),
        Key::Return => K("enter"),
        Key::Escape => K("escape"),
        Key::Tab => K("tab"),
        Key::Backspace => K("backspace"),
        Key::Delete => K("delete"),
        Key::Insert => K("insert"),
        Key::Home => K("home"),
        Key::End => K("end"),
        Key::PageUp => K("pageup"),
        Key::PageDown => K("pagedown"),
        Key::UpArrow => K("up"),
        Key::DownArrow => K("down"),
        Key::LeftArrow => K("left"),
        Key::RightArrow => K("right"),
        Key::Minus => K("-"),
        Key::Equal => K("="),
        Key::Comma => K(","),
        Key::Dot => K("."),
        Key::Slash => K("/"),
        Key::SemiColon => K(";"),
        Key::Quote => K("'"),
        Key::BackQuote => K("`"),
        Key::LeftBracket => K("["),
        Key::RightBracket => K("]"),
        Key::BackSlash => K("\\"),
        _ => return None,
    };
    Some(name)
}
