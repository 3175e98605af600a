//! In-memory collaborators for tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{Clipboard, ClipboardHandle, CollaboratorError, Keyboard, KeystrokeSink};
use crate::app::{UiEvent, UiSurface};
use crate::broker::Action;
use crate::hotkey::{Combination, HotkeyCallback, HotkeyHook, HotkeyId};

#[derive(Default)]
pub struct FakeHotkeyHook {
    next_id: AtomicU64,
    bindings: Mutex<HashMap<HotkeyId, (Combination, HotkeyCallback)>>,
    recorded: Mutex<VecDeque<Combination>>,
    pub fail_register: Mutex<bool>,
    pub registrations: AtomicUsize,
}

impl FakeHotkeyHook {
    /// Queue the combination returned by the next `read_next_combination`
    pub fn record(&self, combination: &str) {
        self.recorded
            .lock()
            .unwrap()
            .push_back(combination.parse().unwrap());
    }

    /// Active registrations, canonical form, sorted
    pub fn active(&self) -> Vec<String> {
        let mut active: Vec<String> = self
            .bindings
            .lock()
            .unwrap()
            .values()
            .map(|(combination, _)| combination.to_string())
            .collect();
        active.sort();
        active
    }

    /// Press `combination`; returns how many callbacks fired
    pub fn press(&self, combination: &str) -> usize {
        let combination: Combination = combination.parse().unwrap();
        let callbacks: Vec<HotkeyCallback> = self
            .bindings
            .lock()
            .unwrap()
            .values()
            .filter(|(bound, _)| *bound == combination)
            .map(|(_, callback)| Arc::clone(callback))
            .collect();
        for callback in &callbacks {
            callback();
        }
        callbacks.len()
    }
}

impl HotkeyHook for FakeHotkeyHook {
    fn register(
        &self,
        combination: &Combination,
        callback: HotkeyCallback,
    ) -> Result<HotkeyId, CollaboratorError> {
        if *self.fail_register.lock().unwrap() {
            return Err(CollaboratorError::Hotkey("register refused".to_string()));
        }
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let id = HotkeyId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.bindings
            .lock()
            .unwrap()
            .insert(id, (combination.clone(), callback));
        Ok(id)
    }

    fn unregister(&self, id: HotkeyId) -> Result<(), CollaboratorError> {
        self.bindings
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(CollaboratorError::NotRegistered)
    }

    fn read_next_combination(&self) -> Result<Combination, CollaboratorError> {
        self.recorded
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CollaboratorError::Hotkey("nothing recorded".to_string()))
    }
}

#[derive(Default)]
pub struct FakeClipboard {
    pub text: Mutex<Option<String>>,
    /// Handles currently open
    pub open: Arc<AtomicUsize>,
    pub opened_total: AtomicUsize,
}

impl FakeClipboard {
    pub fn with_text(text: &str) -> Self {
        let clipboard = Self::default();
        *clipboard.text.lock().unwrap() = Some(text.to_string());
        clipboard
    }
}

struct FakeClipboardHandle {
    text: Option<String>,
    open: Arc<AtomicUsize>,
}

impl Clipboard for FakeClipboard {
    fn open(&self) -> Result<Box<dyn ClipboardHandle + '_>, CollaboratorError> {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened_total.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeClipboardHandle {
            text: self.text.lock().unwrap().clone(),
            open: Arc::clone(&self.open),
        }))
    }
}

impl ClipboardHandle for FakeClipboardHandle {
    fn text(&mut self) -> Result<Option<String>, CollaboratorError> {
        Ok(self.text.clone())
    }
}

impl Drop for FakeClipboardHandle {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct FakeKeyboard {
    pub typed: Arc<Mutex<String>>,
    pub released: Arc<Mutex<Vec<String>>>,
    /// Time spent per emitted character
    pub step: Duration,
    /// Fail after this many characters
    pub fail_after: Option<usize>,
}

impl FakeKeyboard {
    pub fn slow(step: Duration) -> Self {
        Self {
            step,
            ..Self::default()
        }
    }

    pub fn typed(&self) -> String {
        self.typed.lock().unwrap().clone()
    }
}

struct FakeSink<'a> {
    keyboard: &'a FakeKeyboard,
}

impl Keyboard for FakeKeyboard {
    fn session(&self) -> Result<Box<dyn KeystrokeSink + '_>, CollaboratorError> {
        Ok(Box::new(FakeSink { keyboard: self }))
    }
}

impl KeystrokeSink for FakeSink<'_> {
    fn emit(&mut self, ch: char) -> Result<(), CollaboratorError> {
        let mut typed = self.keyboard.typed.lock().unwrap();
        if self.keyboard.fail_after == Some(typed.chars().count()) {
            return Err(CollaboratorError::Keyboard("device gone".to_string()));
        }
        typed.push(ch);
        drop(typed);
        if !self.keyboard.step.is_zero() {
            thread::sleep(self.keyboard.step);
        }
        Ok(())
    }

    fn release(&mut self, combination: &str) -> Result<(), CollaboratorError> {
        self.keyboard
            .released
            .lock()
            .unwrap()
            .push(combination.to_string());
        Ok(())
    }
}

/// UI surface fed from a shared event queue, recording label updates
#[derive(Clone, Default)]
pub struct FakeUi {
    pub events: Arc<Mutex<VecDeque<UiEvent>>>,
    pub shown: Arc<Mutex<Vec<(Action, String)>>>,
}

impl FakeUi {
    pub fn push(&self, event: UiEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn shown(&self) -> Vec<(Action, String)> {
        self.shown.lock().unwrap().clone()
    }
}

impl UiSurface for FakeUi {
    fn poll_event(&mut self) -> Option<UiEvent> {
        self.events.lock().unwrap().pop_front()
    }

    fn show(&mut self, action: Action, value: &str) -> Result<(), CollaboratorError> {
        self.shown.lock().unwrap().push((action, value.to_string()));
        Ok(())
    }
}
