//! Action to hotkey bindings owned by the worker

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::broker::Action;
use crate::hotkey::{Combination, HotkeyCallback, HotkeyHook, HotkeyId};
use crate::platform::CollaboratorError;

/// Called with the combination that triggered it
pub type ActionCallback = Arc<dyn Fn(&Combination) + Send + Sync>;

/// Hotkeys, callbacks and live registrations of every action
#[derive(Default)]
pub struct Bindings {
    hotkeys: BTreeMap<Action, Combination>,
    callbacks: HashMap<Action, ActionCallback>,
    registered: HashMap<Action, HotkeyId>,
}

impl Bindings {
    pub fn new(hotkeys: BTreeMap<Action, Combination>) -> Self {
        Self {
            hotkeys,
            ..Self::default()
        }
    }

    pub fn hotkey(&self, action: Action) -> Option<&Combination> {
        self.hotkeys.get(&action)
    }

    pub fn set_callback(&mut self, action: Action, callback: ActionCallback) {
        self.callbacks.insert(action, callback);
    }

    /// Point `action` at `combination`; takes effect on the next `register_all`
    pub fn rebind(&mut self, action: Action, combination: Combination) {
        self.hotkeys.insert(action, combination);
    }

    #[cfg(test)]
    pub fn is_registered(&self, action: Action) -> bool {
        self.registered.contains_key(&action)
    }

    /// Re-register every action that has both a hotkey and a callback
    ///
    /// Each previous registration is removed first, so an action is never
    /// bound twice. Failures are logged and the action is left
    /// unregistered until the next pass. Returns the number registered.
    pub fn register_all(&mut self, hook: &dyn HotkeyHook) -> usize {
        let mut count = 0;
        for (action, combination) in &self.hotkeys {
            let Some(callback) = self.callbacks.get(action) else {
                continue;
            };

            if let Some(id) = self.registered.remove(action) {
                match hook.unregister(id) {
                    Ok(()) | Err(CollaboratorError::NotRegistered) => {}
                    Err(e) => warn!(%action, error = %e, "failed to unregister hotkey"),
                }
            }

            let trigger = combination.clone();
            let callback = Arc::clone(callback);
            let hotkey_callback: HotkeyCallback = Arc::new(move || callback(&trigger));

            match hook.register(combination, hotkey_callback) {
                Ok(id) => {
                    debug!(%action, %combination, "hotkey registered");
                    self.registered.insert(*action, id);
                    count += 1;
                }
                Err(e) => {
                    warn!(%action, %combination, error = %e, "failed to register hotkey, will retry");
                }
            }
        }
        count
    }

    /// Remove every registration
    pub fn unregister_all(&mut self, hook: &dyn HotkeyHook) {
        for (action, id) in self.registered.drain() {
            match hook.unregister(id) {
                Ok(()) | Err(CollaboratorError::NotRegistered) => {}
                Err(e) => warn!(%action, error = %e, "failed to unregister hotkey"),
            }
        }
    }
}
