//! Global hotkey hook
//!
//! The worker binds actions to key combinations through a [`HotkeyHook`].
//! With the `desktop` feature, [`HotkeyListener`] implements the hook on
//! top of a system-wide rdev keyboard listener.

mod keys;
#[cfg(feature = "desktop")]
mod listener;

use std::sync::Arc;

pub use keys::{canonical_key, Combination, ModifierState, ParseHotkeyError, KEY_NAMES};
#[cfg(feature = "desktop")]
pub use listener::{HotkeyError, HotkeyListener};

use crate::platform::CollaboratorError;

/// Invoked on the hook's thread whenever a registered combination fires
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration with a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyId(pub u64);

/// System-wide hotkey registration
pub trait HotkeyHook: Send + Sync {
    /// Call `callback` whenever `combination` is pressed
    fn register(
        &self,
        combination: &Combination,
        callback: HotkeyCallback,
    ) -> Result<HotkeyId, CollaboratorError>;

    /// Remove a registration; `NotRegistered` if `id` is unknown
    fn unregister(&self, id: HotkeyId) -> Result<(), CollaboratorError>;

    /// Block until the user presses and releases a combination
    fn read_next_combination(&self) -> Result<Combination, CollaboratorError>;
}
