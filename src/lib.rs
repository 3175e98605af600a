//! cliptype: types the clipboard out as keystrokes on a global hotkey
//!
//! Two runtime instances talk through named in-process queues:
//! - the worker owns the hotkey bindings and runs the typing action
//! - the application adapter turns UI events into messages and shows
//!   the current hotkey labels
//!
//! Every platform facility (hotkey hook, clipboard, keyboard, UI) sits
//! behind a trait so the runtimes can be driven by fakes in tests.

pub mod app;
pub mod broker;
pub mod config;
pub mod hotkey;
pub mod lifecycle;
pub mod platform;
pub mod runtime;
pub mod worker;
