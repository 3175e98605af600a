//! The worker: hotkey bindings and clipboard typing
//!
//! The worker is a runtime instance configured with:
//! - a `SET_HOTKEY` handler that records a new combination, rebinds the
//!   action and answers with `HOTKEY_SET` on its output queue
//! - an init callback registering the default bindings
//! - an exit callback removing them
//!
//! Hotkey callbacks run on the hook's thread. `write` starts a typing
//! action in the runtime's action slot; `interrupt` cancels it.

mod bindings;
mod typing;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

pub use bindings::{ActionCallback, Bindings};
pub use typing::{type_clipboard, type_text, KeystrokeDelay, TypingOutcome};

use crate::broker::{Action, Message, MessageKind};
use crate::hotkey::{Combination, HotkeyHook};
use crate::platform::{Clipboard, Keyboard};
use crate::runtime::{ActionSlot, Context, HandlerError, RuntimeBuilder};

/// Worker settings
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub hotkeys: BTreeMap<Action, Combination>,
    pub delay: KeystrokeDelay,
    pub poll_interval: Duration,
}

/// External collaborators driven by the worker
#[derive(Clone)]
pub struct Collaborators {
    pub hook: Arc<dyn HotkeyHook>,
    pub clipboard: Arc<dyn Clipboard>,
    pub keyboard: Arc<dyn Keyboard>,
}

/// State of the worker runtime instance
pub struct Worker {
    collaborators: Collaborators,
    bindings: Bindings,
    delay: KeystrokeDelay,
}

impl Worker {
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    fn init(&mut self, ctx: &Context) -> Result<(), HandlerError> {
        let write = write_callback(
            ctx.actions().clone(),
            self.collaborators.clone(),
            self.delay,
        );
        let interrupt = interrupt_callback(ctx.actions().clone(), self.collaborators.clone());
        self.bindings.set_callback(Action::Write, write);
        self.bindings.set_callback(Action::Interrupt, interrupt);

        let registered = self.bindings.register_all(self.collaborators.hook.as_ref());
        info!(registered, "worker hotkeys registered");
        Ok(())
    }

    /// Record a combination for the requested action and rebind it
    fn handle_set_hotkey(&mut self, ctx: &Context, message: Message) -> Result<(), HandlerError> {
        let action = message.action().ok_or(HandlerError::InvalidMessage {
            kind: message.kind,
            field: "action",
        })?;

        info!(%action, "waiting for new hotkey");
        let combination = self.collaborators.hook.read_next_combination()?;

        self.bindings.rebind(action, combination.clone());
        self.bindings.register_all(self.collaborators.hook.as_ref());

        let hotkey = combination.to_string();
        info!(%action, %hotkey, "hotkey rebound");
        ctx.reply(Message::hotkey_set(action, hotkey));
        Ok(())
    }

    fn exit(&mut self, _ctx: &Context) -> Result<(), HandlerError> {
        self.bindings.unregister_all(self.collaborators.hook.as_ref());
        debug!("worker hotkeys unregistered");
        Ok(())
    }
}

/// Build the worker runtime instance
pub fn worker(
    input_queue: &str,
    output_queue: &str,
    config: WorkerConfig,
    collaborators: Collaborators,
) -> RuntimeBuilder<Worker> {
    let state = Worker {
        collaborators,
        bindings: Bindings::new(config.hotkeys),
        delay: config.delay,
    };

    RuntimeBuilder::new("worker", input_queue, state)
        .output(output_queue)
        .poll_interval(config.poll_interval)
        .on_init(Worker::init)
        .handler(MessageKind::SetHotkey, Worker::handle_set_hotkey)
        .handler(MessageKind::Info, |_, _, message| {
            info!(text = %message.text, "worker info");
            Ok(())
        })
        .on_exit(Worker::exit)
}

/// Start typing the clipboard unless a typing action is already live
fn write_callback(
    actions: ActionSlot,
    collaborators: Collaborators,
    delay: KeystrokeDelay,
) -> ActionCallback {
    Arc::new(move |trigger: &Combination| {
        let clipboard = Arc::clone(&collaborators.clipboard);
        let keyboard = Arc::clone(&collaborators.keyboard);
        let hotkey = trigger.to_string();

        let started = actions.spawn_if_idle(move |token| {
            match type_clipboard(
                &token,
                clipboard.as_ref(),
                keyboard.as_ref(),
                delay,
                Some(hotkey.as_str()),
            ) {
                Ok(outcome) => info!(%outcome, "typing finished"),
                Err(e) => warn!(error = %e, "typing failed"),
            }
        });

        match started {
            Ok(true) => debug!("typing started"),
            Ok(false) => debug!("typing already in progress"),
            Err(e) => error!(error = %e, "failed to spawn typing thread"),
        }
    })
}

/// Cancel the live typing action, if any
fn interrupt_callback(actions: ActionSlot, collaborators: Collaborators) -> ActionCallback {
    Arc::new(move |trigger: &Combination| {
        let hotkey = trigger.to_string();
        match collaborators.keyboard.session() {
            Ok(mut sink) => {
                if let Err(e) = sink.release(&hotkey) {
                    debug!(%hotkey, error = %e, "failed to release hotkey");
                }
            }
            Err(e) => debug!(error = %e, "no keyboard session to release hotkey"),
        }

        if actions.interrupt() {
            info!("typing interrupted by hotkey");
        }
    })
}
