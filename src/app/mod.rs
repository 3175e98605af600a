//! Application adapter between a UI surface and the broker
//!
//! Inbound UI events become messages:
//! - a close event sends `EXIT` to the adapter's own queue, which
//!   broadcasts cancellation to every runtime instance
//! - a rebind event sends `SET_HOTKEY` to the worker
//!
//! Outbound, a `HOTKEY_SET` message updates the label shown for the action.

mod console;

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info};

pub use console::{parse_command, ConsoleUi};

use crate::broker::{Action, Message, MessageKind};
use crate::platform::CollaboratorError;
use crate::runtime::{Context, HandlerError, RuntimeBuilder};

/// Label shown while the worker waits for a new combination
pub const RECORDING_LABEL: &str = "...";

/// Events emitted by a UI surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// The window was closed or the stop button pressed
    Close,
    /// The user asked to rebind the hotkey of an action
    Rebind(Action),
}

/// A user-facing surface showing one hotkey label per action
pub trait UiSurface: Send {
    /// Next pending event, without blocking
    fn poll_event(&mut self) -> Option<UiEvent>;

    /// Update the value displayed for `action`
    fn show(&mut self, action: Action, value: &str) -> Result<(), CollaboratorError>;
}

/// State of the application adapter runtime instance
pub struct Application {
    ui: Box<dyn UiSurface>,
    labels: BTreeMap<Action, String>,
}

impl Application {
    /// Labels currently displayed
    pub fn labels(&self) -> &BTreeMap<Action, String> {
        &self.labels
    }

    fn show(&mut self, action: Action, value: &str) -> Result<(), CollaboratorError> {
        self.ui.show(action, value)?;
        self.labels.insert(action, value.to_string());
        Ok(())
    }

    fn init(&mut self, _ctx: &Context) -> Result<(), HandlerError> {
        let labels: Vec<(Action, String)> = self
            .labels
            .iter()
            .map(|(action, label)| (*action, label.clone()))
            .collect();
        for (action, label) in labels {
            self.show(action, &label)?;
        }
        Ok(())
    }

    fn handle_hotkey_set(&mut self, _ctx: &Context, message: Message) -> Result<(), HandlerError> {
        let (Some(action), Some(hotkey)) = (message.action(), message.hotkey()) else {
            return Err(HandlerError::InvalidMessage {
                kind: message.kind,
                field: "action and hotkey",
            });
        };
        info!(%action, %hotkey, "hotkey updated");
        self.show(action, hotkey)?;
        Ok(())
    }

    fn poll_ui(&mut self, ctx: &Context) -> Result<(), HandlerError> {
        while let Some(event) = self.ui.poll_event() {
            debug!(?event, "ui event");
            match event {
                UiEvent::Close => {
                    info!("close requested");
                    ctx.send(Message::exit(), ctx.input_queue());
                    break;
                }
                UiEvent::Rebind(action) => {
                    self.show(action, RECORDING_LABEL)?;
                    ctx.reply(Message::set_hotkey(action));
                }
            }
        }
        Ok(())
    }
}

/// Build the application adapter runtime instance
///
/// Rebind requests go to `worker_queue`; `labels` are the hotkeys
/// displayed at startup.
pub fn application(
    input_queue: &str,
    worker_queue: &str,
    ui: Box<dyn UiSurface>,
    labels: BTreeMap<Action, String>,
    poll_interval: Duration,
) -> RuntimeBuilder<Application> {
    let state = Application { ui, labels };

    RuntimeBuilder::new("app", input_queue, state)
        .output(worker_queue)
        .poll_interval(poll_interval)
        .on_init(Application::init)
        .handler(MessageKind::HotkeySet, Application::handle_hotkey_set)
        .handler(MessageKind::Info, |_, _, message| {
            info!(text = %message.text, "app info");
            Ok(())
        })
        .on_tick(Application::poll_ui)
}
