//! The generic run loop and its builder

use std::collections::HashMap;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::action::ActionSlot;
use super::registry::{Peer, Registry};
use super::{HandlerError, Lifecycle, RuntimeState};
use crate::broker::{Broker, Message, MessageKind};

/// Default idle wait between loop iterations when the queue is empty
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

type Handler<S> = Box<dyn FnMut(&mut S, &Context, Message) -> Result<(), HandlerError> + Send>;
type Hook<S> = Box<dyn FnMut(&mut S, &Context) -> Result<(), HandlerError> + Send>;

/// What a handler or callback can see of its runtime instance
pub struct Context {
    name: String,
    input: String,
    output: Option<String>,
    broker: Broker,
    token: CancellationToken,
    actions: ActionSlot,
}

impl Context {
    pub fn input_queue(&self) -> &str {
        &self.input
    }

    /// Slot for this instance's action thread
    pub fn actions(&self) -> &ActionSlot {
        &self.actions
    }

    pub fn send(&self, message: Message, queue: &str) {
        self.broker.send(message, queue);
    }

    /// Send to the output queue; returns false if there is none
    pub fn reply(&self, message: Message) -> bool {
        match &self.output {
            Some(queue) => {
                self.broker.send(message, queue);
                true
            }
            None => {
                warn!(runtime = %self.name, %message, "no output queue, message dropped");
                false
            }
        }
    }
}

/// Configuration of a runtime instance around its state `S`
///
/// ```ignore
/// let handle = RuntimeBuilder::new("worker", "worker", state)
///     .output("app")
///     .handler(MessageKind::SetHotkey, |state, ctx, msg| state.rebind(ctx, msg))
///     .on_tick(|state, ctx| state.poll(ctx))
///     .spawn(&broker, &registry)?;
/// ```
pub struct RuntimeBuilder<S> {
    name: String,
    input: String,
    output: Option<String>,
    poll_interval: Duration,
    state: S,
    handlers: HashMap<MessageKind, Handler<S>>,
    on_init: Option<Hook<S>>,
    on_tick: Option<Hook<S>>,
    on_exit: Option<Hook<S>>,
}

impl<S: Send + 'static> RuntimeBuilder<S> {
    pub fn new(name: impl Into<String>, input_queue: impl Into<String>, state: S) -> Self {
        Self {
            name: name.into(),
            input: input_queue.into(),
            output: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state,
            handlers: HashMap::new(),
            on_init: None,
            on_tick: None,
            on_exit: None,
        }
    }

    pub fn output(mut self, queue: impl Into<String>) -> Self {
        self.output = Some(queue.into());
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Handle messages of `kind`
    ///
    /// `INTERRUPT` and `EXIT` are handled by the loop itself; handlers
    /// registered for them are never called.
    pub fn handler<F>(mut self, kind: MessageKind, handler: F) -> Self
    where
        F: FnMut(&mut S, &Context, Message) -> Result<(), HandlerError> + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    /// Run once on the runtime thread before the first iteration
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &Context) -> Result<(), HandlerError> + Send + 'static,
    {
        self.on_init = Some(Box::new(hook));
        self
    }

    /// Run on every loop iteration, after message dispatch
    pub fn on_tick<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &Context) -> Result<(), HandlerError> + Send + 'static,
    {
        self.on_tick = Some(Box::new(hook));
        self
    }

    /// Run once after the loop stops and the action thread is drained
    pub fn on_exit<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S, &Context) -> Result<(), HandlerError> + Send + 'static,
    {
        self.on_exit = Some(Box::new(hook));
        self
    }

    /// Register the instance and return its loop, to be run on this thread
    pub fn build(self, broker: &Broker, registry: &Registry) -> Runtime<S> {
        let token = CancellationToken::new();
        let lifecycle = Lifecycle::new();
        registry.join(&self.name, Peer::new(token.clone(), lifecycle.clone()));

        let actions = ActionSlot::new(&self.name, token.clone());
        Runtime {
            ctx: Context {
                name: self.name,
                input: self.input,
                output: self.output,
                broker: broker.clone(),
                token,
                actions,
            },
            registry: registry.clone(),
            lifecycle,
            poll_interval: self.poll_interval,
            state: self.state,
            handlers: self.handlers,
            on_init: self.on_init,
            on_tick: self.on_tick,
            on_exit: self.on_exit,
        }
    }

    /// Register the instance and run its loop on a new thread
    pub fn spawn(self, broker: &Broker, registry: &Registry) -> io::Result<RuntimeHandle<S>> {
        let runtime = self.build(broker, registry);
        let name = runtime.ctx.name.clone();
        let token = runtime.ctx.token.clone();
        let lifecycle = runtime.lifecycle.clone();

        let join = thread::Builder::new()
            .name(name.clone())
            .spawn(move || runtime.run());

        match join {
            Ok(join) => Ok(RuntimeHandle {
                token,
                lifecycle,
                join,
            }),
            Err(e) => {
                lifecycle.terminate();
                registry.leave(&name);
                Err(e)
            }
        }
    }
}

/// A registered runtime instance, ready to run
pub struct Runtime<S> {
    ctx: Context,
    registry: Registry,
    lifecycle: Lifecycle,
    poll_interval: Duration,
    state: S,
    handlers: HashMap<MessageKind, Handler<S>>,
    on_init: Option<Hook<S>>,
    on_tick: Option<Hook<S>>,
    on_exit: Option<Hook<S>>,
}

impl<S> Runtime<S> {
    /// Run until cancelled, then return the instance state
    pub fn run(mut self) -> S {
        info!(runtime = %self.ctx.name, input = %self.ctx.input, "runtime started");

        if let Some(init) = self.on_init.as_mut() {
            if let Err(e) = init(&mut self.state, &self.ctx) {
                warn!(runtime = %self.ctx.name, error = %e, "init failed");
            }
        }

        while !self.ctx.token.is_cancelled() {
            let message = self.ctx.broker.read(&self.ctx.input);
            let idle = message.is_none();
            if let Some(message) = message {
                self.dispatch(message);
            }

            if self.ctx.token.is_cancelled() {
                break;
            }

            if let Some(tick) = self.on_tick.as_mut() {
                if let Err(e) = tick(&mut self.state, &self.ctx) {
                    warn!(runtime = %self.ctx.name, error = %e, "tick failed");
                }
            }

            if idle {
                thread::sleep(self.poll_interval);
            }
        }

        self.finish()
    }

    fn dispatch(&mut self, message: Message) {
        debug!(runtime = %self.ctx.name, %message, "message received");

        match message.kind {
            MessageKind::Interrupt => {
                if self.ctx.actions.interrupt() {
                    info!(runtime = %self.ctx.name, "action interrupted");
                } else {
                    debug!(runtime = %self.ctx.name, "no action to interrupt");
                }
            }
            MessageKind::Exit => self.broadcast_exit(),
            kind => match self.handlers.get_mut(&kind) {
                Some(handler) => {
                    if let Err(e) = handler(&mut self.state, &self.ctx, message) {
                        warn!(runtime = %self.ctx.name, %kind, error = %e, "handler failed");
                    }
                }
                None => {
                    debug!(runtime = %self.ctx.name, %kind, "no handler registered");
                }
            },
        }
    }

    /// Peers are signalled before this instance cancels itself
    fn broadcast_exit(&self) {
        let peers = self.registry.cancel_peers(&self.ctx.name);
        info!(runtime = %self.ctx.name, peers, "exit broadcast");
        self.lifecycle.begin_shutdown();
        self.ctx.token.cancel();
    }

    fn finish(mut self) -> S {
        self.lifecycle.begin_shutdown();
        self.ctx.token.cancel();
        self.ctx.actions.shutdown();

        if let Some(on_exit) = self.on_exit.as_mut() {
            if let Err(e) = on_exit(&mut self.state, &self.ctx) {
                warn!(runtime = %self.ctx.name, error = %e, "exit callback failed");
            }
        }

        self.lifecycle.terminate();
        self.registry.leave(&self.ctx.name);
        info!(runtime = %self.ctx.name, "runtime terminated");
        self.state
    }
}

/// Handle to a runtime instance running on its own thread
pub struct RuntimeHandle<S> {
    token: CancellationToken,
    lifecycle: Lifecycle,
    join: JoinHandle<S>,
}

impl<S> RuntimeHandle<S> {
    pub fn state(&self) -> RuntimeState {
        self.lifecycle.state()
    }

    /// Signal the instance to stop without broadcasting to peers
    pub fn cancel(&self) {
        self.lifecycle.begin_shutdown();
        self.token.cancel();
    }

    /// Wait for the run loop to return its state
    pub fn join(self) -> thread::Result<S> {
        self.join.join()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;
    use crate::broker::Action;

    const FAST: Duration = Duration::from_millis(1);

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[derive(Default)]
    struct Counter {
        infos: Vec<String>,
        ticks: usize,
        exited: bool,
    }

    fn counter(name: &str) -> RuntimeBuilder<Counter> {
        RuntimeBuilder::new(name, name, Counter::default())
            .poll_interval(FAST)
            .handler(MessageKind::Info, |state: &mut Counter, _, msg| {
                state.infos.push(msg.text);
                Ok(())
            })
            .on_tick(|state, _| {
                state.ticks += 1;
                Ok(())
            })
            .on_exit(|state, _| {
                state.exited = true;
                Ok(())
            })
    }

    #[test]
    fn test_handlers_run_in_order() {
        let broker = Broker::new();
        let registry = Registry::new();
        let runtime = counter("a").build(&broker, &registry);

        broker.send(Message::info("one"), "a");
        broker.send(Message::info("two"), "a");
        broker.send(Message::exit(), "a");

        let state = runtime.run();
        assert_eq!(state.infos, vec!["one", "two"]);
        assert!(state.exited);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handler_errors_do_not_stop_loop() {
        let broker = Broker::new();
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);

        let runtime = RuntimeBuilder::new("a", "a", ())
            .poll_interval(FAST)
            .handler(MessageKind::SetHotkey, move |_, _, msg| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(HandlerError::InvalidMessage {
                    kind: msg.kind,
                    field: "action",
                })
            })
            .build(&broker, &registry);

        broker.send(Message::new(MessageKind::SetHotkey), "a");
        broker.send(Message::set_hotkey(Action::Write), "a");
        broker.send(Message::exit(), "a");
        runtime.run();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unhandled_kinds_are_ignored() {
        let broker = Broker::new();
        let registry = Registry::new();
        let runtime = counter("a").build(&broker, &registry);

        broker.send(Message::hotkey_set(Action::Write, "ctrl+v"), "a");
        broker.send(Message::info("after"), "a");
        broker.send(Message::exit(), "a");

        assert_eq!(runtime.run().infos, vec!["after"]);
    }

    #[test]
    fn test_interrupt_keeps_loop_running() {
        let broker = Broker::new();
        let registry = Registry::new();
        let handle = counter("a").spawn(&broker, &registry).unwrap();

        broker.send(Message::interrupt(), "a");
        broker.send(Message::info("still here"), "a");
        assert!(wait_until(|| broker.is_empty("a")));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(handle.state(), RuntimeState::Running);

        broker.send(Message::exit(), "a");
        let state = handle.join().unwrap();
        assert_eq!(state.infos, vec!["still here"]);
    }

    #[test]
    fn test_interrupt_cancels_action() {
        let broker = Broker::new();
        let registry = Registry::new();
        let steps = Arc::new(AtomicUsize::new(0));
        let action_steps = Arc::clone(&steps);

        let handle = RuntimeBuilder::new("a", "a", ())
            .poll_interval(FAST)
            .on_init(move |_, ctx| {
                let steps = Arc::clone(&action_steps);
                let started = ctx.actions().spawn_if_idle(move |token| {
                    while !token.is_cancelled() {
                        steps.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(1));
                    }
                });
                assert!(matches!(started, Ok(true)));
                Ok(())
            })
            .spawn(&broker, &registry)
            .unwrap();

        assert!(wait_until(|| steps.load(Ordering::SeqCst) > 0));
        broker.send(Message::interrupt(), "a");
        assert!(wait_until(|| broker.is_empty("a")));

        let mut last = steps.load(Ordering::SeqCst);
        assert!(wait_until(|| {
            let now = steps.load(Ordering::SeqCst);
            let stable = now == last;
            last = now;
            thread::sleep(Duration::from_millis(5));
            stable
        }));
        assert_eq!(handle.state(), RuntimeState::Running);

        broker.send(Message::exit(), "a");
        handle.join().unwrap();
    }

    #[test]
    fn test_exit_broadcasts_to_peers() {
        let broker = Broker::new();
        let registry = Registry::new();
        let a = counter("a").spawn(&broker, &registry).unwrap();
        let b = counter("b").spawn(&broker, &registry).unwrap();
        let c = counter("c").spawn(&broker, &registry).unwrap();
        assert_eq!(registry.len(), 3);

        broker.send(Message::exit(), "b");
        assert!(wait_until(|| b.state() != RuntimeState::Running));
        assert!(registry
            .states()
            .iter()
            .all(|(_, state)| *state != RuntimeState::Running));

        for handle in [a, b, c] {
            let state = handle.join().unwrap();
            assert!(state.exited);
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_messages_after_exit_are_not_handled() {
        let broker = Broker::new();
        let registry = Registry::new();
        let runtime = counter("a").build(&broker, &registry);

        broker.send(Message::exit(), "a");
        broker.send(Message::info("late"), "a");

        let state = runtime.run();
        assert!(state.infos.is_empty());
        assert_eq!(broker.len("a"), 1);
    }

    #[test]
    fn test_handle_cancel() {
        let broker = Broker::new();
        let registry = Registry::new();
        let a = counter("a").spawn(&broker, &registry).unwrap();
        let b = counter("b").spawn(&broker, &registry).unwrap();

        a.cancel();
        let state = a.join().unwrap();
        assert!(state.exited);

        // Cancelling one handle does not broadcast
        assert_eq!(b.state(), RuntimeState::Running);
        b.cancel();
        b.join().unwrap();
    }
}
