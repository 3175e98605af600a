//! In-process message broker
//!
//! Runtime instances talk to each other only through named queues owned
//! by a [`Broker`]. Reads never block; an empty queue reads as `None`.

mod message;
mod queue;

pub use message::{Action, Message, MessageKind, Payload};
pub use queue::Broker;

/// Input queue of the worker
pub const WORKER_QUEUE: &str = "worker";
/// Input queue of the application adapter (and the worker's output)
pub const APP_QUEUE: &str = "app";
