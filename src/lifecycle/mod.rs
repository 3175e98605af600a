//! Process lifecycle: OS shutdown signals

mod shutdown;

pub use shutdown::ShutdownSignal;
