//! Registry of live runtime instances, used for broadcast exit
//!
//! Instances join when they are built and leave when their run loop
//! returns. Broadcasting takes a snapshot under the read lock and signals
//! outside it, so joins and leaves may happen concurrently.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{Lifecycle, RuntimeState};

/// Cancellation handle of one registered runtime instance
#[derive(Debug, Clone)]
pub struct Peer {
    token: CancellationToken,
    lifecycle: Lifecycle,
}

impl Peer {
    pub fn new(token: CancellationToken, lifecycle: Lifecycle) -> Self {
        Self { token, lifecycle }
    }

    /// Signal the instance to stop; does not wait for it
    pub fn cancel(&self) {
        self.lifecycle.begin_shutdown();
        self.token.cancel();
    }

    pub fn state(&self) -> RuntimeState {
        self.lifecycle.state()
    }
}

/// Shared set of live runtime instances, keyed by name
#[derive(Debug, Clone, Default)]
pub struct Registry {
    peers: Arc<RwLock<HashMap<String, Peer>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, name: &str, peer: Peer) {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.insert(name.to_string(), peer).is_some() {
            warn!(runtime = name, "replaced a registered runtime with the same name");
        }
        debug!(runtime = name, "joined registry");
    }

    pub fn leave(&self, name: &str) {
        let mut peers = self.peers.write().unwrap_or_else(PoisonError::into_inner);
        if peers.remove(name).is_some() {
            debug!(runtime = name, "left registry");
        }
    }

    /// Cancel every registered instance except `name`; returns how many
    pub fn cancel_peers(&self, name: &str) -> usize {
        let targets: Vec<(String, Peer)> = {
            let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
            peers
                .iter()
                .filter(|(peer_name, _)| peer_name.as_str() != name)
                .map(|(peer_name, peer)| (peer_name.clone(), peer.clone()))
                .collect()
        };

        for (peer_name, peer) in &targets {
            debug!(from = name, to = %peer_name, "cancelling peer");
            peer.cancel();
        }
        targets.len()
    }

    #[cfg(test)]
    pub fn state_of(&self, name: &str) -> Option<RuntimeState> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        peers.get(name).map(Peer::state)
    }

    /// Names and states of all registered instances
    #[cfg(test)]
    pub fn states(&self) -> Vec<(String, RuntimeState)> {
        let peers = self.peers.read().unwrap_or_else(PoisonError::into_inner);
        peers
            .iter()
            .map(|(name, peer)| (name.clone(), peer.state()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> (Peer, CancellationToken) {
        let token = CancellationToken::new();
        (Peer::new(token.clone(), Lifecycle::new()), token)
    }

    #[test]
    fn test_join_and_leave() {
        let registry = Registry::new();
        let (a, _) = peer();
        registry.join("a", a);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.state_of("a"), Some(RuntimeState::Running));

        registry.leave("a");
        assert!(registry.is_empty());
        assert_eq!(registry.state_of("a"), None);

        // Leaving twice is harmless
        registry.leave("a");
    }

    #[test]
    fn test_cancel_peers_skips_caller() {
        let registry = Registry::new();
        let (a, a_token) = peer();
        let (b, b_token) = peer();
        let (c, c_token) = peer();
        registry.join("a", a);
        registry.join("b", b);
        registry.join("c", c);

        assert_eq!(registry.cancel_peers("a"), 2);

        assert!(!a_token.is_cancelled());
        assert!(b_token.is_cancelled());
        assert!(c_token.is_cancelled());
        assert_eq!(registry.state_of("a"), Some(RuntimeState::Running));
        assert_eq!(registry.state_of("b"), Some(RuntimeState::ShuttingDown));
    }

    #[test]
    fn test_cancel_tolerates_finished_peers() {
        let registry = Registry::new();
        let (a, _) = peer();
        let lifecycle = Lifecycle::new();
        lifecycle.terminate();
        registry.join("a", a);
        registry.join("dead", Peer::new(CancellationToken::new(), lifecycle));

        assert_eq!(registry.cancel_peers("a"), 1);
        assert_eq!(registry.state_of("dead"), Some(RuntimeState::Terminated));
    }
}
