//! Registry of live push channels, one per authenticated user.
//!
//! Shared by every connecting client (writers) and every delivery-router
//! invocation (readers). A single async mutex keyed by username keeps
//! lookups atomic with respect to registration; nothing awaits I/O while the
//! lock is held, so contention stays negligible.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use metrics::gauge;
use shared::models::StreamEvent;
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// A registered channel along with the epoch of its registration.
///
/// The epoch makes supersession observable: a stale disconnect can prove it
/// no longer owns the mapping before removing it.
#[derive(Debug, Clone)]
pub struct LiveChannel {
    pub sender: mpsc::Sender<StreamEvent>,
    pub epoch: u64,
}

/// Maps user identity to the user's single live push channel.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<String, LiveChannel>>,
    next_epoch: AtomicU64,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sender` as the live channel for `user`, superseding any
    /// previous registration (last-connect-wins). Returns the epoch to pass
    /// back to [`ConnectionRegistry::unregister`].
    pub async fn register(&self, user: &str, sender: mpsc::Sender<StreamEvent>) -> u64 {
        let epoch = self.next_epoch.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.inner.lock().await;
        let superseded = guard
            .insert(user.to_string(), LiveChannel { sender, epoch })
            .is_some();
        gauge!("chat_active_connections").set(guard.len() as f64);
        drop(guard);

        if superseded {
            debug!(user, epoch, "superseded previous live channel");
        }
        epoch
    }

    /// The live channel for `user`, or `None` when the user is offline for
    /// push purposes (their messages still land in the store).
    pub async fn lookup(&self, user: &str) -> Option<LiveChannel> {
        self.inner.lock().await.get(user).cloned()
    }

    /// Removes the mapping only when `epoch` still owns it, so a stale
    /// disconnect racing a fresh connect cannot evict the newer channel.
    /// Returns whether a mapping was removed.
    pub async fn unregister(&self, user: &str, epoch: u64) -> bool {
        let mut guard = self.inner.lock().await;
        let owns = guard.get(user).is_some_and(|entry| entry.epoch == epoch);
        if owns {
            guard.remove(user);
        }
        gauge!("chat_active_connections").set(guard.len() as f64);
        owns
    }

    /// Number of currently registered channels.
    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (mpsc::Sender<StreamEvent>, mpsc::Receiver<StreamEvent>) {
        mpsc::channel(8)
    }

    #[tokio::test]
    async fn lookup_returns_absent_for_offline_users() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn second_registration_supersedes_the_first() {
        let registry = ConnectionRegistry::new();
        let (first_tx, mut first_rx) = channel();
        let (second_tx, mut second_rx) = channel();

        registry.register("alice", first_tx).await;
        registry.register("alice", second_tx).await;
        assert_eq!(registry.connection_count().await, 1);

        let live = registry.lookup("alice").await.expect("channel registered");
        live.sender.try_send(StreamEvent::Ping).expect("send to live channel");

        // The push reaches only the newest channel.
        assert!(second_rx.try_recv().is_ok());
        assert!(first_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_unregister_does_not_evict_a_newer_channel() {
        let registry = ConnectionRegistry::new();
        let (first_tx, _first_rx) = channel();
        let (second_tx, _second_rx) = channel();

        let stale_epoch = registry.register("alice", first_tx).await;
        let live_epoch = registry.register("alice", second_tx).await;

        assert!(!registry.unregister("alice", stale_epoch).await);
        assert!(registry.lookup("alice").await.is_some());

        assert!(registry.unregister("alice", live_epoch).await);
        assert!(registry.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn unregister_is_per_user() {
        let registry = ConnectionRegistry::new();
        let (alice_tx, _alice_rx) = channel();
        let (bob_tx, _bob_rx) = channel();

        let alice_epoch = registry.register("alice", alice_tx).await;
        registry.register("bob", bob_tx).await;

        registry.unregister("alice", alice_epoch).await;
        assert!(registry.lookup("alice").await.is_none());
        assert!(registry.lookup("bob").await.is_some());
    }
}
