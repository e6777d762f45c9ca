//! Identity / session provider
//!
//! Connection changes are pushed through a `watch` channel so an in-flight
//! operation can notice the wallet going away without polling.

use std::future::Future;

use gridseal_record::Identity;
use tokio::sync::watch;

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;

    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;
}

/// In-process wallet session
#[derive(Debug)]
pub struct WalletSession {
    tx: watch::Sender<Option<Identity>>,
}

impl WalletSession {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    pub fn connected(identity: Identity) -> Self {
        let session = Self::new();
        session.connect(identity);
        session
    }

    pub fn connect(&self, identity: Identity) {
        log::info!("Wallet connected: {}", identity);
        self.tx.send_replace(Some(identity));
    }

    /// Replace the connected identity, returning the previous one.
    ///
    /// Operations running as the previous identity observe the switch as a disconnect.
    pub fn switch(&self, identity: Identity) -> Option<Identity> {
        let previous = self.tx.send_replace(Some(identity.clone()));
        log::info!(
            "Wallet switched: {} -> {}",
            previous.as_ref().map_or("(none)", Identity::as_str),
            identity
        );
        previous
    }

    pub fn disconnect(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            log::info!("Wallet disconnected: {}", previous);
        }
    }
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for WalletSession {
    fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

/// Watches one identity for the duration of an operation.
pub struct SessionGuard {
    rx: watch::Receiver<Option<Identity>>,
    actor: Identity,
}

impl SessionGuard {
    pub fn new(provider: &dyn IdentityProvider, actor: &Identity) -> Self {
        Self {
            rx: provider.subscribe(),
            actor: actor.clone(),
        }
    }

    /// Resolves once `actor` is no longer the connected identity.
    pub async fn lost(&mut self) {
        let actor = &self.actor;
        if self
            .rx
            .wait_for(|current| current.as_ref() != Some(actor))
            .await
            .is_err()
        {
            // Provider gone; the identity can no longer change.
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless the identity is lost first.
    pub async fn run<F: Future>(&mut self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.lost() => None,
            output = fut => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_connect_and_disconnect() {
        let session = WalletSession::new();
        assert_eq!(session.current(), None);

        session.connect(Identity("0xb1".to_string()));
        assert_eq!(session.current(), Some(Identity("0xb1".to_string())));

        session.disconnect();
        assert_eq!(session.current(), None);
    }

    #[tokio::test]
    async fn test_guard_completes_while_connected() {
        let alice = Identity("0xa1".to_string());
        let session = WalletSession::connected(alice.clone());
        let mut guard = SessionGuard::new(&session, &alice);

        assert_eq!(guard.run(async { 7 }).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_cancels_on_switch() {
        let alice = Identity("0xa1".to_string());
        let session = WalletSession::connected(alice.clone());
        let mut guard = SessionGuard::new(&session, &alice);

        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            1
        };
        let switch = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let previous = session.switch(Identity("0xb2".to_string()));
            assert_eq!(previous, Some(Identity("0xa1".to_string())));
        };

        let (outcome, ()) = tokio::join!(guard.run(slow), switch);
        assert_eq!(outcome, None);
    }
}
