/// Pure challenge lifecycle rules.
pub mod lifecycle;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, mpsc};
use tracing::warn;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::document_store::DocumentStore,
    dto::ws::EventEnvelope,
    error::ServiceError,
    services::{events::Notifier, identity::IdentityProvider},
};

/// Cheaply cloneable handle on the application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push messages to one connected client socket.
pub struct ClientConnection {
    /// Connection identifier, distinct per socket even for the same user.
    pub id: Uuid,
    /// Channel into the socket's writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Registry of connected WebSocket clients keyed by user id.
///
/// The reference [`Notifier`] implementation: events are serialized once and
/// pushed to every live socket of each addressed user.
#[derive(Default)]
pub struct ClientHub {
    connections: DashMap<String, Vec<ClientConnection>>,
}

impl ClientHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a socket for a user. One user may hold several sockets.
    pub fn register(&self, user_id: &str, connection: ClientConnection) {
        self.connections
            .entry(user_id.to_owned())
            .or_default()
            .push(connection);
    }

    /// Remove one socket, dropping the user entry when none remain.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) {
        let remove_entry = {
            let Some(mut entry) = self.connections.get_mut(user_id) else {
                return;
            };
            entry.retain(|connection| connection.id != connection_id);
            entry.is_empty()
        };

        if remove_entry {
            self.connections
                .remove_if(user_id, |_, connections| connections.is_empty());
        }
    }

    /// Number of live sockets for a user.
    pub fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .get(user_id)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    fn send_to(&self, user_id: &str, text: &str) {
        let Some(mut entry) = self.connections.get_mut(user_id) else {
            return;
        };
        // A failed send means the socket's writer task is gone; prune it.
        entry.retain(|connection| connection.tx.send(Message::Text(text.into())).is_ok());
    }
}

impl Notifier for ClientHub {
    fn notify(&self, user_ids: &[&str], message: &EventEnvelope) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failed to serialize realtime event");
                return;
            }
        };

        for user_id in user_ids {
            self.send_to(user_id, &text);
        }
    }
}

/// Per-document async locks serializing aggregate read-modify-write cycles.
///
/// The document store exposes no transactions or atomic increments, so two
/// concurrent completions touching the same counters document would race.
/// Acquiring the document's lock for the whole fetch-mutate-write sequence
/// removes the lost-update anomaly within this process.
#[derive(Default)]
pub struct AggregateLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AggregateLocks {
    /// Acquire the lock for an aggregate document key, waiting if another
    /// update to the same document is in flight.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}

/// Central application state storing collaborator handles and shared
/// connection registries.
pub struct AppState {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    identity: RwLock<Option<Arc<dyn IdentityProvider>>>,
    hub: Arc<ClientHub>,
    notifier: Arc<dyn Notifier>,
    aggregate_locks: AggregateLocks,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed; events fan out through the WebSocket hub.
    pub fn new(config: AppConfig) -> SharedState {
        let hub = Arc::new(ClientHub::new());
        Self::with_notifier(config, hub.clone(), hub)
    }

    /// Construct state with a custom notifier (used by tests to capture
    /// events instead of pushing them to sockets).
    pub fn with_notifier(
        config: AppConfig,
        hub: Arc<ClientHub>,
        notifier: Arc<dyn Notifier>,
    ) -> SharedState {
        Arc::new(Self {
            store: RwLock::new(None),
            identity: RwLock::new(None),
            hub,
            notifier,
            aggregate_locks: AggregateLocks::default(),
            config,
        })
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the document store or fail fast in degraded mode.
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a storage backend and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        let mut guard = self.store.write().await;
        *guard = Some(store);
    }

    /// Remove the current storage backend and enter degraded mode.
    pub async fn clear_store(&self) {
        let mut guard = self.store.write().await;
        guard.take();
    }

    /// Whether the application currently runs without a storage backend.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Identity provider, if one is installed.
    pub async fn identity(&self) -> Option<Arc<dyn IdentityProvider>> {
        let guard = self.identity.read().await;
        guard.as_ref().cloned()
    }

    /// Install the identity provider collaborator.
    pub async fn install_identity(&self, provider: Arc<dyn IdentityProvider>) {
        let mut guard = self.identity.write().await;
        *guard = Some(provider);
    }

    /// Registry of connected client sockets.
    pub fn hub(&self) -> &ClientHub {
        &self.hub
    }

    /// Outbound event capability.
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Per-aggregate-document lock registry.
    pub fn aggregate_locks(&self) -> &AggregateLocks {
        &self.aggregate_locks
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (ClientConnection, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ClientConnection {
                id: Uuid::new_v4(),
                tx,
            },
            rx,
        )
    }

    #[tokio::test]
    async fn hub_delivers_to_every_socket_of_a_user() {
        let hub = ClientHub::new();
        let (first, mut first_rx) = connection();
        let (second, mut second_rx) = connection();
        hub.register("uid-alice", first);
        hub.register("uid-alice", second);

        hub.notify(
            &["uid-alice"],
            &EventEnvelope::new("challenge.created", serde_json::json!({"id": "c1"})),
        );

        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn hub_prunes_dead_connections_on_send() {
        let hub = ClientHub::new();
        let (connection, rx) = connection();
        hub.register("uid-alice", connection);
        drop(rx);

        hub.notify(
            &["uid-alice"],
            &EventEnvelope::new("challenge.created", serde_json::json!({})),
        );
        assert_eq!(hub.connection_count("uid-alice"), 0);
    }

    #[tokio::test]
    async fn unregister_removes_only_the_given_socket() {
        let hub = ClientHub::new();
        let (first, _first_rx) = connection();
        let (second, _second_rx) = connection();
        let first_id = first.id;
        hub.register("uid-alice", first);
        hub.register("uid-alice", second);

        hub.unregister("uid-alice", first_id);
        assert_eq!(hub.connection_count("uid-alice"), 1);
    }

    #[tokio::test]
    async fn aggregate_locks_hand_out_the_same_lock_per_key() {
        let locks = AggregateLocks::default();
        let guard = locks.acquire("user_game_stats/uid-alice").await;

        // A second acquisition of the same key must wait...
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("user_game_stats/uid-alice"),
        );
        assert!(pending.await.is_err());

        // ...while a different key proceeds immediately.
        let other = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("user_game_stats/uid-bob"),
        );
        assert!(other.await.is_ok());

        drop(guard);
        let retry = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            locks.acquire("user_game_stats/uid-alice"),
        );
        assert!(retry.await.is_ok());
    }
}
