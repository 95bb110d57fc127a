//! Composition root for one dashboard session. Everything is constructed
//! and injected here, with no ambient global store, and torn down by
//! [`BoardSession::shutdown`] when the user navigates away.

use std::sync::Arc;
use std::time::Duration;

use store::order_store::OrderStore;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::board::KanbanBoard;
use super::config::SyncConfig;
use super::gateway::OrderGateway;
use super::notification::NotificationService;
use super::order_sync::{OrderSyncService, SyncError};
use super::postgres::PgOrderGateway;
use super::realtime::RealtimeService;

pub struct BoardSession {
    sync: Arc<OrderSyncService>,
    notifications: NotificationService,
    cancel: CancellationToken,
    realtime: JoinHandle<()>,
}

impl BoardSession {
    /// Connect to the remote store and start a live session against it.
    pub async fn start(config: SyncConfig) -> Result<Self, SyncError> {
        let gateway = Arc::new(PgOrderGateway::connect(&config).await?);
        Self::start_with_gateway(gateway, config.debounce()).await
    }

    /// Start a session over an injected gateway. Any remote store
    /// implementation works, which is what the tests rely on.
    pub async fn start_with_gateway(
        gateway: Arc<dyn OrderGateway>,
        debounce: Duration,
    ) -> Result<Self, SyncError> {
        let store = Arc::new(RwLock::new(OrderStore::new()));
        let notifications = NotificationService::new();
        let sync = Arc::new(OrderSyncService::new(
            store,
            Arc::clone(&gateway),
            notifications.clone(),
        ));

        // An unreachable remote at startup is not fatal: the board opens
        // empty and catches up on the next successful refresh.
        if let Err(err) = sync.refresh().await {
            warn!(error = %err, "initial load failed, starting with an empty board");
        }

        let cancel = CancellationToken::new();
        let realtime =
            RealtimeService::spawn(gateway, Arc::clone(&sync), debounce, cancel.clone()).await?;

        info!("board session started");
        Ok(Self {
            sync,
            notifications,
            cancel,
            realtime,
        })
    }

    pub fn sync(&self) -> Arc<OrderSyncService> {
        Arc::clone(&self.sync)
    }

    pub fn board(&self) -> KanbanBoard {
        KanbanBoard::new(Arc::clone(&self.sync))
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Stop the realtime loop and release the change subscription.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.realtime.await {
            warn!(error = %err, "realtime sync loop ended abnormally");
        }
        info!("board session closed");
    }
}
