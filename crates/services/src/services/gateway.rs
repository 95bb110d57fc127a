//! Remote datastore boundary. Everything the sync core needs from the
//! backend goes through [`OrderGateway`], so the whole remote side can be
//! swapped without touching the board logic.

use async_trait::async_trait;
use store::models::customer::Customer;
use store::models::order::{CreateOrder, Order, OrderChanges, OrderStatus};
use store::models::product::Product;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transient connectivity or auth failure on a read. Callers must keep
    /// whatever they are currently displaying.
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
    /// A write was rejected by the remote store.
    #[error("remote write failed: {0}")]
    Write(String),
}

/// A single "something changed" signal. Carries no diff: the remote feed is
/// an invalidation trigger, not an event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeNotification;

/// Handle for an active change feed. The registration is released either by
/// calling [`ChangeSubscription::unsubscribe`] or by dropping the handle, so
/// no callback outlives the view consuming it.
pub struct ChangeSubscription {
    receiver: mpsc::Receiver<ChangeNotification>,
    cancel: CancellationToken,
}

impl ChangeSubscription {
    pub fn new(receiver: mpsc::Receiver<ChangeNotification>, cancel: CancellationToken) -> Self {
        Self { receiver, cancel }
    }

    /// Wait for the next change signal. `None` means the feed closed and no
    /// further notifications will arrive.
    pub async fn changed(&mut self) -> Option<ChangeNotification> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Every order visible to the current principal, newest first.
    async fn fetch_all(&self) -> Result<Vec<Order>, GatewayError>;

    async fn fetch_products(&self) -> Result<Vec<Product>, GatewayError>;

    async fn fetch_customers(&self) -> Result<Vec<Customer>, GatewayError>;

    /// Remote update of exactly the status column.
    async fn persist_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<(), GatewayError>;

    async fn insert_order(&self, new_order: CreateOrder) -> Result<Order, GatewayError>;

    async fn update_order(
        &self,
        order_id: i64,
        changes: OrderChanges,
    ) -> Result<Order, GatewayError>;

    async fn delete_order(&self, order_id: i64) -> Result<(), GatewayError>;

    /// Register for "any row changed" signals, from any client including
    /// this one.
    async fn subscribe_changes(&self) -> Result<ChangeSubscription, GatewayError>;
}
