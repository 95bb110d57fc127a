//! Optimistic order mutations with rollback against the remote store.

use std::collections::HashMap;
use std::sync::Arc;

use store::models::order::{CreateOrder, InvalidOrder, Order, OrderChanges, OrderStatus};
use store::models::product::Product;
use store::order_store::{OrderStore, StoreError};
use thiserror::Error;
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use super::gateway::{GatewayError, OrderGateway};
use super::notification::NotificationService;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The requested target is not a member of the status set. Always a
    /// programming or configuration error, rejected before any mutation.
    #[error("'{0}' is not a known order status")]
    InvalidStatus(String),
    /// The board referenced an id the store no longer holds; a refresh is
    /// requested to bring the board back in line.
    #[error("order {0} is not on the board")]
    OrderNotFound(i64),
    #[error("invalid order: {0}")]
    Validation(#[from] InvalidOrder),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Coordinates every mutation of the [`OrderStore`]: drag-initiated status
/// changes apply locally first so the board never visibly waits on the
/// network, and the store is rolled back if the remote write is rejected.
pub struct OrderSyncService {
    store: Arc<RwLock<OrderStore>>,
    gateway: Arc<dyn OrderGateway>,
    notifications: NotificationService,
    invalidate: Arc<Notify>,
}

impl OrderSyncService {
    pub fn new(
        store: Arc<RwLock<OrderStore>>,
        gateway: Arc<dyn OrderGateway>,
        notifications: NotificationService,
    ) -> Self {
        Self {
            store,
            gateway,
            notifications,
            invalidate: Arc::new(Notify::new()),
        }
    }

    pub fn store(&self) -> Arc<RwLock<OrderStore>> {
        Arc::clone(&self.store)
    }

    pub fn notifications(&self) -> &NotificationService {
        &self.notifications
    }

    /// Signal fired when the board needs a forced refresh; the realtime loop
    /// treats it exactly like a remote change notification.
    pub fn invalidation_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.invalidate)
    }

    pub async fn grouped(&self) -> HashMap<OrderStatus, Vec<Order>> {
        self.store.read().await.group_by_status()
    }

    pub async fn search_products(&self, term: &str) -> Vec<Product> {
        self.store.read().await.search_products(term)
    }

    /// Move an order to the column named by `new_status`. The target is
    /// validated against the status set before anything is touched.
    pub async fn move_order(&self, order_id: i64, new_status: &str) -> Result<(), SyncError> {
        let status: OrderStatus = new_status
            .parse()
            .map_err(|_| SyncError::InvalidStatus(new_status.to_string()))?;
        self.move_order_to(order_id, status).await
    }

    /// Optimistic status change: the store is updated before the remote
    /// write is issued, and restored if that write fails. Moving an order to
    /// the status it already has still writes; the remote update touches
    /// the row's timestamp and other clients key off the notification.
    pub async fn move_order_to(
        &self,
        order_id: i64,
        status: OrderStatus,
    ) -> Result<(), SyncError> {
        let previous = {
            let mut store = self.store.write().await;
            match store.apply_status_change(order_id, status) {
                Ok(previous) => previous,
                Err(StoreError::OrderNotFound(id)) => {
                    warn!(order_id = id, "status change for an order missing from the store");
                    self.invalidate.notify_one();
                    return Err(SyncError::OrderNotFound(id));
                }
            }
        };
        debug!(order_id, status = %status, "status applied locally");

        if let Err(err) = self.gateway.persist_status_change(order_id, status).await {
            {
                let mut store = self.store.write().await;
                store.restore(previous);
            }
            warn!(order_id, error = %err, "remote store rejected the status change, rolled back");
            self.notifications
                .error("Erro ao atualizar o pedido, alteração revertida.");
            return Err(err.into());
        }

        info!(order_id, status = %status, "order status persisted");
        self.notifications.success("Pedido atualizado com sucesso!");
        Ok(())
    }

    /// Full re-fetch of orders and catalogs, replacing the store wholesale.
    /// On failure the store is left untouched so the board never goes blank.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let (orders, products, customers) = tokio::join!(
            self.gateway.fetch_all(),
            self.gateway.fetch_products(),
            self.gateway.fetch_customers(),
        );

        match (orders, products, customers) {
            (Ok(orders), Ok(products), Ok(customers)) => {
                let count = orders.len();
                let mut store = self.store.write().await;
                store.replace_all(orders);
                store.replace_products(products);
                store.replace_customers(customers);
                debug!(orders = count, "store refreshed from remote");
                Ok(())
            }
            (orders, products, customers) => {
                let cause = orders
                    .err()
                    .or_else(|| products.err())
                    .or_else(|| customers.err())
                    .unwrap_or_else(|| GatewayError::Unavailable("refresh failed".into()));
                warn!(error = %cause, "refresh failed, keeping displayed data");
                self.notifications
                    .warning("Não foi possível atualizar os dados do painel.");
                Err(cause.into())
            }
        }
    }

    /// Create an order from the wizard payload. The store is not touched
    /// here: the insert fires a change notification and the board picks the
    /// new order up on the resulting refresh.
    pub async fn create_order(&self, new_order: CreateOrder) -> Result<Order, SyncError> {
        new_order.validate()?;
        match self.gateway.insert_order(new_order).await {
            Ok(created) => {
                info!(order_id = created.id, "order created");
                self.notifications.success("Pedido criado com sucesso!");
                Ok(created)
            }
            Err(err) => {
                warn!(error = %err, "order creation rejected by the remote store");
                self.notifications.error("Falha ao criar o pedido.");
                Err(err.into())
            }
        }
    }

    /// Manual edit of an order's fields; like creation, local state follows
    /// via the change notification.
    pub async fn update_order(
        &self,
        order_id: i64,
        changes: OrderChanges,
    ) -> Result<Order, SyncError> {
        let updated = self.gateway.update_order(order_id, changes).await?;
        info!(order_id, "order updated");
        Ok(updated)
    }

    /// The explicit delete action that lives outside the board. Cancellation
    /// is a status change, not a delete.
    pub async fn delete_order(&self, order_id: i64) -> Result<(), SyncError> {
        match self.gateway.delete_order(order_id).await {
            Ok(()) => {
                info!(order_id, "order deleted");
                self.notifications.success("Pedido excluído.");
                Ok(())
            }
            Err(err) => {
                warn!(order_id, error = %err, "order deletion rejected by the remote store");
                self.notifications.error("Falha ao excluir o pedido.");
                Err(err.into())
            }
        }
    }
}
