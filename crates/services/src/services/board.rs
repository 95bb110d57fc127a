//! Kanban presentation of the order store: derives the column layout and
//! translates drag gestures into coordinator calls. No business validation
//! happens here; status legality lives in the coordinator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use store::models::order::{Order, OrderStatus};
use tracing::debug;
use ts_rs::TS;

use super::order_sync::{OrderSyncService, SyncError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct BoardColumn {
    pub status: OrderStatus,
    pub title: String,
    pub orders: Vec<Order>,
}

/// End-of-drag gesture as reported by the frontend. `over` is the id of the
/// column the card was dropped on, if it was dropped on one at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct DragEnd {
    pub order_id: i64,
    pub over: Option<String>,
}

pub struct KanbanBoard {
    sync: Arc<OrderSyncService>,
}

impl KanbanBoard {
    pub fn new(sync: Arc<OrderSyncService>) -> Self {
        Self { sync }
    }

    /// Column layout in canonical order, every status present even when
    /// empty.
    pub async fn columns(&self) -> Vec<BoardColumn> {
        let mut grouped = self.sync.grouped().await;
        OrderStatus::ALL
            .into_iter()
            .map(|status| BoardColumn {
                status,
                title: status.label().to_string(),
                orders: grouped.remove(&status).unwrap_or_default(),
            })
            .collect()
    }

    /// Translate a drag gesture into at most one `move_order` call. Drops
    /// outside any column or back onto the current column do nothing, and
    /// completed/cancelled cards offer no outgoing moves.
    pub async fn handle_drag_end(&self, event: DragEnd) -> Result<(), SyncError> {
        let Some(target) = event.over else {
            return Ok(());
        };

        let current = {
            let store = self.sync.store();
            let status = store.read().await.get(event.order_id).map(|order| order.status);
            status
        };

        match current {
            Some(status) if status.to_string() == target => {
                debug!(order_id = event.order_id, "dropped on the current column");
                Ok(())
            }
            Some(status) if status.is_terminal() => {
                debug!(
                    order_id = event.order_id,
                    status = %status,
                    "terminal orders do not move"
                );
                Ok(())
            }
            // Unknown ids fall through to the coordinator, which turns them
            // into a forced refresh.
            _ => self.sync.move_order(event.order_id, &target).await,
        }
    }
}
