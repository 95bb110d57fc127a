//! Postgres implementation of the remote gateway. Change notifications ride
//! on LISTEN/NOTIFY: table triggers fire a single channel on any write to
//! the public tables, and the payload is ignored.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgListener, PgPool, PgPoolOptions};
use sqlx::FromRow;
use store::models::customer::Customer;
use store::models::order::{
    CreateOrder, Order, OrderChanges, OrderPayload, OrderStatus, StructuredPayload,
};
use store::models::product::Product;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::config::SyncConfig;
use super::gateway::{ChangeNotification, ChangeSubscription, GatewayError, OrderGateway};

/// Ids and numerics are cast explicitly so the row shape stays stable across
/// the column types the various dashboard revisions created.
const ORDER_COLUMNS: &str = "id::int8 AS id, status, total_price::float8 AS total_price, \
     origin, payment_method, delivery_type, product_id::int8 AS product_id, customer_id, \
     customer_name, customer_email, address, items, notes, created_at";

const PRODUCT_COLUMNS: &str = "id::int8 AS id, name, sku, price::float8 AS price, \
     cost::float8 AS cost, stock_quantity::int4 AS stock_quantity, supplier, category, \
     brand, description, image_url, created_at";

const CUSTOMER_COLUMNS: &str =
    "id, name, email, phone, cpf, notes, tags, created_at, updated_at";

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    status: Option<String>,
    total_price: Option<f64>,
    origin: Option<String>,
    payment_method: Option<String>,
    delivery_type: Option<String>,
    product_id: Option<i64>,
    customer_id: Option<Uuid>,
    customer_name: Option<String>,
    customer_email: Option<String>,
    address: Option<serde_json::Value>,
    items: Option<serde_json::Value>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let status = match row.status.as_deref() {
            Some(raw) => OrderStatus::parse_remote(raw).unwrap_or_else(|| {
                warn!(order_id = row.id, status = raw, "unknown order status, treating as new");
                OrderStatus::NovoPedido
            }),
            None => OrderStatus::NovoPedido,
        };

        let has_structured = row.customer_name.is_some()
            || row.customer_email.is_some()
            || row.address.is_some()
            || row.items.is_some();

        let payload = if has_structured {
            let address = row.address.and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|err| {
                        warn!(order_id = row.id, error = %err, "unreadable address payload")
                    })
                    .ok()
            });
            let items = row
                .items
                .and_then(|value| {
                    serde_json::from_value(value)
                        .map_err(|err| {
                            warn!(order_id = row.id, error = %err, "unreadable items payload")
                        })
                        .ok()
                })
                .unwrap_or_default();
            OrderPayload::Structured(StructuredPayload {
                customer_name: row.customer_name,
                customer_email: row.customer_email,
                address,
                items,
            })
        } else {
            OrderPayload::LegacyText(row.notes.unwrap_or_default())
        };

        Order {
            id: row.id,
            status,
            total_price: row.total_price,
            origin: row.origin,
            payment_method: row.payment_method,
            delivery_type: row.delivery_type,
            product_id: row.product_id,
            customer_id: row.customer_id,
            payload,
            created_at: row.created_at,
        }
    }
}

pub struct PgOrderGateway {
    pool: PgPool,
    notify_channel: String,
}

impl PgOrderGateway {
    pub fn new(pool: PgPool, notify_channel: impl Into<String>) -> Self {
        Self {
            pool,
            notify_channel: notify_channel.into(),
        }
    }

    pub async fn connect(config: &SyncConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(unavailable)?;
        Ok(Self::new(pool, config.notify_channel.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn unavailable(err: sqlx::Error) -> GatewayError {
    GatewayError::Unavailable(err.to_string())
}

fn write_failed(err: sqlx::Error) -> GatewayError {
    GatewayError::Write(err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

#[async_trait::async_trait]
impl OrderGateway for PgOrderGateway {
    async fn fetch_all(&self) -> Result<Vec<Order>, GatewayError> {
        let rows: Vec<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id DESC"))
                .fetch_all(&self.pool)
                .await
                .map_err(unavailable)?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, GatewayError> {
        sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn fetch_customers(&self) -> Result<Vec<Customer>, GatewayError> {
        sqlx::query_as(&format!("SELECT {CUSTOMER_COLUMNS} FROM customers ORDER BY name"))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)
    }

    async fn persist_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<(), GatewayError> {
        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order_id)
            .bind(new_status.to_string())
            .execute(&self.pool)
            .await
            .map_err(write_failed)?;
        debug!(order_id, status = %new_status, "status persisted");
        Ok(())
    }

    async fn insert_order(&self, new_order: CreateOrder) -> Result<Order, GatewayError> {
        let status = new_order.status.unwrap_or_default();
        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO orders (status, total_price, origin, payment_method, delivery_type, \
             product_id, customer_id, customer_name, customer_email, address, items) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(status.to_string())
        .bind(new_order.total_price)
        .bind(new_order.origin)
        .bind(new_order.payment_method)
        .bind(new_order.delivery_type)
        .bind(new_order.product_id)
        .bind(new_order.customer_id)
        .bind(new_order.customer_name)
        .bind(new_order.customer_email)
        .bind(new_order.address.as_ref().and_then(to_json))
        .bind(to_json(&new_order.items))
        .fetch_one(&self.pool)
        .await
        .map_err(write_failed)?;
        Ok(row.into())
    }

    async fn update_order(
        &self,
        order_id: i64,
        changes: OrderChanges,
    ) -> Result<Order, GatewayError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders SET \
             customer_name = COALESCE($2, customer_name), \
             customer_email = COALESCE($3, customer_email), \
             address = COALESCE($4, address), \
             items = COALESCE($5, items), \
             delivery_type = COALESCE($6, delivery_type), \
             payment_method = COALESCE($7, payment_method), \
             origin = COALESCE($8, origin), \
             total_price = COALESCE($9, total_price), \
             notes = COALESCE($10, notes), \
             status = COALESCE($11, status) \
             WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id)
        .bind(changes.customer_name)
        .bind(changes.customer_email)
        .bind(changes.address.as_ref().and_then(to_json))
        .bind(changes.items.as_ref().and_then(to_json))
        .bind(changes.delivery_type)
        .bind(changes.payment_method)
        .bind(changes.origin)
        .bind(changes.total_price)
        .bind(changes.notes)
        .bind(changes.status.map(|status| status.to_string()))
        .fetch_optional(&self.pool)
        .await
        .map_err(write_failed)?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(GatewayError::Write(format!("order {order_id} does not exist"))),
        }
    }

    async fn delete_order(&self, order_id: i64) -> Result<(), GatewayError> {
        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.pool)
            .await
            .map_err(write_failed)?;
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ChangeSubscription, GatewayError> {
        let mut listener = PgListener::connect_with(&self.pool).await.map_err(unavailable)?;
        listener.listen(&self.notify_channel).await.map_err(unavailable)?;

        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let channel = self.notify_channel.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    received = listener.try_recv() => received,
                };
                match received {
                    // A reconnection gap may have dropped notifications, so
                    // it counts as "something changed" too.
                    Ok(Some(_)) | Ok(None) => {
                        if tx.send(ChangeNotification).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(channel = %channel, error = %err, "change listener error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            debug!(channel = %channel, "change listener stopped");
        });

        Ok(ChangeSubscription::new(rx, cancel))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn row(id: i64) -> OrderRow {
        OrderRow {
            id,
            status: Some("a_separar".into()),
            total_price: Some(89.9),
            origin: Some("whatsapp".into()),
            payment_method: Some("pix".into()),
            delivery_type: Some("retirada".into()),
            product_id: None,
            customer_id: None,
            customer_name: None,
            customer_email: None,
            address: None,
            items: None,
            notes: None,
            created_at: Utc.with_ymd_and_hms(2025, 5, 2, 9, 30, 0).unwrap(),
        }
    }

    #[test]
    fn bare_rows_map_to_legacy_text_payload() {
        let mut bare = row(1);
        bare.notes = Some("2x caneca, entregar sábado".into());
        let order = Order::from(bare);
        assert_eq!(order.status, OrderStatus::ASeparar);
        assert_eq!(
            order.payload,
            OrderPayload::LegacyText("2x caneca, entregar sábado".into())
        );
    }

    #[test]
    fn structured_columns_win_over_notes() {
        let mut structured = row(2);
        structured.customer_name = Some("Maria".into());
        structured.items = Some(serde_json::json!([
            {"name": "Camiseta", "quantity": 2, "price": 60.0}
        ]));
        structured.notes = Some("ignored".into());

        let order = Order::from(structured);
        match order.payload {
            OrderPayload::Structured(payload) => {
                assert_eq!(payload.customer_name.as_deref(), Some("Maria"));
                assert_eq!(payload.items.len(), 1);
                assert_eq!(payload.items[0].quantity, 2);
            }
            OrderPayload::LegacyText(_) => panic!("expected structured payload"),
        }
    }

    #[test]
    fn unknown_status_defaults_to_new() {
        let mut odd = row(3);
        odd.status = Some("Pendente".into());
        assert_eq!(Order::from(odd).status, OrderStatus::NovoPedido);

        let mut unknown = row(4);
        unknown.status = Some("faturado".into());
        assert_eq!(Order::from(unknown).status, OrderStatus::NovoPedido);

        let mut missing = row(5);
        missing.status = None;
        assert_eq!(Order::from(missing).status, OrderStatus::NovoPedido);
    }

    #[test]
    fn malformed_items_payload_degrades_to_empty() {
        let mut odd = row(6);
        odd.customer_name = Some("Ana".into());
        odd.items = Some(serde_json::json!({"not": "an array"}));

        match Order::from(odd).payload {
            OrderPayload::Structured(payload) => assert!(payload.items.is_empty()),
            OrderPayload::LegacyText(_) => panic!("expected structured payload"),
        }
    }
}
