//! In-memory gateway fake: a tiny remote store with toggleable failures and
//! a gate for holding writes in flight.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use store::models::customer::Customer;
use store::models::order::{
    CreateOrder, Order, OrderChanges, OrderPayload, OrderStatus, StructuredPayload,
};
use store::models::product::Product;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use super::gateway::{ChangeNotification, ChangeSubscription, GatewayError, OrderGateway};

pub(crate) fn sample_order(id: i64, status: OrderStatus) -> Order {
    Order {
        id,
        status,
        total_price: Some(150.0),
        origin: Some("instagram".into()),
        payment_method: Some("pix".into()),
        delivery_type: Some("sedex".into()),
        product_id: None,
        customer_id: None,
        payload: OrderPayload::Structured(StructuredPayload {
            customer_name: Some(format!("Cliente {id}")),
            customer_email: None,
            address: None,
            items: Vec::new(),
        }),
        created_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
    }
}

pub(crate) struct InMemoryGateway {
    orders: Mutex<Vec<Order>>,
    products: Mutex<Vec<Product>>,
    customers: Mutex<Vec<Customer>>,
    persist_calls: Mutex<Vec<(i64, OrderStatus)>>,
    fetch_count: AtomicI64,
    insert_count: AtomicI64,
    next_id: AtomicI64,
    fail_fetches: AtomicBool,
    fail_writes: AtomicBool,
    persist_gate: Mutex<Option<Arc<Notify>>>,
    change_tx: Mutex<Option<mpsc::Sender<ChangeNotification>>>,
    sub_cancel: Mutex<Option<CancellationToken>>,
}

impl InMemoryGateway {
    pub(crate) fn with_orders(orders: Vec<Order>) -> Self {
        // Opt tests into RUST_LOG output.
        utils::logging::init();
        let next_id = orders.iter().map(|order| order.id).max().unwrap_or(0) + 1;
        Self {
            orders: Mutex::new(orders),
            products: Mutex::new(Vec::new()),
            customers: Mutex::new(Vec::new()),
            persist_calls: Mutex::new(Vec::new()),
            fetch_count: AtomicI64::new(0),
            insert_count: AtomicI64::new(0),
            next_id: AtomicI64::new(next_id),
            fail_fetches: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            persist_gate: Mutex::new(None),
            change_tx: Mutex::new(None),
            sub_cancel: Mutex::new(None),
        }
    }

    /// Replace the remote truth, e.g. to simulate another client's edits.
    pub(crate) fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.lock().unwrap() = orders;
    }

    pub(crate) fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Park every subsequent persist call until the returned handle is
    /// notified.
    pub(crate) fn gate_persist(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.persist_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn persist_calls(&self) -> Vec<(i64, OrderStatus)> {
        self.persist_calls.lock().unwrap().clone()
    }

    pub(crate) fn fetch_count(&self) -> i64 {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub(crate) fn insert_count(&self) -> i64 {
        self.insert_count.load(Ordering::SeqCst)
    }

    /// Push one change signal to the active subscription, if any.
    pub(crate) async fn notify_change(&self) {
        let tx = self.change_tx.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(ChangeNotification).await;
        }
    }

    pub(crate) fn subscription_released(&self) -> bool {
        self.sub_cancel
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

#[async_trait::async_trait]
impl OrderGateway for InMemoryGateway {
    async fn fetch_all(&self) -> Result<Vec<Order>, GatewayError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".into()));
        }
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn fetch_products(&self) -> Result<Vec<Product>, GatewayError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".into()));
        }
        Ok(self.products.lock().unwrap().clone())
    }

    async fn fetch_customers(&self) -> Result<Vec<Customer>, GatewayError> {
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("connection refused".into()));
        }
        Ok(self.customers.lock().unwrap().clone())
    }

    async fn persist_status_change(
        &self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<(), GatewayError> {
        self.persist_calls.lock().unwrap().push((order_id, new_status));

        let gate = self.persist_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Write("update rejected".into()));
        }

        let mut orders = self.orders.lock().unwrap();
        if let Some(order) = orders.iter_mut().find(|order| order.id == order_id) {
            order.status = new_status;
        }
        Ok(())
    }

    async fn insert_order(&self, new_order: CreateOrder) -> Result<Order, GatewayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Write("insert rejected".into()));
        }
        self.insert_count.fetch_add(1, Ordering::SeqCst);

        let order = Order {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            status: new_order.status.unwrap_or_default(),
            total_price: new_order.total_price,
            origin: new_order.origin,
            payment_method: new_order.payment_method,
            delivery_type: new_order.delivery_type,
            product_id: new_order.product_id,
            customer_id: new_order.customer_id,
            payload: OrderPayload::Structured(StructuredPayload {
                customer_name: Some(new_order.customer_name),
                customer_email: new_order.customer_email,
                address: new_order.address,
                items: new_order.items,
            }),
            created_at: Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap(),
        };
        self.orders.lock().unwrap().push(order.clone());
        Ok(order)
    }

    async fn update_order(
        &self,
        order_id: i64,
        changes: OrderChanges,
    ) -> Result<Order, GatewayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Write("update rejected".into()));
        }
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or_else(|| GatewayError::Write(format!("order {order_id} does not exist")))?;
        if let Some(status) = changes.status {
            order.status = status;
        }
        if let Some(total_price) = changes.total_price {
            order.total_price = Some(total_price);
        }
        if let Some(payment_method) = changes.payment_method {
            order.payment_method = Some(payment_method);
        }
        Ok(order.clone())
    }

    async fn delete_order(&self, order_id: i64) -> Result<(), GatewayError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(GatewayError::Write("delete rejected".into()));
        }
        self.orders.lock().unwrap().retain(|order| order.id != order_id);
        Ok(())
    }

    async fn subscribe_changes(&self) -> Result<ChangeSubscription, GatewayError> {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        *self.change_tx.lock().unwrap() = Some(tx);
        *self.sub_cancel.lock().unwrap() = Some(cancel.clone());
        Ok(ChangeSubscription::new(rx, cancel))
    }
}
