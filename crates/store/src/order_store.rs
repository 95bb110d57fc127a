//! In-memory snapshot of the board data for one dashboard session.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::models::customer::Customer;
use crate::models::order::{Order, OrderStatus};
use crate::models::product::Product;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("order {0} is not in the store")]
    OrderNotFound(i64),
}

/// Single source of truth for the client-visible order list, plus the
/// read-mostly product and customer catalogs that refresh alongside it.
///
/// The store itself is synchronous and accepts any status assignment; which
/// transitions a user may perform is decided by the callers that mutate it.
#[derive(Debug, Default)]
pub struct OrderStore {
    orders: Vec<Order>,
    products: Vec<Product>,
    customers: Vec<Customer>,
}

impl OrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wholesale replace after a full re-fetch. Fetch order is preserved and
    /// becomes the within-column ordering.
    pub fn replace_all(&mut self, orders: Vec<Order>) {
        debug!(count = orders.len(), "order list replaced");
        self.orders = orders;
    }

    pub fn replace_products(&mut self, products: Vec<Product>) {
        self.products = products;
    }

    pub fn replace_customers(&mut self, customers: Vec<Customer>) {
        self.customers = customers;
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    pub fn get(&self, order_id: i64) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == order_id)
    }

    /// Set an order's status in place, returning the full prior value so the
    /// caller can roll back. A miss means the caller held a stale id.
    pub fn apply_status_change(
        &mut self,
        order_id: i64,
        new_status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let order = self
            .orders
            .iter_mut()
            .find(|order| order.id == order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        let previous = order.clone();
        order.status = new_status;
        Ok(previous)
    }

    /// Put a prior order value back. Silently does nothing when the id has
    /// vanished: a concurrent full refresh may have removed the row, and that
    /// refresh is authoritative.
    pub fn restore(&mut self, previous: Order) {
        match self.orders.iter_mut().find(|order| order.id == previous.id) {
            Some(slot) => *slot = previous,
            None => debug!(order_id = previous.id, "restore skipped, order no longer present"),
        }
    }

    /// Column membership. Every status maps to a (possibly empty) column;
    /// within a column, orders keep their store sequence.
    pub fn group_by_status(&self) -> HashMap<OrderStatus, Vec<Order>> {
        let mut groups: HashMap<OrderStatus, Vec<Order>> = OrderStatus::ALL
            .into_iter()
            .map(|status| (status, Vec::new()))
            .collect();
        for order in &self.orders {
            groups.entry(order.status).or_default().push(order.clone());
        }
        groups
    }

    /// Case-insensitive catalog search over product name and SKU.
    pub fn search_products(&self, term: &str) -> Vec<Product> {
        self.products
            .iter()
            .filter(|product| product.matches(term))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::models::order::{OrderPayload, StructuredPayload};

    fn order(id: i64, status: OrderStatus) -> Order {
        Order {
            id,
            status,
            total_price: Some(100.0),
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

    #[test]
    fn replace_all_is_idempotent_for_grouping() {
        let mut store = OrderStore::new();
        let orders = vec![
            order(3, OrderStatus::Enviado),
            order(2, OrderStatus::ASeparar),
            order(1, OrderStatus::NovoPedido),
        ];

        store.replace_all(orders.clone());
        let first = store.group_by_status();
        store.replace_all(orders);
        let second = store.group_by_status();

        assert_eq!(first, second);
    }

    #[test]
    fn grouping_covers_every_column() {
        let store = OrderStore::new();
        let groups = store.group_by_status();
        assert_eq!(groups.len(), OrderStatus::ALL.len());
        for status in OrderStatus::ALL {
            assert!(groups[&status].is_empty());
        }
    }

    #[test]
    fn grouping_preserves_store_sequence_within_a_column() {
        let mut store = OrderStore::new();
        store.replace_all(vec![
            order(5, OrderStatus::ASeparar),
            order(4, OrderStatus::NovoPedido),
            order(3, OrderStatus::ASeparar),
        ]);

        let groups = store.group_by_status();
        let ids: Vec<i64> = groups[&OrderStatus::ASeparar].iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![5, 3]);
    }

    #[test]
    fn apply_status_change_returns_prior_value() {
        let mut store = OrderStore::new();
        store.replace_all(vec![order(1, OrderStatus::NovoPedido)]);

        let previous = store
            .apply_status_change(1, OrderStatus::ASeparar)
            .unwrap();

        assert_eq!(previous.status, OrderStatus::NovoPedido);
        assert_eq!(store.get(1).unwrap().status, OrderStatus::ASeparar);
    }

    #[test]
    fn apply_status_change_rejects_unknown_id() {
        let mut store = OrderStore::new();
        store.replace_all(vec![order(1, OrderStatus::NovoPedido)]);

        let err = store
            .apply_status_change(9_999_999, OrderStatus::ASeparar)
            .unwrap_err();

        assert_eq!(err, StoreError::OrderNotFound(9_999_999));
        assert_eq!(store.get(1).unwrap().status, OrderStatus::NovoPedido);
    }

    #[test]
    fn restore_puts_the_prior_value_back() {
        let mut store = OrderStore::new();
        store.replace_all(vec![order(1, OrderStatus::NovoPedido)]);
        let before = store.get(1).unwrap().clone();

        let previous = store
            .apply_status_change(1, OrderStatus::Cancelado)
            .unwrap();
        store.restore(previous);

        assert_eq!(store.get(1).unwrap(), &before);
    }

    #[test]
    fn restore_is_a_noop_when_the_order_vanished() {
        let mut store = OrderStore::new();
        store.replace_all(vec![order(1, OrderStatus::NovoPedido), order(2, OrderStatus::Enviado)]);
        let previous = store
            .apply_status_change(2, OrderStatus::Concluido)
            .unwrap();

        // A racing full refresh removed order 2 in the meantime.
        store.replace_all(vec![order(1, OrderStatus::NovoPedido)]);
        store.restore(previous);

        assert!(store.get(2).is_none());
        assert_eq!(store.orders().len(), 1);
    }

    #[test]
    fn search_products_matches_name_and_sku() {
        let mut store = OrderStore::new();
        store.replace_products(vec![
            Product {
                id: 1,
                name: Some("Camiseta Azul".into()),
                sku: Some("CAM-AZ".into()),
                price: Some(59.9),
                cost: None,
                stock_quantity: Some(10),
                supplier: None,
                category: None,
                brand: None,
                description: None,
                image_url: None,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            },
            Product {
                id: 2,
                name: Some("Caneca".into()),
                sku: Some("CAN-01".into()),
                price: Some(35.0),
                cost: None,
                stock_quantity: Some(3),
                supplier: None,
                category: None,
                brand: None,
                description: None,
                image_url: None,
                created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            },
        ]);

        assert_eq!(store.search_products("camiseta").len(), 1);
        assert_eq!(store.search_products("CAN-01").len(), 1);
        assert_eq!(store.search_products("ca").len(), 2);
        assert_eq!(store.search_products("xyz").len(), 0);
    }
}
