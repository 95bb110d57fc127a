use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

/// Stage of an order on the board. Wire names are the Portuguese
/// snake_case strings stored in the `orders.status` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, EnumString, Display, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    NovoPedido,
    ASeparar,
    Separado,
    AEnviar,
    Enviado,
    Concluido,
    Cancelado,
    RecuperarCarrinho,
}

impl OrderStatus {
    /// Canonical column ordering on the board. `RecuperarCarrinho` is a
    /// parallel bucket, not a stage, and always renders last.
    pub const ALL: [OrderStatus; 8] = [
        OrderStatus::NovoPedido,
        OrderStatus::ASeparar,
        OrderStatus::Separado,
        OrderStatus::AEnviar,
        OrderStatus::Enviado,
        OrderStatus::Concluido,
        OrderStatus::Cancelado,
        OrderStatus::RecuperarCarrinho,
    ];

    /// Terminal statuses have no outgoing transitions on the board.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Concluido | OrderStatus::Cancelado)
    }

    /// Column title as rendered on the board.
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::NovoPedido => "Novo Pedido",
            OrderStatus::ASeparar => "A separar",
            OrderStatus::Separado => "Separado",
            OrderStatus::AEnviar => "A enviar",
            OrderStatus::Enviado => "Enviado",
            OrderStatus::Concluido => "Concluído",
            OrderStatus::Cancelado => "Cancelado",
            OrderStatus::RecuperarCarrinho => "Recuperar Carrinho",
        }
    }

    /// Parse a status as stored remotely. Rows written by older revisions of
    /// the dashboard used `pendente` (sometimes capitalized) for fresh
    /// orders; treat those as `novo_pedido`.
    pub fn parse_remote(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        if normalized == "pendente" {
            return Some(OrderStatus::NovoPedido);
        }
        normalized.parse().ok()
    }
}

/// Shipping address as captured by the new-order wizard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
pub struct OrderAddress {
    pub street: Option<String>,
    pub number: Option<String>,
    pub complement: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
}

impl OrderAddress {
    /// Single display line, skipping whatever was left blank.
    pub fn to_line(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        match (&self.street, &self.number) {
            (Some(street), Some(number)) => parts.push(format!("{street}, {number}")),
            (Some(street), None) => parts.push(street.clone()),
            _ => {}
        }
        for piece in [&self.neighborhood, &self.city, &self.state, &self.zip_code] {
            if let Some(piece) = piece {
                if !piece.is_empty() {
                    parts.push(piece.clone());
                }
            }
        }
        parts.join(" - ")
    }
}

/// One line item of an order. Remote rows store these as a JSON array whose
/// exact shape drifted across dashboard revisions, so every field is lenient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct OrderItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, alias = "unit_price")]
    pub price: f64,
}

fn default_quantity() -> u32 {
    1
}

/// Customer/address/items data attached to an order. Two representations
/// coexist in the orders table: newer rows carry structured JSON columns,
/// older rows embed everything in a free-text notes field. Callers read both
/// through [`Order::details`] instead of parsing text ad hoc.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(untagged)]
pub enum OrderPayload {
    Structured(StructuredPayload),
    LegacyText(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
pub struct StructuredPayload {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub address: Option<OrderAddress>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// Normalized read shape for either payload representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct OrderDetails {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub address: Option<String>,
    pub items: Vec<OrderItem>,
    /// Card text: customer name when known, otherwise the legacy notes.
    pub summary: String,
}

/// One customer purchase. The id is assigned by the remote store on creation
/// and never reused. `product_id`/`customer_id` are optional because several
/// dashboard revisions denormalized the relationship into the payload text
/// instead of keeping a foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct Order {
    pub id: i64,
    pub status: OrderStatus,
    pub total_price: Option<f64>,
    pub origin: Option<String>,
    pub payment_method: Option<String>,
    pub delivery_type: Option<String>,
    pub product_id: Option<i64>,
    pub customer_id: Option<Uuid>,
    pub payload: OrderPayload,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn details(&self) -> OrderDetails {
        match &self.payload {
            OrderPayload::Structured(payload) => {
                let summary = payload
                    .customer_name
                    .clone()
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| format!("Pedido #{}", self.id));
                OrderDetails {
                    customer_name: payload.customer_name.clone(),
                    customer_email: payload.customer_email.clone(),
                    address: payload.address.as_ref().map(OrderAddress::to_line),
                    items: payload.items.clone(),
                    summary,
                }
            }
            OrderPayload::LegacyText(text) => {
                let summary = text
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Pedido #{}", self.id));
                OrderDetails {
                    customer_name: None,
                    customer_email: None,
                    address: None,
                    items: Vec::new(),
                    summary,
                }
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidOrder {
    #[error("customer name is required")]
    MissingCustomerName,
    #[error("order has no items")]
    NoItems,
    #[error("total price must not be negative")]
    NegativeTotal,
}

/// Insert payload produced by the new-order wizard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct CreateOrder {
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_id: Option<Uuid>,
    pub product_id: Option<i64>,
    pub address: Option<OrderAddress>,
    pub items: Vec<OrderItem>,
    pub delivery_type: Option<String>,
    pub payment_method: Option<String>,
    pub origin: Option<String>,
    pub total_price: Option<f64>,
    pub status: Option<OrderStatus>,
}

impl CreateOrder {
    pub fn from_customer_name(customer_name: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into(),
            customer_email: None,
            customer_id: None,
            product_id: None,
            address: None,
            items: Vec::new(),
            delivery_type: None,
            payment_method: None,
            origin: None,
            total_price: None,
            status: None,
        }
    }

    /// Presence checks only; field-level form validation stays in the UI.
    pub fn validate(&self) -> Result<(), InvalidOrder> {
        if self.customer_name.trim().is_empty() {
            return Err(InvalidOrder::MissingCustomerName);
        }
        if self.items.is_empty() {
            return Err(InvalidOrder::NoItems);
        }
        if self.total_price.is_some_and(|total| total < 0.0) {
            return Err(InvalidOrder::NegativeTotal);
        }
        Ok(())
    }
}

/// Partial update for manual order edits. `None` fields keep their remote
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct OrderChanges {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub address: Option<OrderAddress>,
    pub items: Option<Vec<OrderItem>>,
    pub delivery_type: Option<String>,
    pub payment_method: Option<String>,
    pub origin: Option<String>,
    pub total_price: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<OrderStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_names_round_trip() {
        for status in OrderStatus::ALL {
            let wire = status.to_string();
            assert_eq!(wire.parse::<OrderStatus>().unwrap(), status);
        }
        assert_eq!(OrderStatus::ASeparar.to_string(), "a_separar");
        assert_eq!(OrderStatus::NovoPedido.to_string(), "novo_pedido");
        assert_eq!(OrderStatus::RecuperarCarrinho.to_string(), "recuperar_carrinho");
    }

    #[test]
    fn parse_remote_accepts_legacy_spellings() {
        assert_eq!(OrderStatus::parse_remote("pendente"), Some(OrderStatus::NovoPedido));
        assert_eq!(OrderStatus::parse_remote("Pendente"), Some(OrderStatus::NovoPedido));
        assert_eq!(OrderStatus::parse_remote(" a_enviar "), Some(OrderStatus::AEnviar));
        assert_eq!(OrderStatus::parse_remote("faturado"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Concluido.is_terminal());
        assert!(OrderStatus::Cancelado.is_terminal());
        assert!(!OrderStatus::Enviado.is_terminal());
        assert!(!OrderStatus::RecuperarCarrinho.is_terminal());
    }

    #[test]
    fn details_normalizes_structured_payload() {
        let order = Order {
            id: 7,
            status: OrderStatus::NovoPedido,
            total_price: Some(120.0),
            origin: None,
            payment_method: Some("pix".into()),
            delivery_type: None,
            product_id: None,
            customer_id: None,
            payload: OrderPayload::Structured(StructuredPayload {
                customer_name: Some("Maria Silva".into()),
                customer_email: Some("maria@example.com".into()),
                address: Some(OrderAddress {
                    street: Some("Rua das Flores".into()),
                    number: Some("42".into()),
                    city: Some("Curitiba".into()),
                    ..OrderAddress::default()
                }),
                items: vec![OrderItem {
                    name: "Camiseta".into(),
                    sku: Some("CAM-01".into()),
                    quantity: 2,
                    price: 60.0,
                }],
            }),
            created_at: Utc::now(),
        };

        let details = order.details();
        assert_eq!(details.summary, "Maria Silva");
        assert_eq!(details.address.as_deref(), Some("Rua das Flores, 42 - Curitiba"));
        assert_eq!(details.items.len(), 1);
    }

    #[test]
    fn details_normalizes_legacy_text() {
        let order = Order {
            id: 9,
            status: OrderStatus::Enviado,
            total_price: None,
            origin: None,
            payment_method: None,
            delivery_type: None,
            product_id: None,
            customer_id: None,
            payload: OrderPayload::LegacyText("\n  João - 2x caneca azul\nentregar sábado".into()),
            created_at: Utc::now(),
        };

        let details = order.details();
        assert_eq!(details.summary, "João - 2x caneca azul");
        assert!(details.customer_name.is_none());
        assert!(details.items.is_empty());
    }

    #[test]
    fn create_order_presence_checks() {
        let mut new_order = CreateOrder::from_customer_name("  ");
        assert_eq!(new_order.validate(), Err(InvalidOrder::MissingCustomerName));

        new_order.customer_name = "Ana".into();
        assert_eq!(new_order.validate(), Err(InvalidOrder::NoItems));

        new_order.items.push(OrderItem {
            name: "Caneca".into(),
            sku: None,
            quantity: 1,
            price: 35.0,
        });
        new_order.total_price = Some(-1.0);
        assert_eq!(new_order.validate(), Err(InvalidOrder::NegativeTotal));

        new_order.total_price = Some(35.0);
        assert!(new_order.validate().is_ok());
    }

    #[test]
    fn lenient_item_parsing() {
        let items: Vec<OrderItem> =
            serde_json::from_str(r#"[{"name":"Caneca","unit_price":35.0},{"quantity":3}]"#).unwrap();
        assert_eq!(items[0].price, 35.0);
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[1].quantity, 3);
        assert_eq!(items[1].name, "");
    }
}
