use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role — роль аутентифицированного пользователя.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Admin,
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Role::User),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Admin => write!(f, "ADMIN"),
        }
    }
}

/// Principal — аутентифицированный субъект запроса.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// OrderStatus — статус заказа. PENDING является начальным,
/// CANCELLED — терминальным.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "order_status")]
pub enum OrderStatus {
    #[postgres(name = "PENDING")]
    Pending,
    #[postgres(name = "PAID")]
    Paid,
    #[postgres(name = "PROCESSING")]
    Processing,
    #[postgres(name = "SHIPPED")]
    Shipped,
    #[postgres(name = "DELIVERED")]
    Delivered,
    #[postgres(name = "CANCELLED")]
    Cancelled,
}

/// CancelledBy — кто отменил заказ.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSql, FromSql)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[postgres(name = "cancelled_by")]
pub enum CancelledBy {
    #[postgres(name = "USER")]
    User,
    #[postgres(name = "ADMIN")]
    Admin,
}

/// Product — товар, авторитетный источник цены на момент оформления заказа.
/// Для этого сервиса запись только читается.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    #[serde(rename = "product_id")]
    pub product_id: i64,
    pub name: String,
    pub price: Decimal,
}

/// OrderItem — позиция заказа с ценой, зафиксированной при создании.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: i64,
    pub order_id: Uuid,
    #[serde(rename = "product_id")]
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// Order — основной агрегат заказа.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub total: Decimal,
    pub status: OrderStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<CancelledBy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

/// UserSummary — краткая информация о владельце заказа.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// OrderDetails — заказ вместе с владельцем (владелец виден только админу).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
}

/// LineItem — позиция, переданная клиентом при создании заказа.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub product_id: i64,
    pub quantity: i32,
}

/// PricedItem — позиция после валидации, с ценой из таблицы товаров.
/// Готова к записи в рамках транзакции создания заказа.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedItem {
    pub product_id: i64,
    pub quantity: i32,
    pub price: Decimal,
}

/// CreateOrderRequest — тело запроса POST /order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// UpdateStatusRequest — тело запроса PATCH /admin/orders/{id}/status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_deserialize_order_from_json() {
        let json = r#"
        {
           "id": "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21",
           "userId": "a1e4c3b2-0d9f-4b6a-8c7e-5f2d1a0b9c8d",
           "total": "13.50",
           "status": "PENDING",
           "cancelledAt": null,
           "cancelledBy": null,
           "createdAt": "2025-03-14T10:15:00Z",
           "updatedAt": "2025-03-14T10:15:00Z",
           "items": [
              {
                 "id": 1,
                 "orderId": "7f2c1f6e-26a5-4c5f-9e7a-0b9f4a3d8e21",
                 "product_id": 42,
                 "quantity": 2,
                 "price": "5.00"
              }
           ]
        }
        "#;
        let order: Order = serde_json::from_str(json).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_id, 42);
        assert_eq!(order.items[0].price, Decimal::new(500, 2));
        assert_eq!(order.total, Decimal::new(1350, 2));

        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 10, 15, 0).unwrap();
        assert_eq!(order.created_at, expected);
    }

    #[test]
    fn test_serialize_order_wire_names() {
        let order = Order {
            id: Uuid::nil(),
            user_id: Uuid::nil(),
            total: Decimal::new(1350, 2),
            status: OrderStatus::Cancelled,
            cancelled_at: Some(Utc.with_ymd_and_hms(2025, 3, 14, 11, 0, 0).unwrap()),
            cancelled_by: Some(CancelledBy::User),
            created_at: Utc.with_ymd_and_hms(2025, 3, 14, 10, 15, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2025, 3, 14, 11, 0, 0).unwrap(),
            items: Vec::new(),
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["status"], "CANCELLED");
        assert_eq!(value["cancelledBy"], "USER");
        assert!(value.get("userId").is_some());
        assert!(value.get("user_id").is_none());
    }

    #[test]
    fn test_order_item_keeps_snake_case_product_id() {
        let item = OrderItem {
            id: 7,
            order_id: Uuid::nil(),
            product_id: 42,
            quantity: 1,
            price: Decimal::new(100, 2),
        };
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("product_id").is_some());
        assert!(value.get("productId").is_none());
        assert!(value.get("orderId").is_some());
    }

    #[test]
    fn test_role_parsing_is_closed() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert!("user".parse::<Role>().is_err());
        assert!("SUPERADMIN".parse::<Role>().is_err());
    }

    #[test]
    fn test_create_order_request_missing_items_is_empty() {
        let req: CreateOrderRequest = serde_json::from_str("{}").unwrap();
        assert!(req.items.is_empty());
    }
}
