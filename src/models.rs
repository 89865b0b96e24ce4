//! Typed records of the catalog, one per collection.
//!
//! Field names follow the stored camelCase layout so documents written through the raw
//! `Document` API and through these types are interchangeable.

use crate::error::Result;
use crate::repository::{Entity, Repository};
use crate::types::{CollectionId, Key};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: f64, stock: i64) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            price,
            category: category.into(),
            stock,
            image: String::new(),
            status: ProductStatus::Active,
            created_at: Some(Utc::now()),
            updated_at: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Listed on the storefront: active and stock left.
    pub fn is_available(&self) -> bool {
        self.is_active() && self.stock > 0
    }
}

impl Entity for Product {
    const COLLECTION: CollectionId = CollectionId::Products;

    fn key(&self) -> Option<Key> {
        self.id.map(Key::Id)
    }
}

impl Repository<Product> {
    /// Admin save: a new product gets both timestamps, an edit keeps the stored
    /// `createdAt` and moves `updatedAt` to now.
    pub async fn save(&self, mut product: Product) -> Result<Product> {
        let now = Utc::now();
        let stored = match product.id {
            Some(id) => self.get(id).await?,
            None => None,
        };
        product.created_at = stored
            .and_then(|p| p.created_at)
            .or(product.created_at)
            .or(Some(now));
        product.updated_at = Some(now);

        let key = self.put(&product).await?;
        product.id = key.as_id();
        Ok(product)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    pub email: String,
    /// Salted digest produced by `auth::hash_password`.
    pub password_hash: String,
    pub role: Role,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Entity for User {
    const COLLECTION: CollectionId = CollectionId::Users;

    fn key(&self) -> Option<Key> {
        self.id.map(Key::Id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// May point at a product that no longer exists.
    pub product_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub customer_info: CustomerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    /// A pending order whose total is the sum of its line items.
    pub fn new(user_id: Option<u64>, items: Vec<OrderItem>) -> Self {
        let total = items
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum();
        Self {
            id: None,
            user_id,
            items,
            total,
            status: OrderStatus::Pending,
            customer_info: CustomerInfo::default(),
            created_at: Some(Utc::now()),
        }
    }
}

impl Entity for Order {
    const COLLECTION: CollectionId = CollectionId::Orders;

    fn key(&self) -> Option<Key> {
        self.id.map(Key::Id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Category {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Entity for Category {
    const COLLECTION: CollectionId = CollectionId::Categories;

    fn key(&self) -> Option<Key> {
        self.id.map(Key::Id)
    }
}

/// One settings entry; the key is the setting's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

impl Setting {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Entity for Setting {
    const COLLECTION: CollectionId = CollectionId::Settings;

    fn key(&self) -> Option<Key> {
        Some(Key::Name(self.key.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl AnalyticsEvent {
    pub fn new(date: NaiveDate, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: None,
            date,
            kind: kind.into(),
            payload,
        }
    }
}

impl Entity for AnalyticsEvent {
    const COLLECTION: CollectionId = CollectionId::Analytics;

    fn key(&self) -> Option<Key> {
        self.id.map(Key::Id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{from_document, to_document};
    use serde_json::json;

    #[test]
    fn test_product_layout_is_camel_case() {
        let product = Product::new("Desk Lamp", "Home & Garden", 24.5, 12);
        let doc = to_document(&product).unwrap();
        assert!(doc.contains_key("createdAt"));
        assert!(!doc.contains_key("id"));
        assert_eq!(doc["status"], json!("active"));
    }

    #[test]
    fn test_sparse_product_decodes() {
        let doc = json!({"id": 3, "name": "A", "category": "X", "stock": 5});
        let product: Product = from_document(doc.as_object().cloned().unwrap()).unwrap();
        assert_eq!(product.id, Some(3));
        assert_eq!(product.status, ProductStatus::Active);
        assert!(product.created_at.is_none());
        assert!(product.is_available());
    }

    #[test]
    fn test_order_total_and_analytics_type_field() {
        let order = Order::new(
            Some(1),
            vec![
                OrderItem {
                    product_id: 1,
                    name: "A".into(),
                    price: 2.5,
                    quantity: 2,
                },
                OrderItem {
                    product_id: 2,
                    name: "B".into(),
                    price: 1.0,
                    quantity: 3,
                },
            ],
        );
        assert_eq!(order.total, 8.0);
        assert_eq!(order.status, OrderStatus::Pending);

        let event = AnalyticsEvent::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            "page_view",
            json!({"path": "/"}),
        );
        let doc = to_document(&event).unwrap();
        assert_eq!(doc["type"], json!("page_view"));
        assert_eq!(doc["date"], json!("2024-03-01"));
    }
}
