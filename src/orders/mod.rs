//! Order records
//!
//! The create/get/update/cancel collaborator the specialized handlers
//! reach through their tools. In-memory only.

use crate::error::AgentError;
use crate::models::{Order, OrderStatus, OrderUpdate};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Trait for order persistence
#[async_trait::async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(
        &self,
        customer_name: &str,
        product_name: &str,
        quantity: u32,
        unit_price: f64,
    ) -> Result<Order>;
    async fn get(&self, order_id: &str) -> Result<Option<Order>>;
    async fn by_customer(&self, customer_name: &str) -> Result<Vec<Order>>;
    async fn by_product(&self, product_name: &str) -> Result<Vec<Order>>;
    async fn all(&self) -> Result<Vec<Order>>;
    async fn latest(&self) -> Result<Option<Order>>;
    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order>;
    async fn cancel(&self, order_id: &str) -> Result<Order>;
}

/// In-memory order book
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<String, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_quantity(quantity: u32) -> Result<()> {
    if quantity == 0 {
        return Err(AgentError::InvalidOrder("quantity must be greater than 0".to_string()));
    }
    Ok(())
}

fn validate_price(unit_price: f64) -> Result<()> {
    if !unit_price.is_finite() || unit_price <= 0.0 {
        return Err(AgentError::InvalidOrder("unit price must be greater than 0".to_string()));
    }
    Ok(())
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Orders sorted oldest first so listings are stable.
fn sorted(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.order_id.cmp(&b.order_id)));
    orders
}

#[async_trait::async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(
        &self,
        customer_name: &str,
        product_name: &str,
        quantity: u32,
        unit_price: f64,
    ) -> Result<Order> {
        let customer_name = customer_name.trim();
        let product_name = product_name.trim();

        if customer_name.is_empty() {
            return Err(AgentError::InvalidOrder("customer name must not be empty".to_string()));
        }
        if product_name.is_empty() {
            return Err(AgentError::InvalidOrder("product name must not be empty".to_string()));
        }
        validate_quantity(quantity)?;
        validate_price(unit_price)?;

        let order = Order {
            order_id: short_id(),
            customer_name: customer_name.to_string(),
            product_name: product_name.to_string(),
            quantity,
            unit_price,
            total_amount: quantity as f64 * unit_price,
            status: OrderStatus::Created,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut orders = self.orders.write().await;
        orders.insert(order.order_id.clone(), order.clone());

        info!(order_id = %order.order_id, "Order created");
        Ok(order)
    }

    async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(order_id.trim()).cloned())
    }

    async fn by_customer(&self, customer_name: &str) -> Result<Vec<Order>> {
        let needle = customer_name.trim().to_lowercase();
        let orders = self.orders.read().await;

        Ok(sorted(
            orders
                .values()
                .filter(|o| o.customer_name.to_lowercase() == needle)
                .cloned()
                .collect(),
        ))
    }

    async fn by_product(&self, product_name: &str) -> Result<Vec<Order>> {
        let needle = product_name.trim().to_lowercase();
        let orders = self.orders.read().await;

        Ok(sorted(
            orders
                .values()
                .filter(|o| o.product_name.to_lowercase() == needle)
                .cloned()
                .collect(),
        ))
    }

    async fn all(&self) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        Ok(sorted(orders.values().cloned().collect()))
    }

    async fn latest(&self) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders
            .values()
            .max_by(|a, b| {
                a.last_changed()
                    .cmp(&b.last_changed())
                    .then_with(|| a.order_id.cmp(&b.order_id))
            })
            .cloned())
    }

    async fn update(&self, order_id: &str, update: OrderUpdate) -> Result<Order> {
        if let Some(quantity) = update.quantity {
            validate_quantity(quantity)?;
        }
        if let Some(unit_price) = update.unit_price {
            validate_price(unit_price)?;
        }

        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id.trim())
            .ok_or_else(|| AgentError::OrderNotFound(order_id.to_string()))?;

        if order.status == OrderStatus::Cancelled {
            return Err(AgentError::InvalidOrder(format!(
                "order {} is cancelled and cannot be changed",
                order.order_id
            )));
        }

        if let Some(product_name) = update.product_name.filter(|p| !p.trim().is_empty()) {
            order.product_name = product_name.trim().to_string();
        }
        if let Some(quantity) = update.quantity {
            order.quantity = quantity;
        }
        if let Some(unit_price) = update.unit_price {
            order.unit_price = unit_price;
        }

        order.total_amount = order.quantity as f64 * order.unit_price;
        order.status = OrderStatus::Updated;
        order.updated_at = Some(Utc::now());

        info!(order_id = %order.order_id, "Order updated");
        Ok(order.clone())
    }

    async fn cancel(&self, order_id: &str) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(order_id.trim())
            .ok_or_else(|| AgentError::OrderNotFound(order_id.to_string()))?;

        order.status = OrderStatus::Cancelled;
        order.updated_at = Some(Utc::now());

        info!(order_id = %order.order_id, "Order cancelled");
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryOrderStore::new();
        let order = assert_ok!(store.create("Zhang", "headset", 5, 299.0).await);

        assert_eq!(order.order_id.len(), 8);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.total_amount, 1495.0);

        let fetched = store.get(&order.order_id).await.unwrap();
        assert_eq!(fetched, Some(order));
        assert_eq!(store.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let store = InMemoryOrderStore::new();
        assert_err!(store.create(" ", "headset", 1, 1.0).await);
        assert_err!(store.create("Zhang", "", 1, 1.0).await);
        assert_err!(store.create("Zhang", "headset", 0, 1.0).await);
        assert_err!(store.create("Zhang", "headset", 1, 0.0).await);
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookups_are_case_insensitive() {
        let store = InMemoryOrderStore::new();
        store.create("Zhang", "Headset", 1, 10.0).await.unwrap();
        store.create("Li", "Laptop", 1, 8000.0).await.unwrap();

        assert_eq!(store.by_customer("zhang").await.unwrap().len(), 1);
        assert_eq!(store.by_product("LAPTOP").await.unwrap().len(), 1);
        assert!(store.by_product("phone").await.unwrap().is_empty());
        assert_eq!(store.all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_recomputes_total() {
        let store = InMemoryOrderStore::new();
        let order = store.create("Zhang", "headset", 5, 299.0).await.unwrap();

        let updated = store
            .update(
                &order.order_id,
                OrderUpdate {
                    quantity: Some(2),
                    ..OrderUpdate::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.product_name, "headset");
        assert_eq!(updated.total_amount, 598.0);
        assert_eq!(updated.status, OrderStatus::Updated);
        assert!(updated.updated_at.is_some());

        let missing = store.update("nope", OrderUpdate::default()).await;
        assert!(matches!(missing, Err(AgentError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_and_latest() {
        let store = InMemoryOrderStore::new();
        assert_eq!(store.latest().await.unwrap(), None);

        let first = store.create("Zhang", "headset", 1, 10.0).await.unwrap();
        let _second = store.create("Li", "laptop", 1, 10.0).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let cancelled = store.cancel(&first.order_id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let change = OrderUpdate {
            quantity: Some(3),
            ..OrderUpdate::default()
        };
        assert!(matches!(
            store.update(&first.order_id, change).await,
            Err(AgentError::InvalidOrder(_))
        ));

        // cancelling touched the first order last
        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.order_id, first.order_id);

        assert!(matches!(
            store.cancel("nope").await,
            Err(AgentError::OrderNotFound(_))
        ));
    }
}
