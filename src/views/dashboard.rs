use crate::db::CatalogStore;
use crate::error::Result;
use crate::models::{Order, Product, User};

pub const LOW_STOCK_THRESHOLD: i64 = 10;
pub const RECENT_ORDER_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardStats {
    pub total_products: usize,
    pub total_users: usize,
    pub total_orders: usize,
    pub total_revenue: f64,
    /// Products with fewer than `LOW_STOCK_THRESHOLD` units left.
    pub low_stock: usize,
    /// Newest first; orders without a timestamp sort last.
    pub recent_orders: Vec<Order>,
}

impl DashboardStats {
    pub fn compute(products: &[Product], total_users: usize, orders: &[Order]) -> Self {
        let mut recent_orders = orders.to_vec();
        recent_orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent_orders.truncate(RECENT_ORDER_LIMIT);

        Self {
            total_products: products.len(),
            total_users,
            total_orders: orders.len(),
            total_revenue: orders.iter().map(|o| o.total).sum(),
            low_stock: products
                .iter()
                .filter(|p| p.stock < LOW_STOCK_THRESHOLD)
                .count(),
            recent_orders,
        }
    }

    /// Each collection is read separately, so the figures are not one snapshot.
    pub async fn load(store: &CatalogStore) -> Result<Self> {
        let products = store.repository::<Product>().all().await?;
        let total_users = store.repository::<User>().count().await?;
        let orders = store.repository::<Order>().all().await?;
        Ok(Self::compute(&products, total_users, &orders))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_dashboard_figures() {
        let products = vec![
            Product::new("A", "X", 1.0, 3),
            Product::new("B", "X", 1.0, 10),
            Product::new("C", "Y", 1.0, 0),
        ];

        let now = Utc::now();
        let orders: Vec<Order> = (0..7)
            .map(|i| {
                let mut order = Order::new(None, vec![]);
                order.id = Some(i);
                order.total = 10.0;
                order.created_at = Some(now - Duration::days(i as i64));
                order
            })
            .chain(std::iter::once({
                let mut undated = Order::new(None, vec![]);
                undated.id = Some(100);
                undated.total = 5.0;
                undated.created_at = None;
                undated
            }))
            .collect();

        let stats = DashboardStats::compute(&products, 4, &orders);
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_users, 4);
        assert_eq!(stats.total_orders, 8);
        assert_eq!(stats.total_revenue, 75.0);
        assert_eq!(stats.low_stock, 2);
        let ids: Vec<_> = stats.recent_orders.iter().map(|o| o.id.unwrap()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }
}
