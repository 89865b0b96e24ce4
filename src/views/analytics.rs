use crate::db::CatalogStore;
use crate::error::Result;
use crate::models::{Order, OrderStatus, Product};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

pub const TOP_PRODUCT_LIMIT: usize = 5;
pub const REVENUE_MONTHS: u32 = 6;

/// How far back the range-bound figures look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    Week,
    #[default]
    Month,
    Quarter,
    Year,
}

impl TimeRange {
    pub fn days(self) -> i64 {
        match self {
            TimeRange::Week => 7,
            TimeRange::Month => 30,
            TimeRange::Quarter => 90,
            TimeRange::Year => 365,
        }
    }

    pub fn cutoff(self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.days())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopProduct {
    pub product_id: u64,
    /// `"Unknown"` when the product has been deleted since the order.
    pub name: String,
    pub quantity: u64,
    /// Quantity times the product's current price.
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub month: u32,
    /// Short month name, e.g. "Mar".
    pub label: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsReport {
    /// Orders placed within the range.
    pub sales: Vec<Order>,
    pub top_products: Vec<TopProduct>,
    /// Product count per category, over all products.
    pub category_breakdown: BTreeMap<String, usize>,
    /// Every status is present, zero when no order in range has it.
    pub orders_by_status: BTreeMap<OrderStatus, usize>,
    pub total_revenue: f64,
    pub average_order_value: f64,
    /// Oldest month first; covers all orders regardless of range.
    pub revenue_by_month: Vec<MonthlyRevenue>,
}

impl AnalyticsReport {
    pub fn compute(
        products: &[Product],
        orders: &[Order],
        range: TimeRange,
        now: DateTime<Utc>,
    ) -> Self {
        let cutoff = range.cutoff(now);
        // Orders without a timestamp never fall inside a range.
        let sales: Vec<Order> = orders
            .iter()
            .filter(|o| o.created_at.is_some_and(|at| at >= cutoff))
            .cloned()
            .collect();

        let total_revenue: f64 = sales.iter().map(|o| o.total).sum();
        let average_order_value = if sales.is_empty() {
            0.0
        } else {
            total_revenue / sales.len() as f64
        };

        let mut orders_by_status: BTreeMap<OrderStatus, usize> =
            OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for order in &sales {
            *orders_by_status.entry(order.status).or_default() += 1;
        }

        Self {
            top_products: top_products(products, &sales),
            category_breakdown: category_breakdown(products),
            orders_by_status,
            total_revenue,
            average_order_value,
            revenue_by_month: revenue_by_month(orders, now),
            sales,
        }
    }

    pub async fn load(store: &CatalogStore, range: TimeRange, now: DateTime<Utc>) -> Result<Self> {
        let products = store.repository::<Product>().all().await?;
        let orders = store.repository::<Order>().all().await?;
        Ok(Self::compute(&products, &orders, range, now))
    }
}

fn top_products(products: &[Product], sales: &[Order]) -> Vec<TopProduct> {
    let mut sold: HashMap<u64, u64> = HashMap::new();
    for item in sales.iter().flat_map(|o| &o.items) {
        *sold.entry(item.product_id).or_default() += u64::from(item.quantity);
    }

    let mut ranked: Vec<(u64, u64)> = sold.into_iter().collect();
    // Ties go to the lower product id so the ranking is stable.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(TOP_PRODUCT_LIMIT);

    ranked
        .into_iter()
        .map(|(product_id, quantity)| {
            let product = products.iter().find(|p| p.id == Some(product_id));
            TopProduct {
                product_id,
                name: product
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                quantity,
                revenue: quantity as f64 * product.map(|p| p.price).unwrap_or(0.0),
            }
        })
        .collect()
}

fn category_breakdown(products: &[Product]) -> BTreeMap<String, usize> {
    let mut breakdown = BTreeMap::new();
    for product in products {
        let category = if product.category.is_empty() {
            "Uncategorized".to_string()
        } else {
            product.category.clone()
        };
        *breakdown.entry(category).or_default() += 1;
    }
    breakdown
}

/// `months_back` calendar months before the month of `date`.
fn shift_month(year: i32, month: u32, months_back: u32) -> (i32, u32) {
    let index = year * 12 + month as i32 - 1 - months_back as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

fn revenue_by_month(orders: &[Order], now: DateTime<Utc>) -> Vec<MonthlyRevenue> {
    (0..REVENUE_MONTHS)
        .rev()
        .map(|back| {
            let (year, month) = shift_month(now.year(), now.month(), back);
            let revenue = orders
                .iter()
                .filter(|o| {
                    o.created_at
                        .is_some_and(|at| at.year() == year && at.month() == month)
                })
                .map(|o| o.total)
                .sum();
            let label = NaiveDate::from_ymd_opt(year, month, 1)
                .map(|d| d.format("%b").to_string())
                .unwrap_or_default();
            MonthlyRevenue {
                year,
                month,
                label,
                revenue,
            }
        })
        .collect()
}
