use anyhow::Context;
use catalog_store::views::{AnalyticsReport, DashboardStats, TimeRange};
use catalog_store::{CatalogStore, SeedOutcome};
use chrono::Utc;
use log::info;

const DEFAULT_DB_PATH: &str = "catalog_data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
    let store = CatalogStore::open(&db_path);

    let status = store
        .initialize()
        .await
        .with_context(|| format!("opening catalog at '{}'", db_path))?;
    match status.upgraded_from {
        Some(from) => info!("Catalog at '{}' upgraded from schema v{} to v{}", db_path, from, status.version),
        None => info!("Catalog at '{}' opened at schema v{}", db_path, status.version),
    }

    match store.seed_initial_data().await? {
        SeedOutcome::AlreadySeeded => info!("Catalog already holds products; seeding skipped"),
        SeedOutcome::Seeded(steps) => {
            for step in steps {
                info!("Seeded {}: {} record(s)", step.step, step.affected);
            }
        }
    }

    let stats = DashboardStats::load(&store).await?;
    println!("Products:      {}", stats.total_products);
    println!("Users:         {}", stats.total_users);
    println!("Orders:        {}", stats.total_orders);
    println!("Revenue:       {:.2}", stats.total_revenue);
    println!("Low stock:     {}", stats.low_stock);

    let report = AnalyticsReport::load(&store, TimeRange::Month, Utc::now()).await?;
    println!("30 day sales:  {} order(s), avg {:.2}", report.sales.len(), report.average_order_value);
    for (category, count) in &report.category_breakdown {
        println!("  {:<12} {}", category, count);
    }

    store.flush().await?;
    Ok(())
}
