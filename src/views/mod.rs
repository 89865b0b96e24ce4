//! Read models built on full-collection scans. None of them write to the store.

pub mod analytics;
pub mod dashboard;
pub mod storefront;

pub use analytics::{AnalyticsReport, MonthlyRevenue, TimeRange, TopProduct};
pub use dashboard::DashboardStats;
