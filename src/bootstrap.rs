use crate::auth::{DEFAULT_ROUNDS, hash_in_background};
use crate::db::CatalogStore;
use crate::error::{Result, StoreError};
use crate::models::{Category, Product, Role, Setting, User, UserStatus};
use crate::repository::{Entity, to_document};
use crate::saga::{Saga, StepReport};
use crate::types::CollectionId;
use chrono::Utc;
use log::{info, warn};
use serde_json::json;

pub const ADMIN_EMAIL: &str = "admin@ecommerce.com";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Collections emptied by `clear_database`. Categories and settings survive a clear.
pub const CLEARED_COLLECTIONS: [CollectionId; 4] = [
    CollectionId::Products,
    CollectionId::Users,
    CollectionId::Orders,
    CollectionId::Analytics,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Products already existed; nothing was written.
    AlreadySeeded,
    Seeded(Vec<StepReport>),
}

fn seed_categories() -> Vec<Category> {
    vec![
        Category::new("Electronics", "Electronic devices and accessories"),
        Category::new("Clothing", "Fashion and apparel"),
        Category::new("Home & Garden", "Home improvement and garden supplies"),
        Category::new("Books", "Books and publications"),
        Category::new("Sports", "Sports equipment and accessories"),
    ]
}

fn seed_products() -> Vec<Product> {
    vec![
        Product::new("Wireless Headphones", "Electronics", 299.99, 50)
            .with_description("Premium noise-cancelling wireless headphones")
            .with_image("https://via.placeholder.com/300x300?text=Headphones"),
        Product::new("Smart Watch", "Electronics", 199.99, 30)
            .with_description("Fitness tracking smartwatch with heart rate monitor")
            .with_image("https://via.placeholder.com/300x300?text=Smart+Watch"),
        Product::new("Running Shoes", "Sports", 89.99, 100)
            .with_description("Comfortable running shoes for all terrains")
            .with_image("https://via.placeholder.com/300x300?text=Running+Shoes"),
    ]
}

fn seed_settings() -> Vec<Setting> {
    vec![
        Setting::new("site_name", "My E-Commerce Store"),
        Setting::new("currency", "USD"),
        Setting::new("tax_rate", json!(10)),
    ]
}

impl CatalogStore {
    /// First-run bootstrap: categories, products, the admin account and baseline
    /// settings. Does nothing when any product exists.
    ///
    /// Records that collide with an existing unique value are skipped, so rerunning after
    /// a partial failure fills in the rest. Existing settings are never overwritten.
    pub async fn seed_initial_data(&self) -> Result<SeedOutcome> {
        if self.count(CollectionId::Products).await? > 0 {
            return Ok(SeedOutcome::AlreadySeeded);
        }

        let mut saga = Saga::new("seed initial data");
        saga.step("categories", self.insert_missing(seed_categories()))
            .await?;
        saga.step("products", self.insert_missing(seed_products()))
            .await?;
        saga.step("admin user", async {
            let admin = User {
                id: None,
                name: "Admin User".to_string(),
                email: ADMIN_EMAIL.to_string(),
                password_hash: hash_in_background(ADMIN_PASSWORD.to_string(), DEFAULT_ROUNDS)
                    .await
                    .map_err(|e| StoreError::InvalidRecord(e.to_string()))?,
                role: Role::Admin,
                status: UserStatus::Active,
                created_at: Some(Utc::now()),
            };
            self.insert_missing(vec![admin]).await
        })
        .await?;
        saga.step("settings", self.insert_missing(seed_settings()))
            .await?;

        let report = saga.finish();
        info!("Initial data seeded: {:?}", report);
        Ok(SeedOutcome::Seeded(report))
    }

    /// Adds each record, skipping those that already exist. Returns how many were added.
    async fn insert_missing<T: Entity>(&self, records: Vec<T>) -> Result<usize> {
        let mut added = 0;
        for record in &records {
            match self.add(T::COLLECTION, to_document(record)?).await {
                Ok(_) => added += 1,
                Err(e) if e.is_constraint_violation() => {
                    warn!("Seed record already present in {}: {}", T::COLLECTION, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(added)
    }

    /// Deletes every product, user, order and analytics record, one collection at a
    /// time. A failure stops the sequence; collections already cleared stay cleared.
    pub async fn clear_database(&self) -> Result<Vec<StepReport>> {
        let mut saga = Saga::new("clear database");
        for collection in CLEARED_COLLECTIONS {
            saga.step(collection.name(), self.clear_collection(collection))
                .await?;
        }
        let report = saga.finish();
        info!("Database cleared: {:?}", report);
        Ok(report)
    }

    async fn clear_collection(&self, collection: CollectionId) -> Result<usize> {
        let schema = collection.schema();
        let mut removed = 0;
        for doc in self.get_all(collection).await? {
            if let Some(key) = schema.key_of(&doc)? {
                self.delete(collection, key).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
