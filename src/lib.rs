pub mod auth;
pub mod bootstrap;
pub mod db;
pub mod error;
pub mod index;
pub mod models;
pub mod pubsub;
pub mod query;
pub mod repository;
pub mod saga;
pub mod settings;
pub mod storage;
pub mod types;
pub mod views;

pub use auth::{Account, AuthError, Authenticator, NewAccount, Session};
pub use bootstrap::SeedOutcome;
pub use db::CatalogStore;
pub use error::{Notice, Result, StoreError};
pub use pubsub::{ChangeEvent, ChangeListener, ChangeType, EventFilter};
pub use query::{ContainsTerm, Queryable};
pub use repository::{Entity, Repository};
pub use settings::StoreSettings;
pub use storage::SchemaStatus;
pub use types::{CollectionId, Document, FlushMode, Key, StoreConfig};
