use crate::error::{Result, StoreError};
use crate::storage::CollectionTree;
use crate::types::{CollectionId, FlushMode, StoreConfig};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::HashMap;

/// Bumped whenever a collection or index is added to the schema.
pub const SCHEMA_VERSION: u32 = 1;

const MANIFEST_KEY: &[u8] = b"__schema";

/// What is persisted about the schema: the version and the indexes that exist on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaManifest {
    version: u32,
    collections: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    name: String,
    indexes: Vec<String>,
}

/// Outcome of opening the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub version: u32,
    /// Version found on disk when this open ran the upgrade; `None` if no upgrade ran.
    pub upgraded_from: Option<u32>,
}

pub struct Engine {
    db: Db,
    collections: HashMap<CollectionId, CollectionTree>,
    status: SchemaStatus,
}

impl Engine {
    /// Opens the database at the configured path, creating collections and indexes on
    /// first run or upgrade.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let db = open_db(config)?;

        let raw = db.get(MANIFEST_KEY)?;
        let manifest: SchemaManifest = match raw {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => SchemaManifest::default(),
        };

        if manifest.version > SCHEMA_VERSION {
            return Err(StoreError::SchemaVersion {
                found: manifest.version,
                supported: SCHEMA_VERSION,
            });
        }

        let mut collections = HashMap::with_capacity(CollectionId::ALL.len());
        for id in CollectionId::ALL {
            let tree = db.open_tree(id.name())?;
            collections.insert(id, CollectionTree::new(id.schema(), tree));
        }

        let upgraded_from = if manifest.version < SCHEMA_VERSION {
            upgrade(&db, &collections, &manifest, config)?;
            Some(manifest.version)
        } else {
            debug!("Schema at version {}, nothing to create", manifest.version);
            None
        };

        Ok(Self {
            db,
            collections,
            status: SchemaStatus {
                version: SCHEMA_VERSION,
                upgraded_from,
            },
        })
    }

    pub fn status(&self) -> SchemaStatus {
        self.status
    }

    pub fn collection(&self, id: CollectionId) -> Result<&CollectionTree> {
        self.collections
            .get(&id)
            .ok_or_else(|| StoreError::UnknownCollection(id.name().to_string()))
    }

    pub fn flush(&self) -> Result<usize> {
        Ok(self.db.flush()?)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            warn!("Error flushing catalog store: {}", e);
        }
    }
}

fn open_db(config: &StoreConfig) -> Result<Db> {
    let path = config.db_path.display().to_string();
    let unavailable = |reason: String| StoreError::StorageUnavailable {
        path: path.clone(),
        reason,
    };

    if config.create_dirs && !config.temporary {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
            }
        }
    }

    let mode = match config.mode {
        FlushMode::HighThroughput => sled::Mode::HighThroughput,
        FlushMode::LowSpace => sled::Mode::LowSpace,
    };

    let mut sled_config = sled::Config::new()
        .cache_capacity((config.cache_capacity_mb * 1024 * 1024) as u64)
        .flush_every_ms(config.flush_every_ms)
        .mode(mode);

    sled_config = if config.temporary {
        sled_config.temporary(true)
    } else {
        sled_config.path(&config.db_path)
    };

    let db = sled_config.open().map_err(|e| unavailable(e.to_string()))?;
    info!("Catalog store opened at '{}'", path);
    Ok(db)
}

/// Creates what the stored manifest lacks. Trees already exist at this point; new
/// indexes get back-filled from records written under an older schema.
fn upgrade(
    db: &Db,
    collections: &HashMap<CollectionId, CollectionTree>,
    manifest: &SchemaManifest,
    config: &StoreConfig,
) -> Result<()> {
    info!(
        "Upgrading catalog schema from version {} to {}",
        manifest.version, SCHEMA_VERSION
    );

    let mut next = SchemaManifest {
        version: SCHEMA_VERSION,
        collections: Vec::with_capacity(collections.len()),
    };

    for id in CollectionId::ALL {
        let known: &[String] = manifest
            .collections
            .iter()
            .find(|entry| entry.name == id.name())
            .map(|entry| entry.indexes.as_slice())
            .unwrap_or(&[]);

        let tree = &collections[&id];
        for index in tree.schema().indexes {
            if known.iter().any(|name| name == index.name) {
                continue;
            }
            // Records that break a new unique index leave the database unusable at this
            // version; that is not a write the caller can fix.
            let written = tree.backfill(index).map_err(|e| match e {
                StoreError::ConstraintViolation { .. } => StoreError::StorageUnavailable {
                    path: config.db_path.display().to_string(),
                    reason: format!("cannot build index {}.{}: {}", id, index.name, e),
                },
                other => other,
            })?;
            debug!(
                "Created index {}.{} (unique: {}, {} entries)",
                id, index.name, index.unique, written
            );
        }

        next.collections.push(ManifestEntry {
            name: id.name().to_string(),
            indexes: tree
                .schema()
                .indexes
                .iter()
                .map(|idx| idx.name.to_string())
                .collect(),
        });
    }

    db.insert(MANIFEST_KEY, bincode::serialize(&next)?)?;
    db.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: serde_json::Value) -> crate::types::Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_open_creates_schema() {
        let engine = Engine::open(&StoreConfig::temporary()).unwrap();
        assert_eq!(
            engine.status(),
            SchemaStatus {
                version: SCHEMA_VERSION,
                upgraded_from: Some(0)
            }
        );
        for id in CollectionId::ALL {
            assert!(engine.collection(id).unwrap().is_empty().unwrap());
        }
    }

    #[test]
    fn test_reopen_skips_upgrade() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("catalog.db"));

        {
            let engine = Engine::open(&config).unwrap();
            let products = engine.collection(CollectionId::Products).unwrap();
            products
                .add(doc(json!({"name": "Lamp", "category": "Home"})))
                .unwrap();
        }

        let engine = Engine::open(&config).unwrap();
        assert_eq!(engine.status().upgraded_from, None);
        let products = engine.collection(CollectionId::Products).unwrap();
        assert_eq!(products.count().unwrap(), 1);
        assert_eq!(products.sequence().unwrap(), 1);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("catalog.db"));

        {
            let db = sled::open(&config.db_path).unwrap();
            let manifest = SchemaManifest {
                version: SCHEMA_VERSION + 1,
                collections: vec![],
            };
            db.insert(MANIFEST_KEY, bincode::serialize(&manifest).unwrap())
                .unwrap();
            db.flush().unwrap();
        }

        assert!(matches!(
            Engine::open(&config),
            Err(StoreError::SchemaVersion { found, .. }) if found == SCHEMA_VERSION + 1
        ));
    }

    #[test]
    fn test_upgrade_backfills_missing_index() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("catalog.db"));

        // A database written before the products.category index existed.
        {
            let db = sled::open(&config.db_path).unwrap();
            let tree = db.open_tree("products").unwrap();
            let record = serde_json::to_vec(&json!({"id": 1, "name": "Desk", "category": "Office"}))
                .unwrap();
            let mut key = b"r/".to_vec();
            key.extend_from_slice(&1u64.to_be_bytes());
            tree.insert(key, record).unwrap();
            let manifest = SchemaManifest {
                version: 0,
                collections: vec![ManifestEntry {
                    name: "products".into(),
                    indexes: vec!["name".into()],
                }],
            };
            db.insert(MANIFEST_KEY, bincode::serialize(&manifest).unwrap())
                .unwrap();
            db.flush().unwrap();
        }

        let engine = Engine::open(&config).unwrap();
        let products = engine.collection(CollectionId::Products).unwrap();
        let index = products.schema().index("category").unwrap();
        let encoded = crate::index::encode_value(&json!("Office")).unwrap();
        let found = products.lookup(index, &encoded).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], json!("Desk"));
    }

    /// Writes user records straight into a version 0 database with no manifest.
    fn write_v0_users(config: &StoreConfig, users: &[(u64, &str)], email_entries: &[(u64, &str)]) {
        let db = sled::open(&config.db_path).unwrap();
        let tree = db.open_tree("users").unwrap();
        for (id, email) in users {
            let record = serde_json::to_vec(&json!({"id": id, "email": email})).unwrap();
            let mut key = b"r/".to_vec();
            key.extend_from_slice(&id.to_be_bytes());
            tree.insert(key, record).unwrap();
        }
        for (id, email) in email_entries {
            let mut entry = b"u/email/s".to_vec();
            entry.extend_from_slice(email.as_bytes());
            tree.insert(entry, &id.to_be_bytes()[..]).unwrap();
        }
        db.flush().unwrap();
    }

    #[test]
    fn test_interrupted_backfill_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("catalog.db"));

        // The previous upgrade wrote the email entry but died before the manifest.
        write_v0_users(&config, &[(1, "a@x.com")], &[(1, "a@x.com")]);

        let engine = Engine::open(&config).unwrap();
        assert_eq!(engine.status().upgraded_from, Some(0));

        let users = engine.collection(CollectionId::Users).unwrap();
        let index = users.schema().index("email").unwrap();
        let encoded = crate::index::encode_value(&json!("a@x.com")).unwrap();
        assert_eq!(users.lookup(index, &encoded).unwrap().len(), 1);
        drop(engine);

        let engine = Engine::open(&config).unwrap();
        assert_eq!(engine.status().upgraded_from, None);
    }

    #[test]
    fn test_backfill_conflict_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::with_path(dir.path().join("catalog.db"));
        write_v0_users(&config, &[(1, "a@x.com"), (2, "a@x.com")], &[]);

        let err = Engine::open(&config).err().unwrap();
        assert!(matches!(err, StoreError::StorageUnavailable { .. }));
        assert_eq!(err.notice(), crate::error::Notice::DataUnavailable);
    }

    #[test]
    fn test_unopenable_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut config = StoreConfig::with_path(blocker.join("catalog.db"));
        config.create_dirs = false;
        assert!(matches!(
            Engine::open(&config),
            Err(StoreError::StorageUnavailable { .. })
        ));
    }
}
