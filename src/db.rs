use crate::error::{Result, StoreError};
use crate::index::encode_value;
use crate::pubsub::{ChangeEvent, ChangeFeed, ChangeListener};
use crate::query::{ContainsTerm, Queryable};
use crate::repository::{Entity, Repository};
use crate::storage::{CollectionTree, Engine, SchemaStatus};
use crate::types::{CollectionId, Document, Key, StoreConfig};
use log::debug;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Handle to the catalog store.
///
/// Built once by the application and cloned into every consumer; clones share the same
/// engine and change feed. The engine is opened by the first `initialize` (explicit or
/// implied by any other operation) and concurrent openers wait on that single attempt.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<Inner>,
}

struct Inner {
    config: StoreConfig,
    engine: OnceCell<Arc<Engine>>,
    feed: ChangeFeed,
}

/// Runs engine work on the blocking pool so every call yields to the runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

impl CatalogStore {
    pub fn new(config: StoreConfig) -> Self {
        let feed = ChangeFeed::new(config.change_buffer_size);
        Self {
            inner: Arc::new(Inner {
                config,
                engine: OnceCell::new(),
                feed,
            }),
        }
    }

    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self::new(StoreConfig::with_path(path))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.engine.initialized()
    }

    /// Opens the database, creating collections and indexes on first run. Later calls
    /// return the status of the first successful open; a failed open is retried by the
    /// next caller.
    pub async fn initialize(&self) -> Result<SchemaStatus> {
        Ok(self.engine().await?.status())
    }

    async fn engine(&self) -> Result<Arc<Engine>> {
        let engine = self
            .inner
            .engine
            .get_or_try_init(|| async {
                let config = self.inner.config.clone();
                let engine = blocking(move || Engine::open(&config)).await?;
                Ok::<_, StoreError>(Arc::new(engine))
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    async fn tree(&self, collection: CollectionId) -> Result<CollectionTree> {
        Ok(self.engine().await?.collection(collection)?.clone())
    }

    /// Inserts a record and returns its key.
    pub async fn add(&self, collection: CollectionId, record: Document) -> Result<Key> {
        let tree = self.tree(collection).await?;
        let (key, stored) = blocking(move || tree.add(record)).await?;
        debug!("Added {} {}", collection, key);

        self.inner
            .feed
            .publish(ChangeEvent::insert(collection, key.clone(), stored));
        Ok(key)
    }

    pub async fn get(&self, collection: CollectionId, key: impl Into<Key>) -> Result<Option<Document>> {
        let tree = self.tree(collection).await?;
        let key = key.into();
        blocking(move || tree.get(&key)).await
    }

    pub async fn get_all(&self, collection: CollectionId) -> Result<Vec<Document>> {
        let tree = self.tree(collection).await?;
        blocking(move || tree.scan()).await
    }

    pub async fn count(&self, collection: CollectionId) -> Result<usize> {
        let tree = self.tree(collection).await?;
        blocking(move || tree.count()).await
    }

    /// All records whose `index` field equals `value`. Values that can never be indexed
    /// (null, booleans, objects) match nothing.
    pub async fn get_by_index(
        &self,
        collection: CollectionId,
        index: &str,
        value: impl Into<Value>,
    ) -> Result<Vec<Document>> {
        let tree = self.tree(collection).await?;
        let index = tree.schema().index(index)?;
        let Some(encoded) = encode_value(&value.into()) else {
            return Ok(Vec::new());
        };
        blocking(move || tree.lookup(index, &encoded)).await
    }

    /// Upsert: creates the record when its key is absent, replaces it wholesale otherwise.
    pub async fn update(&self, collection: CollectionId, record: Document) -> Result<Key> {
        let tree = self.tree(collection).await?;
        let (key, stored, old) = blocking(move || tree.put(record)).await?;
        debug!("Stored {} {} (replaced: {})", collection, key, old.is_some());

        self.inner
            .feed
            .publish(ChangeEvent::update(collection, key.clone(), old, stored));
        Ok(key)
    }

    /// Removes the record if present. Deleting an absent key succeeds.
    pub async fn delete(&self, collection: CollectionId, key: impl Into<Key>) -> Result<()> {
        let tree = self.tree(collection).await?;
        let key = key.into();
        let removed = {
            let key = key.clone();
            blocking(move || tree.delete(&key)).await?
        };

        if let Some(old) = removed {
            debug!("Deleted {} {}", collection, key);
            self.inner
                .feed
                .publish(ChangeEvent::delete(collection, key, old));
        }
        Ok(())
    }

    /// Records matching `query` at the time of the scan. Not atomic with concurrent
    /// writers.
    pub async fn filter<Q>(&self, collection: CollectionId, query: Q) -> Result<Vec<Document>>
    where
        Q: Queryable,
    {
        let mut all = self.get_all(collection).await?;
        all.retain(|doc| query.matches(doc));
        Ok(all)
    }

    /// Case-insensitive substring search on `field`.
    pub async fn search(
        &self,
        collection: CollectionId,
        term: &str,
        field: &str,
    ) -> Result<Vec<Document>> {
        self.filter(collection, ContainsTerm::new(field, term)).await
    }

    /// `search` on the `name` field.
    pub async fn search_by_name(&self, collection: CollectionId, term: &str) -> Result<Vec<Document>> {
        self.search(collection, term, "name").await
    }

    pub fn watch(&self, collection: CollectionId) -> ChangeListener {
        self.inner.feed.listen(collection)
    }

    pub fn watch_all(&self) -> ChangeListener {
        self.inner.feed.listen_all()
    }

    pub fn repository<T: Entity>(&self) -> Repository<T> {
        Repository::new(self.clone())
    }

    /// Forces buffered writes to disk. Returns the number of bytes flushed.
    pub async fn flush(&self) -> Result<usize> {
        let engine = self.engine().await?;
        blocking(move || engine.flush()).await
    }
}
