use crate::db::CatalogStore;
use crate::error::{Result, StoreError};
use crate::types::{CollectionId, Document, Key};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// A record type bound to exactly one collection.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    const COLLECTION: CollectionId;

    /// The record's own key, if it has one yet.
    fn key(&self) -> Option<Key>;
}

pub fn to_document<T: Serialize>(record: &T) -> Result<Document> {
    match serde_json::to_value(record)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::InvalidRecord(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> Result<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Typed view over one collection. Cheap to create; holds a store handle.
pub struct Repository<T: Entity> {
    store: CatalogStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self::new(self.store.clone())
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: CatalogStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub async fn add(&self, record: &T) -> Result<Key> {
        self.store.add(T::COLLECTION, to_document(record)?).await
    }

    pub async fn get(&self, key: impl Into<Key>) -> Result<Option<T>> {
        self.store
            .get(T::COLLECTION, key)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn all(&self) -> Result<Vec<T>> {
        decode_all(self.store.get_all(T::COLLECTION).await?)
    }

    pub async fn by_index(&self, index: &str, value: impl Into<Value>) -> Result<Vec<T>> {
        decode_all(self.store.get_by_index(T::COLLECTION, index, value).await?)
    }

    /// Upsert by the record's key; records without a key get a new one.
    pub async fn put(&self, record: &T) -> Result<Key> {
        self.store.update(T::COLLECTION, to_document(record)?).await
    }

    pub async fn delete(&self, key: impl Into<Key>) -> Result<()> {
        self.store.delete(T::COLLECTION, key).await
    }

    /// Deletes the stored copy of `record`; a record that was never stored is a no-op.
    pub async fn delete_record(&self, record: &T) -> Result<()> {
        match record.key() {
            Some(key) => self.delete(key).await,
            None => Ok(()),
        }
    }

    pub async fn search(&self, term: &str, field: &str) -> Result<Vec<T>> {
        decode_all(self.store.search(T::COLLECTION, term, field).await?)
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count(T::COLLECTION).await
    }
}

fn decode_all<T: DeserializeOwned>(docs: Vec<Document>) -> Result<Vec<T>> {
    docs.into_iter().map(from_document).collect()
}
