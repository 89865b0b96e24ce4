use crate::error::{Result, StoreError};
use crate::index::IndexDefinition;
use crate::types::{CollectionSchema, Document, Key};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionalTree,
};
use sled::{IVec, Tree};

const RECORD_PREFIX: &[u8] = b"r/";
const SEQUENCE_KEY: &[u8] = b"m/seq";

/// One collection's tree: its records, index entries and key generator.
///
/// Every write runs as a single sled transaction so the record, its index entries and
/// the generator never disagree.
#[derive(Clone)]
pub struct CollectionTree {
    schema: CollectionSchema,
    tree: Tree,
}

type TxResult<T> = ConflictableTransactionResult<T, StoreError>;

fn abort<T>(err: StoreError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

fn record_key(key: &Key) -> Vec<u8> {
    let mut out = RECORD_PREFIX.to_vec();
    out.extend_from_slice(&key.to_bytes());
    out
}

fn flatten<T>(result: std::result::Result<T, TransactionError<StoreError>>) -> Result<T> {
    result.map_err(|e| match e {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Storage(err),
    })
}

impl CollectionTree {
    pub(crate) fn new(schema: CollectionSchema, tree: Tree) -> Self {
        Self { schema, tree }
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Inserts a new record. Returns the key and the document as stored.
    pub fn add(&self, doc: Document) -> Result<(Key, Document)> {
        let explicit = self.schema.key_of(&doc)?;

        flatten(self.tree.transaction(|tx| -> TxResult<(Key, Document)> {
            let key = match &explicit {
                Some(key) => {
                    if tx.get(record_key(key))?.is_some() {
                        return abort(self.violation(self.schema.key_path, key.to_string()));
                    }
                    self.advance_sequence(tx, key)?;
                    key.clone()
                }
                None => self.next_key(tx)?,
            };

            let mut stored = doc.clone();
            stored.insert(self.schema.key_path.to_string(), key.to_value());
            self.write_indexes(tx, &key, &stored)?;
            self.write_record(tx, &key, &stored)?;
            Ok((key, stored))
        }))
    }

    /// Full replace keyed by the record's own key. Returns the key, the stored document
    /// and the document it replaced, if any.
    pub fn put(&self, doc: Document) -> Result<(Key, Document, Option<Document>)> {
        let explicit = self.schema.key_of(&doc)?;
        if explicit.is_none() && !self.schema.auto_increment {
            return Err(StoreError::InvalidRecord(format!(
                "{} records need a '{}' field",
                self.schema.id, self.schema.key_path
            )));
        }

        flatten(self.tree.transaction(|tx| -> TxResult<(Key, Document, Option<Document>)> {
            let key = match &explicit {
                Some(key) => {
                    self.advance_sequence(tx, key)?;
                    key.clone()
                }
                None => self.next_key(tx)?,
            };

            let old = match tx.get(record_key(&key))? {
                Some(bytes) => {
                    let old = decode(&bytes).or_else(abort)?;
                    self.remove_indexes(tx, &key, &old)?;
                    Some(old)
                }
                None => None,
            };

            let mut stored = doc.clone();
            stored.insert(self.schema.key_path.to_string(), key.to_value());
            self.write_indexes(tx, &key, &stored)?;
            self.write_record(tx, &key, &stored)?;
            Ok((key, stored, old))
        }))
    }

    /// Removes a record; returns what was removed. Absent keys are fine.
    pub fn delete(&self, key: &Key) -> Result<Option<Document>> {
        self.schema.check_key(key)?;

        flatten(self.tree.transaction(|tx| -> TxResult<Option<Document>> {
            let Some(bytes) = tx.remove(record_key(key))? else {
                return Ok(None);
            };
            let old = decode(&bytes).or_else(abort)?;
            self.remove_indexes(tx, key, &old)?;
            Ok(Some(old))
        }))
    }

    pub fn get(&self, key: &Key) -> Result<Option<Document>> {
        self.schema.check_key(key)?;
        match self.tree.get(record_key(key))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Every record, in key order.
    pub fn scan(&self) -> Result<Vec<Document>> {
        self.tree
            .scan_prefix(RECORD_PREFIX)
            .map(|item| {
                let (_, bytes) = item?;
                decode(&bytes)
            })
            .collect()
    }

    pub fn count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.tree.scan_prefix(RECORD_PREFIX).keys() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.tree.scan_prefix(RECORD_PREFIX).next().transpose()?.is_none())
    }

    /// Records whose indexed field equals `encoded`.
    pub fn lookup(&self, index: &IndexDefinition, encoded: &[u8]) -> Result<Vec<Document>> {
        let keys: Vec<IVec> = if index.unique {
            self.tree.get(index.unique_key(encoded))?.into_iter().collect()
        } else {
            self.tree
                .scan_prefix(index.multi_prefix(encoded))
                .values()
                .collect::<std::result::Result<_, _>>()?
        };

        let mut docs = Vec::with_capacity(keys.len());
        for raw in keys {
            let key = Key::from_bytes(self.schema.auto_increment, &raw)?;
            // A delete can land between the index read and the record read.
            if let Some(doc) = self.get(&key)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Rebuilds the entries of one index from the stored records.
    pub(crate) fn backfill(&self, index: &IndexDefinition) -> Result<usize> {
        let mut written = 0;
        for doc in self.scan()? {
            let Some(key) = self.schema.key_of(&doc)? else {
                continue;
            };
            if let Some(encoded) = index.extract(&doc) {
                let key_bytes = key.to_bytes();
                if index.unique {
                    // An interrupted upgrade may already have written this record's entry.
                    if let Some(owner) = self.tree.get(index.unique_key(&encoded))? {
                        if owner.as_ref() == key_bytes.as_slice() {
                            continue;
                        }
                        return Err(self.violation(index.name, describe(&doc, index)));
                    }
                }
                self.tree.insert(index.entry_key(&encoded, &key), key_bytes)?;
                written += 1;
            }
        }
        Ok(written)
    }

    pub(crate) fn sequence(&self) -> Result<u64> {
        Ok(self.tree.get(SEQUENCE_KEY)?.map(|v| read_u64(&v)).unwrap_or(0))
    }

    fn next_key(&self, tx: &TransactionalTree) -> TxResult<Key> {
        let current = tx.get(SEQUENCE_KEY)?.map(|v| read_u64(&v)).unwrap_or(0);
        let Some(next) = current.checked_add(1) else {
            return abort(StoreError::InvalidKey(format!(
                "{} has no keys left after {}",
                self.schema.id, current
            )));
        };
        tx.insert(SEQUENCE_KEY, &next.to_be_bytes()[..])?;
        Ok(Key::Id(next))
    }

    /// Explicit ids push the generator forward so it never hands them out again.
    fn advance_sequence(&self, tx: &TransactionalTree, key: &Key) -> TxResult<()> {
        if let Key::Id(id) = key {
            let current = tx.get(SEQUENCE_KEY)?.map(|v| read_u64(&v)).unwrap_or(0);
            if *id > current {
                tx.insert(SEQUENCE_KEY, &id.to_be_bytes()[..])?;
            }
        }
        Ok(())
    }

    fn write_record(&self, tx: &TransactionalTree, key: &Key, doc: &Document) -> TxResult<()> {
        let bytes = serde_json::to_vec(doc)
            .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
        tx.insert(record_key(key), bytes)?;
        Ok(())
    }

    fn write_indexes(&self, tx: &TransactionalTree, key: &Key, doc: &Document) -> TxResult<()> {
        let key_bytes = key.to_bytes();
        for index in self.schema.indexes {
            let Some(encoded) = index.extract(doc) else {
                continue;
            };
            let entry = index.entry_key(&encoded, key);
            if index.unique {
                if let Some(owner) = tx.get(&entry)? {
                    if owner.as_ref() != key_bytes.as_slice() {
                        return abort(self.violation(index.name, describe(doc, index)));
                    }
                }
            }
            tx.insert(entry, key_bytes.clone())?;
        }
        Ok(())
    }

    fn remove_indexes(&self, tx: &TransactionalTree, key: &Key, doc: &Document) -> TxResult<()> {
        for index in self.schema.indexes {
            if let Some(encoded) = index.extract(doc) {
                tx.remove(index.entry_key(&encoded, key))?;
            }
        }
        Ok(())
    }

    fn violation(&self, index: &str, value: String) -> StoreError {
        StoreError::ConstraintViolation {
            collection: self.schema.id.name().to_string(),
            index: index.to_string(),
            value,
        }
    }
}

fn decode(bytes: &[u8]) -> Result<Document> {
    Ok(serde_json::from_slice(bytes)?)
}

fn describe(doc: &Document, index: &IndexDefinition) -> String {
    doc.get(index.field)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "null".to_string())
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    let len = bytes.len().min(8);
    raw[8 - len..].copy_from_slice(&bytes[bytes.len() - len..]);
    u64::from_be_bytes(raw)
}
