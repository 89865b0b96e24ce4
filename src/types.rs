use crate::error::{Result, StoreError};
use crate::index::IndexDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A stored record: a JSON object that carries its own key under the collection's key path.
pub type Document = serde_json::Map<String, Value>;

/// Primary key of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Engine-assigned, auto-incrementing key.
    Id(u64),
    /// Caller-chosen string key (settings).
    Name(String),
}

impl Key {
    /// Byte form used inside the collection tree. Big-endian ids keep scans in key order.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Key::Id(id) => id.to_be_bytes().to_vec(),
            Key::Name(name) => name.as_bytes().to_vec(),
        }
    }

    pub fn from_bytes(auto_increment: bool, bytes: &[u8]) -> Result<Self> {
        if auto_increment {
            let raw: [u8; 8] = bytes
                .try_into()
                .map_err(|_| StoreError::InvalidKey(format!("{} byte id", bytes.len())))?;
            Ok(Key::Id(u64::from_be_bytes(raw)))
        } else {
            String::from_utf8(bytes.to_vec())
                .map(Key::Name)
                .map_err(|_| StoreError::InvalidKey("invalid UTF-8 in key".to_string()))
        }
    }

    pub fn as_id(&self) -> Option<u64> {
        match self {
            Key::Id(id) => Some(*id),
            Key::Name(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Key::Id(id) => Value::from(*id),
            Key::Name(name) => Value::String(name.clone()),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{}", id),
            Key::Name(name) => write!(f, "\"{}\"", name),
        }
    }
}

impl From<u64> for Key {
    fn from(v: u64) -> Self {
        Key::Id(v)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Name(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Name(v)
    }
}

/// The closed set of collections the store knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionId {
    Products,
    Users,
    Orders,
    Categories,
    Settings,
    Analytics,
}

const PRODUCT_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::new("name", "name", false),
    IndexDefinition::new("category", "category", false),
    IndexDefinition::new("status", "status", false),
    IndexDefinition::new("createdAt", "createdAt", false),
];

const USER_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::new("email", "email", true),
    IndexDefinition::new("role", "role", false),
    IndexDefinition::new("status", "status", false),
];

const ORDER_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::new("userId", "userId", false),
    IndexDefinition::new("status", "status", false),
    IndexDefinition::new("createdAt", "createdAt", false),
];

const CATEGORY_INDEXES: &[IndexDefinition] = &[IndexDefinition::new("name", "name", true)];

const NO_INDEXES: &[IndexDefinition] = &[];

const ANALYTICS_INDEXES: &[IndexDefinition] = &[
    IndexDefinition::new("date", "date", false),
    IndexDefinition::new("type", "type", false),
];

impl CollectionId {
    pub const ALL: [CollectionId; 6] = [
        CollectionId::Products,
        CollectionId::Users,
        CollectionId::Orders,
        CollectionId::Categories,
        CollectionId::Settings,
        CollectionId::Analytics,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CollectionId::Products => "products",
            CollectionId::Users => "users",
            CollectionId::Orders => "orders",
            CollectionId::Categories => "categories",
            CollectionId::Settings => "settings",
            CollectionId::Analytics => "analytics",
        }
    }

    pub fn schema(self) -> CollectionSchema {
        let (key_path, auto_increment, indexes) = match self {
            CollectionId::Products => ("id", true, PRODUCT_INDEXES),
            CollectionId::Users => ("id", true, USER_INDEXES),
            CollectionId::Orders => ("id", true, ORDER_INDEXES),
            CollectionId::Categories => ("id", true, CATEGORY_INDEXES),
            CollectionId::Settings => ("key", false, NO_INDEXES),
            CollectionId::Analytics => ("id", true, ANALYTICS_INDEXES),
        };
        CollectionSchema {
            id: self,
            key_path,
            auto_increment,
            indexes,
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CollectionId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        CollectionId::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| StoreError::UnknownCollection(s.to_string()))
    }
}

/// Keying strategy and declared indexes of one collection.
#[derive(Debug, Clone, Copy)]
pub struct CollectionSchema {
    pub id: CollectionId,
    pub key_path: &'static str,
    pub auto_increment: bool,
    pub indexes: &'static [IndexDefinition],
}

impl CollectionSchema {
    pub fn index(&self, name: &str) -> Result<&'static IndexDefinition> {
        self.indexes
            .iter()
            .find(|idx| idx.name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.id.name().to_string(),
                index: name.to_string(),
            })
    }

    /// Reads the record's own key, if it carries one.
    pub fn key_of(&self, doc: &Document) -> Result<Option<Key>> {
        match doc.get(self.key_path) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) if self.auto_increment => n
                .as_u64()
                .map(|id| Some(Key::Id(id)))
                .ok_or_else(|| self.bad_key(&n.to_string())),
            Some(Value::String(s)) if !self.auto_increment => Ok(Some(Key::Name(s.clone()))),
            Some(other) => Err(self.bad_key(&other.to_string())),
        }
    }

    pub fn check_key(&self, key: &Key) -> Result<()> {
        match (key, self.auto_increment) {
            (Key::Id(_), true) | (Key::Name(_), false) => Ok(()),
            _ => Err(self.bad_key(&key.to_string())),
        }
    }

    fn bad_key(&self, raw: &str) -> StoreError {
        let expected = if self.auto_increment {
            "a non-negative integer"
        } else {
            "a string"
        };
        StoreError::InvalidKey(format!(
            "{}.{} must be {}, got {}",
            self.id, self.key_path, expected, raw
        ))
    }
}

/// Configuration for the catalog store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    // Database location settings
    pub db_path: PathBuf,
    pub create_dirs: bool, // Create parent directories if they don't exist
    pub temporary: bool,   // Remove the database when the last handle drops

    // Engine settings
    pub cache_capacity_mb: usize,
    pub flush_every_ms: Option<u64>,
    pub mode: FlushMode,

    // Change feed
    pub change_buffer_size: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum FlushMode {
    HighThroughput,
    LowSpace,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("catalog.db"),
            create_dirs: true,
            temporary: false,

            cache_capacity_mb: 64,
            flush_every_ms: Some(500),
            mode: FlushMode::HighThroughput,

            change_buffer_size: 256,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with a specific database path
    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            db_path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// A throwaway database, removed once every handle is dropped.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            flush_every_ms: None,
            ..Self::default()
        }
    }
}
