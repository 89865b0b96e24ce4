use crate::types::{Document, Key};
use serde_json::Value;

/// A declared secondary index over one field of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDefinition {
    pub name: &'static str,
    pub field: &'static str,
    pub unique: bool,
}

pub(crate) const UNIQUE_PREFIX: &[u8] = b"u/";
pub(crate) const MULTI_PREFIX: &[u8] = b"x/";

impl IndexDefinition {
    pub const fn new(name: &'static str, field: &'static str, unique: bool) -> Self {
        Self {
            name,
            field,
            unique,
        }
    }

    /// Encoded index value of `doc`, or `None` when the field holds nothing indexable.
    pub fn extract(&self, doc: &Document) -> Option<Vec<u8>> {
        doc.get(self.field).and_then(encode_value)
    }

    /// Tree key under which `doc` is recorded in this index.
    pub(crate) fn entry_key(&self, encoded: &[u8], key: &Key) -> Vec<u8> {
        if self.unique {
            self.unique_key(encoded)
        } else {
            let mut entry = self.multi_prefix(encoded);
            entry.extend_from_slice(&key.to_bytes());
            entry
        }
    }

    pub(crate) fn unique_key(&self, encoded: &[u8]) -> Vec<u8> {
        let mut entry = self.namespace(UNIQUE_PREFIX);
        entry.extend_from_slice(encoded);
        entry
    }

    /// Every entry sharing one value lives under this prefix. The length prefix stops
    /// `5` from matching the entries of `55`.
    pub(crate) fn multi_prefix(&self, encoded: &[u8]) -> Vec<u8> {
        let mut entry = self.namespace(MULTI_PREFIX);
        entry.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
        entry.extend_from_slice(encoded);
        entry
    }

    fn namespace(&self, kind: &[u8]) -> Vec<u8> {
        let mut ns = Vec::with_capacity(kind.len() + self.name.len() + 1);
        ns.extend_from_slice(kind);
        ns.extend_from_slice(self.name.as_bytes());
        ns.push(b'/');
        ns
    }
}

/// Encodes a JSON value as an index key. Only strings, numbers and arrays of those are
/// valid index values; everything else keeps the record out of the index.
pub fn encode_value(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Number(n) => {
            let f = n.as_f64()?;
            // -0.0 and 0.0 compare equal, so they must encode equally
            let f = if f == 0.0 { 0.0 } else { f };
            let mut out = vec![b'n'];
            out.extend_from_slice(&f.to_bits().to_be_bytes());
            Some(out)
        }
        Value::String(s) => {
            let mut out = Vec::with_capacity(s.len() + 1);
            out.push(b's');
            out.extend_from_slice(s.as_bytes());
            Some(out)
        }
        Value::Array(items) => {
            let mut out = vec![b'a'];
            for item in items {
                let encoded = encode_value(item)?;
                out.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
                out.extend_from_slice(&encoded);
            }
            Some(out)
        }
        Value::Null | Value::Bool(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_normalize() {
        assert_eq!(encode_value(&json!(5)), encode_value(&json!(5.0)));
        assert_eq!(encode_value(&json!(0.0)), encode_value(&json!(-0.0)));
        assert_ne!(encode_value(&json!(5)), encode_value(&json!("5")));
    }

    #[test]
    fn test_unindexable_values() {
        assert!(encode_value(&json!(null)).is_none());
        assert!(encode_value(&json!(true)).is_none());
        assert!(encode_value(&json!({"a": 1})).is_none());
        assert!(encode_value(&json!(["a", null])).is_none());
        assert!(encode_value(&json!(["a", 1])).is_some());
    }

    #[test]
    fn test_multi_prefix_is_unambiguous() {
        let idx = IndexDefinition::new("stock", "stock", false);
        let five = idx.multi_prefix(&encode_value(&json!("5")).unwrap());
        let fifty_five = idx.entry_key(&encode_value(&json!("55")).unwrap(), &Key::Id(1));
        assert!(!fifty_five.starts_with(&five));

        let entry = idx.entry_key(&encode_value(&json!("5")).unwrap(), &Key::Id(9));
        assert!(entry.starts_with(&five));
    }

    #[test]
    fn test_extract_missing_field() {
        let idx = IndexDefinition::new("category", "category", false);
        let doc = json!({"name": "Lamp"});
        assert!(idx.extract(doc.as_object().unwrap()).is_none());
        let doc = json!({"category": "Home & Garden"});
        assert!(idx.extract(doc.as_object().unwrap()).is_some());
    }
}
