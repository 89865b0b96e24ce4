use crate::types::{CollectionId, Document, Key};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of change that occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// New record inserted
    Insert,
    /// Record written by upsert (created or replaced)
    Update,
    /// Record deleted
    Delete,
}

/// A committed write, as seen by consumers that keep their own view in sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: CollectionId,
    pub change_type: ChangeType,
    pub key: Key,
    /// Record after the write (None for Delete)
    pub document: Option<Document>,
    /// Record before the write (Update and Delete, when one existed)
    pub old_document: Option<Document>,
}

impl ChangeEvent {
    pub fn insert(collection: CollectionId, key: Key, document: Document) -> Self {
        Self {
            collection,
            change_type: ChangeType::Insert,
            key,
            document: Some(document),
            old_document: None,
        }
    }

    pub fn update(
        collection: CollectionId,
        key: Key,
        old_document: Option<Document>,
        new_document: Document,
    ) -> Self {
        Self {
            collection,
            change_type: ChangeType::Update,
            key,
            document: Some(new_document),
            old_document,
        }
    }

    pub fn delete(collection: CollectionId, key: Key, old_document: Document) -> Self {
        Self {
            collection,
            change_type: ChangeType::Delete,
            key,
            document: None,
            old_document: Some(old_document),
        }
    }

    /// Get a field value from the current record
    pub fn get_field(&self, field: &str) -> Option<&Value> {
        self.document.as_ref()?.get(field)
    }

    /// Get a field value from the previous record
    pub fn get_old_field(&self, field: &str) -> Option<&Value> {
        self.old_document.as_ref()?.get(field)
    }

    /// Whether an update changed `field`. Fields dropped by the replace count as changed.
    pub fn field_changed(&self, field: &str) -> bool {
        if self.change_type != ChangeType::Update {
            return false;
        }
        self.get_old_field(field) != self.get_field(field)
    }

    /// Fields that differ between the old and new record of an update.
    pub fn changed_fields(&self) -> Vec<String> {
        let (Some(old_doc), Some(new_doc)) = (&self.old_document, &self.document) else {
            return vec![];
        };
        if self.change_type != ChangeType::Update {
            return vec![];
        }

        let mut changed: Vec<String> = new_doc
            .iter()
            .filter(|(field, value)| old_doc.get(*field) != Some(*value))
            .map(|(field, _)| field.clone())
            .collect();

        changed.extend(
            old_doc
                .keys()
                .filter(|field| !new_doc.contains_key(*field))
                .cloned(),
        );
        changed
    }
}

/// Filter for events
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    ChangeType(ChangeType),
    /// Current record has the field
    HasField(String),
    /// Current record's field has this value
    FieldEquals(String, Value),
    /// Field changed (updates only)
    FieldChanged(String),
    And(Vec<EventFilter>),
    Or(Vec<EventFilter>),
}

impl EventFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::ChangeType(ct) => &event.change_type == ct,
            EventFilter::HasField(field) => event.get_field(field).is_some(),
            EventFilter::FieldEquals(field, value) => event.get_field(field) == Some(value),
            EventFilter::FieldChanged(field) => event.field_changed(field),
            EventFilter::And(filters) => filters.iter().all(|f| f.matches(event)),
            EventFilter::Or(filters) => filters.iter().any(|f| f.matches(event)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_change_event_insert() {
        let event = ChangeEvent::insert(
            CollectionId::Users,
            Key::Id(123),
            doc(json!({"id": 123, "name": "Alice"})),
        );

        assert_eq!(event.collection, CollectionId::Users);
        assert_eq!(event.key, Key::Id(123));
        assert!(matches!(event.change_type, ChangeType::Insert));
        assert!(event.document.is_some());
        assert!(event.old_document.is_none());
    }

    #[test]
    fn test_update_reports_replaced_fields() {
        let old = doc(json!({"id": 4, "name": "Lamp", "stock": 3, "image": "lamp.png"}));
        let new = doc(json!({"id": 4, "name": "Lamp", "stock": 2}));
        let event = ChangeEvent::update(CollectionId::Products, Key::Id(4), Some(old), new);

        assert!(!event.field_changed("name"));
        assert!(event.field_changed("stock"));
        assert!(event.field_changed("image"));

        let mut changed = event.changed_fields();
        changed.sort();
        assert_eq!(changed, vec!["image", "stock"]);
    }

    #[test]
    fn test_event_filter() {
        let event = ChangeEvent::insert(
            CollectionId::Products,
            Key::Id(1),
            doc(json!({"id": 1, "status": "active"})),
        );

        assert!(EventFilter::All.matches(&event));
        assert!(EventFilter::ChangeType(ChangeType::Insert).matches(&event));
        assert!(!EventFilter::ChangeType(ChangeType::Delete).matches(&event));
        assert!(EventFilter::HasField("status".to_string()).matches(&event));
        assert!(!EventFilter::HasField("missing".to_string()).matches(&event));
        assert!(EventFilter::FieldEquals("status".into(), json!("active")).matches(&event));
        assert!(
            EventFilter::Or(vec![
                EventFilter::ChangeType(ChangeType::Delete),
                EventFilter::FieldEquals("status".into(), json!("active")),
            ])
            .matches(&event)
        );
        assert!(
            !EventFilter::And(vec![
                EventFilter::ChangeType(ChangeType::Insert),
                EventFilter::FieldEquals("status".into(), json!("inactive")),
            ])
            .matches(&event)
        );
    }
}
