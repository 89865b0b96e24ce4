use crate::types::Document;
use serde_json::Value;

/// A predicate over stored records, evaluated in memory after a full scan.
pub trait Queryable {
    fn matches(&self, doc: &Document) -> bool;
}

impl<F> Queryable for F
where
    F: Fn(&Document) -> bool,
{
    fn matches(&self, doc: &Document) -> bool {
        self(doc)
    }
}

/// Case-insensitive substring match on one string field.
#[derive(Debug, Clone)]
pub struct ContainsTerm {
    field: String,
    needle: String,
}

impl ContainsTerm {
    pub fn new(field: impl Into<String>, term: &str) -> Self {
        Self {
            field: field.into(),
            needle: term.to_lowercase(),
        }
    }
}

impl Queryable for ContainsTerm {
    fn matches(&self, doc: &Document) -> bool {
        match doc.get(&self.field) {
            Some(Value::String(s)) => s.to_lowercase().contains(&self.needle),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contains_term() {
        let headphones = json!({"name": "Wireless Headphones"});
        let watch = json!({"name": "Smart Watch"});
        let unnamed = json!({"name": 42});

        let q = ContainsTerm::new("name", "HEAD");
        assert!(q.matches(headphones.as_object().unwrap()));
        assert!(!q.matches(watch.as_object().unwrap()));
        assert!(!q.matches(unnamed.as_object().unwrap()));

        let everything = ContainsTerm::new("name", "");
        assert!(everything.matches(watch.as_object().unwrap()));
    }

    #[test]
    fn test_closure_predicate() {
        let in_stock = |doc: &Document| doc.get("stock").and_then(Value::as_i64).unwrap_or(0) > 0;
        assert!(in_stock.matches(json!({"stock": 3}).as_object().unwrap()));
        assert!(!in_stock.matches(json!({"stock": 0}).as_object().unwrap()));
    }
}
