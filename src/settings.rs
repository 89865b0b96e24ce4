use crate::db::CatalogStore;
use crate::error::Result;
use crate::models::Setting;
use crate::saga::{Saga, StepReport};
use serde_json::Value;
use std::collections::HashMap;

/// Store-wide settings edited from the admin back office.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub site_name: String,
    pub currency: String,
    pub tax_rate: f64,
    pub shipping_fee: f64,
    pub min_order: f64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            currency: "USD".to_string(),
            tax_rate: 0.0,
            shipping_fee: 0.0,
            min_order: 0.0,
        }
    }
}

/// Settings values are free-form: numbers may have been saved as numbers or as the text
/// of a form field.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl StoreSettings {
    /// Builds the view from stored entries; missing or unreadable entries keep their
    /// defaults and unknown keys are ignored.
    pub fn from_entries(entries: &[Setting]) -> Self {
        let values: HashMap<&str, &Value> = entries
            .iter()
            .map(|s| (s.key.as_str(), &s.value))
            .collect();
        let defaults = Self::default();

        let text = |key: &str, fallback: String| values.get(key).and_then(|v| as_text(v)).unwrap_or(fallback);
        let number = |key: &str, fallback: f64| values.get(key).and_then(|v| as_number(v)).unwrap_or(fallback);

        Self {
            site_name: text("site_name", defaults.site_name),
            currency: text("currency", defaults.currency),
            tax_rate: number("tax_rate", defaults.tax_rate),
            shipping_fee: number("shipping_fee", defaults.shipping_fee),
            min_order: number("min_order", defaults.min_order),
        }
    }

    pub fn to_entries(&self) -> Vec<Setting> {
        vec![
            Setting::new("site_name", self.site_name.clone()),
            Setting::new("currency", self.currency.clone()),
            Setting::new("tax_rate", self.tax_rate),
            Setting::new("shipping_fee", self.shipping_fee),
            Setting::new("min_order", self.min_order),
        ]
    }

    pub async fn load(store: &CatalogStore) -> Result<Self> {
        let entries = store.repository::<Setting>().all().await?;
        Ok(Self::from_entries(&entries))
    }

    /// Upserts every entry in turn. A failure leaves the earlier entries saved.
    pub async fn save(&self, store: &CatalogStore) -> Result<Vec<StepReport>> {
        let settings = store.repository::<Setting>();
        let mut saga = Saga::new("save settings");
        for entry in self.to_entries() {
            let step = entry.key.clone();
            let settings = &settings;
            saga.step(step, async move {
                settings.put(&entry).await?;
                Ok(1)
            })
            .await?;
        }
        Ok(saga.finish())
    }
}
