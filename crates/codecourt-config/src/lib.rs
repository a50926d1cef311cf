//! Configuration accessor — one place that coerces `Configuration` rows by
//! `val_type`. Callers fetch a fresh snapshot per-request rather than
//! caching it process-wide, so operator changes to the `configuration`
//! table take effect on the next request instead of requiring a restart.

use anyhow::{bail, Context, Result};
use codecourt_schemas::{Configuration, ValType};
use std::collections::HashMap;

pub mod env;

/// A per-request snapshot of the `configuration` table, keyed by `key`.
#[derive(Debug, Clone, Default)]
pub struct ConfigAccessor {
    rows: HashMap<String, Configuration>,
}

impl ConfigAccessor {
    pub fn from_rows(rows: Vec<Configuration>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.key.clone(), r)).collect(),
        }
    }

    fn get(&self, key: &str) -> Option<&Configuration> {
        self.rows.get(key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(row) => {
                if row.val_type != ValType::Bool {
                    bail!("configuration key {key} is not of type bool");
                }
                row.val
                    .parse::<bool>()
                    .with_context(|| format!("configuration key {key} has non-bool val {:?}", row.val))
            }
        }
    }

    pub fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key) {
            None => Ok(default),
            Some(row) => {
                if row.val_type != ValType::Integer {
                    bail!("configuration key {key} is not of type integer");
                }
                row.val
                    .parse::<i64>()
                    .with_context(|| format!("configuration key {key} has non-integer val {:?}", row.val))
            }
        }
    }

    pub fn get_string(&self, key: &str, default: &str) -> Result<String> {
        match self.get(key) {
            None => Ok(default.to_string()),
            Some(row) => {
                if row.val_type != ValType::String {
                    bail!("configuration key {key} is not of type string");
                }
                Ok(row.val.clone())
            }
        }
    }

    pub fn get_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        match self.get(key) {
            None => Ok(None),
            Some(row) => {
                if row.val_type != ValType::Json {
                    bail!("configuration key {key} is not of type json");
                }
                Ok(Some(serde_json::from_str(&row.val).with_context(|| {
                    format!("configuration key {key} has invalid json val")
                })?))
            }
        }
    }
}
