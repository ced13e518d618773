//! In-memory record store.
//!
//! Backs tests and local development runs. Unique constraints can be
//! declared per table so the insert-time violation path behaves like a real
//! database index.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

use super::RecordStore;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Map<String, Value>>>>,
    /// table -> fields that must be unique (each independently).
    unique_constraints: HashMap<String, Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unique constraint on `field` of `table`.
    pub fn with_unique(mut self, table: &str, field: &str) -> Self {
        self.unique_constraints
            .entry(table.to_string())
            .or_default()
            .push(field.to_string());
        self
    }

    /// Pre-populate a table, assigning ids to records that lack one.
    pub fn seed(&self, table: &str, records: Vec<Map<String, Value>>) {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let rows = tables.entry(table.to_string()).or_default();
        for mut record in records {
            record
                .entry("id".to_string())
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            rows.push(record);
        }
    }

    /// Number of rows currently in `table`.
    pub fn count(&self, table: &str) -> usize {
        let tables = self.tables.lock().expect("store lock poisoned");
        tables.get(table).map_or(0, Vec::len)
    }

    fn violates_unique(
        &self,
        table: &str,
        existing: &[Map<String, Value>],
        batch: &[Map<String, Value>],
        record: &Map<String, Value>,
    ) -> Option<String> {
        let fields = self.unique_constraints.get(table)?;
        for field in fields {
            let Some(value) = record.get(field).and_then(Value::as_str) else {
                continue;
            };
            let clash = existing
                .iter()
                .chain(batch.iter())
                .any(|r| r.get(field).and_then(Value::as_str) == Some(value));
            if clash {
                return Some(format!("{}.{}", table, field));
            }
        }
        None
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        fields: &[&str],
        tenant_field: &str,
        tenant_id: &str,
    ) -> StoreResult<Vec<Value>> {
        let tables = self.tables.lock().expect("store lock poisoned");
        let rows = tables.get(table).cloned().unwrap_or_default();

        Ok(rows
            .into_iter()
            .filter(|r| r.get(tenant_field).and_then(Value::as_str) == Some(tenant_id))
            .map(|r| {
                let mut projected = Map::new();
                for field in fields {
                    if let Some(v) = r.get(*field) {
                        projected.insert((*field).to_string(), v.clone());
                    }
                }
                Value::Object(projected)
            })
            .collect())
    }

    async fn insert(
        &self,
        table: &str,
        records: Vec<Map<String, Value>>,
    ) -> StoreResult<Vec<Value>> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let existing = tables.entry(table.to_string()).or_default();

        // All-or-nothing: check the whole batch before touching the table
        let mut accepted: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
        for mut record in records {
            if let Some(constraint) = self.violates_unique(table, existing, &accepted, &record) {
                return Err(StoreError::UniqueViolation(constraint));
            }
            record
                .entry("id".to_string())
                .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            accepted.push(record);
        }

        let inserted: Vec<Value> = accepted.iter().cloned().map(Value::Object).collect();
        existing.extend(accepted);
        Ok(inserted)
    }
}
