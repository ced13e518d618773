//! Record store abstraction.
//!
//! The import framework treats persistence as an external collaborator: a
//! generic queryable/insertable table store scoped by tenant. The only
//! contract the pipeline relies on is that inserts are all-or-nothing per
//! call and that a unique-constraint violation is recognizable as such
//! ([`StoreError::UniqueViolation`]); a race the pre-check could not catch
//! must be reportable as a duplicate, not an opaque failure.

pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreResult;

pub use memory::MemoryStore;

/// A queryable/insertable table store scoped by tenant.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Select `fields` from all records of `table` owned by `tenant_id`.
    ///
    /// Returned values are JSON objects carrying at least the requested
    /// fields (callers include `id` explicitly when they need it).
    async fn select(
        &self,
        table: &str,
        fields: &[&str],
        tenant_field: &str,
        tenant_id: &str,
    ) -> StoreResult<Vec<Value>>;

    /// Insert records into `table`, returning them with generated ids.
    ///
    /// All-or-nothing per call: on any failure nothing is inserted.
    async fn insert(
        &self,
        table: &str,
        records: Vec<Map<String, Value>>,
    ) -> StoreResult<Vec<Value>>;
}
