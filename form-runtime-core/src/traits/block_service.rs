//! Block persistence abstract Trait

use crate::error::FormResult;
use crate::types::{FieldValues, FormInfo, QueryRequest, Record};

/// Block Service Trait
///
/// The persistence technology behind a block (SQL, REST, ...). The core only calls these
/// methods inside a scoped framework connection.
///
/// Platform implementation:
/// - `form-runtime-app`: `InMemoryBlockService`
pub trait BlockService: Send + Sync {
    /// Service identifier, also the service part of the post-query lookup cache key
    fn id(&self) -> &str;

    /// Fetch rows matching the request
    ///
    /// # Arguments
    /// * `form` - Running form
    /// * `request` - Criteria plus either a page or an all-rows cap
    fn execute_query(&self, form: &FormInfo, request: &QueryRequest)
        -> FormResult<Vec<FieldValues>>;

    /// Whether the service honours `QueryRequest::page`
    fn can_query_in_pages(&self) -> bool {
        false
    }

    /// Whether the most recent paged fetch left rows behind.
    ///
    /// Services that cannot tell keep the default, so a full page implies more rows.
    fn has_more_rows(&self) -> bool {
        true
    }

    /// Persist new records
    fn execute_insert(&self, form: &FormInfo, records: &[Record]) -> FormResult<()>;

    /// Persist modified records
    fn execute_update(&self, form: &FormInfo, records: &[Record]) -> FormResult<()>;

    /// Remove records
    fn execute_delete(&self, form: &FormInfo, records: &[Record]) -> FormResult<()>;
}
