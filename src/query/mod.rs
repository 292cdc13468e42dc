//! Query execution
//!
//! Ad-hoc and prepared statement execution with a bounded plan cache and a
//! single transparent re-prepare when the server rejects a cached plan.

mod cache;
mod errors;
mod executor;
mod plan;
mod request;
mod result;

pub use cache::{PreparedPlanCache, DEFAULT_PLAN_CACHE_CAPACITY};
pub use errors::{
    QueryServerError, INDEX_NOT_FOUND_MARKER, INTERNAL_ERROR, PREPARED_NOT_FOUND, PREPARED_STALE,
};
pub use executor::QueryExecutor;
pub use plan::{
    plan_name, prepare_bucket_statement, prepare_statement, strip_prepare_prefix, PreparedPlan,
};
pub use request::{
    format_duration, substitute_bucket, QueryParams, QueryRequest, ScanConsistency,
    CURRENT_BUCKET_PLACEHOLDER,
};
pub use result::{is_final_success, AsyncQueryResult, QueryMetrics, QueryResult, SectionStream};

pub(crate) use result::decode_section;
