//! Request parsing helpers.

pub mod json;
pub mod path;
pub mod query;

pub use json::parse_json_body;
pub use path::parse_job_id;
pub use query::JobListParams;
