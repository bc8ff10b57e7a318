//! Background job domain entities.

pub mod model;
pub mod status;

pub use model::{Job, JobPayload, NewJob};
pub use status::JobStatus;
