//! Operator endpoints.

pub mod jobs;
