//! # ironrelay-core
//!
//! Core crate for IronRelay. Contains configuration schemas, typed
//! identifiers, the clock abstraction used by the queue engine, and the
//! unified error system.
//!
//! This crate has **no** internal dependencies on other IronRelay crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
