//! # ironrelay-database
//!
//! Persistence for IronRelay: the store traits the queue engine is written
//! against, their PostgreSQL repositories, an in-process implementation for
//! tests and single-binary deployments, and the unit-of-work commit-hook
//! queue used to defer job creation until a transaction commits.

pub mod backend;
pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;
pub mod unit_of_work;

pub use backend::Stores;
pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{DeliveryStore, IncomingWebhookStore, JobStore};
pub use unit_of_work::{PgUnitOfWork, UnitOfWork};
