//! # ironrelay-entity
//!
//! Domain entity models for IronRelay. Every struct in this crate
//! represents a database table row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! entities additionally derive `sqlx::FromRow`.

pub mod job;
pub mod stats;
pub mod webhook;

pub use job::{Job, JobPayload, JobStatus, NewJob};
pub use stats::QueueStats;
pub use webhook::{
    DeliveryStatus, IncomingStatus, IncomingWebhook, NewIncomingWebhook, NewWebhookDelivery,
    WebhookDelivery,
};
