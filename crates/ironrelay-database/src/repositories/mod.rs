//! PostgreSQL repository implementations for all IronRelay entities.

pub mod delivery;
pub mod incoming;
pub mod job;

pub use delivery::DeliveryRepository;
pub use incoming::IncomingWebhookRepository;
pub use job::JobRepository;
