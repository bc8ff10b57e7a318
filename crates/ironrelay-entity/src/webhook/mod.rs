//! Webhook domain entities: outbound deliveries and the inbound log.

pub mod delivery;
pub mod incoming;

pub use delivery::{DeliveryStatus, NewWebhookDelivery, WebhookDelivery};
pub use incoming::{IncomingStatus, IncomingWebhook, NewIncomingWebhook};
