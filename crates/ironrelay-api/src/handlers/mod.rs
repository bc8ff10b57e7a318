//! Route handlers.

pub mod admin;
pub mod health;
pub mod incoming;
pub mod status;
