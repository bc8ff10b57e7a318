//! Core type definitions used across the IronRelay workspace.

pub mod id;

pub use id::*;
