//! Public API module.
//!
//! Everything GUI code touches: the service, its façades, listener traits
//! and the value types they pass around.

pub mod config;
pub mod handles;
pub mod listeners;
pub mod models;
pub(crate) mod service;
