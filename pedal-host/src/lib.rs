//! PedalTelemetry Host Library
//!
//! Exposes the host components for integration testing.

pub mod channel;
pub mod config;
pub mod manager;
pub mod view;
