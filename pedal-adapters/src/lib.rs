//! Sample sources for PedalTelemetry

pub mod demo;
pub mod ibt;
pub mod iracing;
pub mod irsdk;
pub mod scripted;

pub use demo::DemoSource;
pub use ibt::IbtReplaySource;
pub use iracing::IRacingSource;
pub use scripted::ScriptedSource;
