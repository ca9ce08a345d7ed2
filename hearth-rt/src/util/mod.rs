//! Shared utilities: identifier types.

pub mod ids;

pub use ids::{ActorId, BusId, MonitorRef, TimerId};
