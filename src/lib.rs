//! Point-in-time system telemetry over the Linux `/proc` filesystem.
//!
//! [`system::collector::Collector`] is the entry point: it samples CPU,
//! memory, processes and mounts in one pass and publishes an immutable
//! [`system::snapshot::SystemSnapshot`].

pub mod config;
pub mod format;
pub mod report;
pub mod system;
