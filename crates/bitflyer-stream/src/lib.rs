/*
[INPUT]:  Public API exports for bitflyer-stream crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod config;
pub mod runner;

pub use config::{ConnectionSettings, StreamConfig, StreamSelection, StreamSpec};
pub use runner::{RunSummary, StreamRunner, build_clients};
