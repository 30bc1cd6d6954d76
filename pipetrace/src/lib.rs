//! Collector composition: a pipe server feeding a file exporter.

pub mod collector;

pub use collector::Collector;
