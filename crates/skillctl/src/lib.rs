//! skillctl - local skill registry, matcher and script scanner.
//!
//! The binary in `main.rs` wires these modules to the command line.

pub mod catalog;
pub mod render;
pub mod scanner;

pub use catalog::{discover_skills, DiscoveryError, DiscoveryResult};
pub use scanner::{scan_all, scan_skill, scan_source, ScanError, ScanOptions};
