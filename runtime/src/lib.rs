//! diskimg Runtime - resource-bounded `qemu-img` driver.
//!
//! Runs the image tool under address-space and CPU-time ceilings, scrapes its
//! progress output into a per-owner counter, and exposes the conversion,
//! resize, inspect, validate and create operations.

#![allow(clippy::result_large_err)]

pub mod exec;
pub mod image;
pub mod progress;

// Re-export common types
pub use exec::{execute_with_limits, LineSplitter};
pub use image::{check_image, ImageOperations, QemuOperations, StubOperations};
pub use progress::{parse_progress, ProgressReporter, ProgressState};
