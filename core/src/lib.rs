//! diskimg Core - Foundational Types
//!
//! Error taxonomy, size quantities, subprocess limits, image metadata and
//! engine configuration shared by the runtime and the CLI.

pub mod config;
pub mod error;
pub mod image;
pub mod limits;
pub mod quantity;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::{ErrorKind, ImageError, Result, ValidationFailure};
pub use image::ImageInfo;
pub use limits::ProcessLimits;
pub use quantity::{Quantity, QuantityFormat};

/// diskimg version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
