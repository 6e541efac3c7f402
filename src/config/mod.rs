//! Configuration layer for skill-audit.
//!
//! ## Layers
//! - `types`: Configuration type definitions
//! - `loading`: File loading logic and trust-anchor decoding

mod error;
mod loading;
mod types;

pub use error::ConfigError;
pub use types::{Config, RulePackConfig, ScanConfig};
