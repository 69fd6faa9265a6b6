//! Configuration for the Spectra real-time spectrum analyzer.
//!
//! # Features
//!
//! - **Analyzer config**: acquisition backend, transform size, per-channel
//!   masks, SNRI band and display settings in one TOML file
//! - **Validation**: every inconsistency reported at once
//! - **Paths**: platform-specific config directory
//!
//! # Example
//!
//! ```rust
//! use spectra_config::{AnalyzerConfig, Backend};
//!
//! let config = AnalyzerConfig::from_toml(
//!     r#"
//!     [acquisition]
//!     backend = "synthetic"
//!     tone_hz = 1000.0
//!
//!     [[masks]]
//!     channel = 0
//!     attenuation = 80.0
//!
//!     [[masks.bands]]
//!     f1 = 900.0
//!     f2 = 1100.0
//!     attenuation = 0.0
//!     "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.acquisition.backend, Backend::Synthetic);
//! assert_eq!(config.masks[0].bands.len(), 1);
//! ```

mod config;
mod error;

/// Platform-specific configuration paths.
pub mod paths;

/// Configuration consistency checks.
pub mod validation;

pub use config::{
    AcquisitionConfig, AnalyzerConfig, Backend, BandConfig, DisplayConfig, MaskConfig, SnriConfig,
    TransformConfig,
};
pub use error::ConfigError;
pub use paths::{default_config_path, user_config_dir};
pub use validation::{ValidationError, ValidationResult, validate_config};
