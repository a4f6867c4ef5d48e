//! Configuration module for ParPut
//!
//! Provides configuration management including CLI arguments
//! and runtime settings.

mod settings;

pub use settings::*;
