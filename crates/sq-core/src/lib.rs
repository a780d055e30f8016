//! Squeeze core: shared data model, error taxonomy and configuration.

pub mod config;
pub mod document;
pub mod error;
pub mod profile;
pub mod types;

pub use config::SqueezeConfig;
pub use document::Document;
pub use error::{Result, SqError, StrategyError};
pub use profile::DocumentProfile;
pub use types::*;
