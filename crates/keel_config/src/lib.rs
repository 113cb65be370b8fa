//! Parsing and validation of `keel.toml` project configuration files.
//!
//! The two switches that select the engine's behavior live here:
//! `outputMode` chooses whether production builds are pruned and assembled
//! into a standalone tree, and `devBundler` chooses between the incremental
//! engine and a full-rebuild loop for development.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_layout, ProjectLayout};
pub use types::*;
