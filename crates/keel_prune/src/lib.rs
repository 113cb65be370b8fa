//! Reachability pruning for production output.
//!
//! [`Pruner::prune`] walks forward edges from the production entries and
//! returns the [`ReachabilitySet`] the assembler copies. Static imports are
//! always followed; conditional and dynamic imports are followed according
//! to the configured [`DynamicImportPolicy`](keel_config::DynamicImportPolicy),
//! which defaults to following all of them. Leaving out a module that runs
//! is a broken deployment; keeping one that never runs only costs space.

#![warn(missing_docs)]

pub mod error;
pub mod packages;
pub mod reach;

pub use error::PruneError;
pub use packages::installed_packages;
pub use reach::{prune, Pruner, ReachabilitySet, SkippedImport};
