//! Development-mode bundling.
//!
//! A [`DevSession`] builds the module graph once, then loops on batches of
//! file changes. With `devBundler = "incremental"` each batch goes through
//! the [`IncrementalEngine`], which invalidates the minimal set of modules,
//! rebuilds them and persists the result; otherwise the
//! [`FullRebuildEngine`] rebuilds everything. Listeners receive a
//! [`ReloadNotice`] after every pass that changed output.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod event;
pub mod frontier;
pub mod full;
pub mod notice;
pub mod report;
pub mod session;
pub mod watch;

pub use engine::{manifest_entry, IncrementalEngine};
pub use error::DevError;
pub use event::{channel, ChangeEvent, ChangeKind, EventQueue, Wait};
pub use frontier::InvalidationFrontier;
pub use full::FullRebuildEngine;
pub use notice::{ModuleFailure, ReloadNotice, Subscribers};
pub use report::{EngineState, PassReport, StartupReport};
pub use session::{DevBundler, DevSession};
pub use watch::{translate, FileWatcher};
