//! Engine states and per-pass reports.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use keel_cache::{CacheOpen, ChangeSet};
use keel_graph::BuildStats;

use crate::notice::{ModuleFailure, ReloadNotice};

/// Where a development engine is in its loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No pending changes. The loop waits for file events here.
    #[default]
    Idle,
    /// Mapping a batch of changes to stale modules and closing the frontier.
    Invalidating,
    /// Recompiling the frontier.
    Rebuilding,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Invalidating => write!(f, "invalidating"),
            EngineState::Rebuilding => write!(f, "rebuilding"),
        }
    }
}

/// What one pass over a batch of file changes did. Every set holds module
/// keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// The closed invalidation frontier.
    pub frontier: BTreeSet<String>,
    /// Modules that went through the compile step.
    pub rebuilt: BTreeSet<String>,
    /// Rebuilt modules whose output changed.
    pub changed: BTreeSet<String>,
    /// Rebuilt modules whose output came out byte-identical.
    pub unchanged: BTreeSet<String>,
    /// Frontier modules left alone because nothing they depend on changed.
    pub skipped: BTreeSet<String>,
    /// Frontier modules dropped because their file was deleted before
    /// their rebuild started.
    pub cancelled: BTreeSet<String>,
    /// Modules discovered by this pass.
    pub added: BTreeSet<String>,
    /// Modules no longer reachable from any entry.
    pub removed: BTreeSet<String>,
    /// Modules that failed, with their error.
    pub failed: BTreeMap<String, String>,
}

impl PassReport {
    /// Returns `true` if the pass had nothing to do.
    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
            && self.added.is_empty()
            && self.removed.is_empty()
            && self.failed.is_empty()
    }

    /// The notice sent to live-reload listeners for this pass.
    pub fn notice(&self) -> ReloadNotice {
        let changed_paths: BTreeSet<&String> = self
            .changed
            .iter()
            .chain(&self.added)
            .chain(&self.removed)
            .collect();
        ReloadNotice {
            changed_paths: changed_paths.into_iter().cloned().collect(),
            errors: self
                .failed
                .iter()
                .map(|(module, message)| ModuleFailure {
                    module: module.clone(),
                    message: message.clone(),
                })
                .collect(),
        }
    }
}

/// How a session came up.
#[derive(Debug, Clone)]
pub struct StartupReport {
    /// How the persisted cache was found. `None` for engines without one.
    pub cache: Option<CacheOpen>,
    /// Cached modules whose sources changed while no session was running.
    pub stale: ChangeSet,
    /// Modules in the initial graph.
    pub modules: usize,
    /// Front end work done for the initial graph.
    pub stats: BuildStats,
    /// Modules that failed in the initial build.
    pub failed: BTreeMap<String, String>,
}
