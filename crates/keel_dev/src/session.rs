//! Development sessions.
//!
//! A [`DevSession`] owns everything one `keel dev` run needs: the selected
//! bundler with its graph and cache, and the list of reload listeners.
//! Nothing is process-global, so several sessions (for example in tests)
//! can run side by side.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use keel_config::{DevBundlerMode, ProjectConfig, ProjectLayout};
use keel_graph::{FrontEnd, ModuleGraph};

use crate::engine::IncrementalEngine;
use crate::error::DevError;
use crate::event::{EventQueue, Wait};
use crate::full::FullRebuildEngine;
use crate::notice::{ReloadNotice, Subscribers};
use crate::report::{EngineState, PassReport, StartupReport};

/// How often the run loop checks whether it should stop while idle.
const IDLE_TICK: Duration = Duration::from_millis(200);

/// A development bundler driven by batches of file changes.
pub trait DevBundler {
    /// Which configured mode this bundler implements.
    fn mode(&self) -> DevBundlerMode;

    /// Current state of the engine loop.
    fn state(&self) -> EngineState;

    /// The current module graph.
    fn graph(&self) -> &ModuleGraph;

    /// Processes every change pending in `queue`. Module failures are
    /// reported in the result; an `Err` means the session cannot continue.
    fn process(&mut self, queue: &mut EventQueue) -> Result<PassReport, DevError>;

    /// Current compiled output of the module with the given key.
    fn read_output(&self, key: &str) -> Result<Option<Vec<u8>>, DevError>;

    /// Modules that are currently broken, with their error.
    fn failures(&self) -> BTreeMap<String, String>;

    /// Persists whatever state survives a restart.
    fn save(&mut self) -> Result<(), DevError>;
}

/// One development session.
pub struct DevSession {
    bundler: Box<dyn DevBundler>,
    subscribers: Subscribers,
    debounce: Duration,
}

impl DevSession {
    /// Opens a session with the bundler selected by `devBundler`.
    pub fn open(
        config: &ProjectConfig,
        layout: &ProjectLayout,
        front_end: Arc<dyn FrontEnd>,
    ) -> Result<(Self, StartupReport), DevError> {
        let (bundler, report): (Box<dyn DevBundler>, StartupReport) = match config.dev_bundler {
            DevBundlerMode::Incremental => {
                let (engine, report) = IncrementalEngine::open(config, layout, front_end)?;
                (Box::new(engine), report)
            }
            DevBundlerMode::Default => {
                let (engine, report) = FullRebuildEngine::open(config, layout, front_end)?;
                (Box::new(engine), report)
            }
        };
        tracing::info!(mode = ?config.dev_bundler, modules = report.modules, "dev session open");
        Ok((
            Self::with_bundler(bundler, Duration::from_millis(config.dev.debounce_ms)),
            report,
        ))
    }

    /// Wraps an already opened bundler.
    pub fn with_bundler(bundler: Box<dyn DevBundler>, debounce: Duration) -> Self {
        Self {
            bundler,
            subscribers: Subscribers::new(),
            debounce,
        }
    }

    /// The active bundler.
    pub fn bundler(&self) -> &dyn DevBundler {
        self.bundler.as_ref()
    }

    /// Registers a live-reload listener.
    pub fn subscribe(&mut self) -> Receiver<ReloadNotice> {
        self.subscribers.subscribe()
    }

    /// Runs one pass over the pending changes and notifies listeners if
    /// anything changed.
    pub fn process(&mut self, queue: &mut EventQueue) -> Result<PassReport, DevError> {
        let report = self.bundler.process(queue)?;
        let notice = report.notice();
        if !notice.is_empty() {
            let reached = self.subscribers.publish(&notice);
            tracing::debug!(
                paths = notice.changed_paths.len(),
                errors = notice.errors.len(),
                listeners = reached,
                "reload notice sent"
            );
        }
        Ok(report)
    }

    /// Serves a compiled output by its path in the output tree, which is
    /// the module key. A leading `/` is ignored.
    pub fn read_output(&self, path: &str) -> Result<Option<Vec<u8>>, DevError> {
        self.bundler.read_output(path.trim_start_matches('/'))
    }

    /// Persists the session's cache.
    pub fn save(&mut self) -> Result<(), DevError> {
        self.bundler.save()
    }

    /// Processes batches from `queue` until `running` is cleared or every
    /// event sender is gone. The cache is saved on the way out.
    pub fn run(&mut self, queue: &mut EventQueue, running: &AtomicBool) -> Result<(), DevError> {
        while running.load(Ordering::SeqCst) {
            match queue.wait_batch(self.debounce, IDLE_TICK) {
                Wait::Ready => {
                    self.process(queue)?;
                }
                Wait::TimedOut => {}
                Wait::Closed => break,
            }
        }
        tracing::debug!("dev session stopping");
        self.save()
    }
}
