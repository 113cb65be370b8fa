//! Collects diagnostics from compile waves and dev passes.
//!
//! Compile workers finish in any order, so [`DiagnosticSink::take_sorted`]
//! hands diagnostics out grouped by module and code rather than in arrival
//! order. A module that fails the same way twice in one run (a retried
//! compile, or two importers reporting the same missing file) is reported
//! once.

use crate::diagnostic::Diagnostic;
use crate::severity::Severity;
use std::fmt;
use std::sync::Mutex;

/// Diagnostic counts per severity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    /// Import cycles and other informational notes.
    pub notes: usize,
    /// Problems that leave the build usable.
    pub warnings: usize,
    /// Failed modules, entries or assembly steps.
    pub errors: usize,
}

impl Tally {
    fn count(&mut self, severity: Severity) {
        match severity {
            Severity::Note => self.notes += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Error => self.errors += 1,
        }
    }

    /// Process exit code for a run that produced these diagnostics.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.errors > 0)
    }
}

impl fmt::Display for Tally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s), {} warning(s)", self.errors, self.warnings)
    }
}

#[derive(Default)]
struct Inner {
    diagnostics: Vec<Diagnostic>,
    tally: Tally,
}

/// A thread-safe accumulator of diagnostics for one build or dev pass.
#[derive(Default)]
pub struct DiagnosticSink {
    inner: Mutex<Inner>,
}

impl DiagnosticSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `diag` unless an identical diagnostic is already held.
    /// Returns `true` if it was recorded.
    pub fn emit(&self, diag: Diagnostic) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.diagnostics.contains(&diag) {
            return false;
        }
        inner.tally.count(diag.severity);
        inner.diagnostics.push(diag);
        true
    }

    /// Counts of everything recorded since the last [`take_sorted`](Self::take_sorted).
    pub fn tally(&self) -> Tally {
        self.inner.lock().unwrap().tally
    }

    /// Returns `true` if an error is held.
    pub fn has_errors(&self) -> bool {
        self.tally().errors > 0
    }

    /// Drains the sink. Diagnostics without a module come first, then each
    /// module's diagnostics in code order; ties keep their arrival order.
    pub fn take_sorted(&self) -> (Vec<Diagnostic>, Tally) {
        let mut inner = self.inner.lock().unwrap();
        let mut diagnostics = std::mem::take(&mut inner.diagnostics);
        let tally = std::mem::take(&mut inner.tally);
        drop(inner);
        diagnostics.sort_by(|a, b| {
            (a.module.as_deref(), a.code.number).cmp(&(b.module.as_deref(), b.code.number))
        });
        (diagnostics, tally)
    }

    /// A snapshot in arrival order, without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.lock().unwrap().diagnostics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code;

    fn missing(module: &str, specifier: &str) -> Diagnostic {
        Diagnostic::error(code::UNRESOLVED_IMPORT, format!("cannot resolve `{specifier}`"))
            .with_module(module)
    }

    #[test]
    fn empty_sink() {
        let sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.tally(), Tally::default());
        assert_eq!(sink.tally().exit_code(), 0);
        assert!(sink.take_sorted().0.is_empty());
    }

    #[test]
    fn optional_import_warning_keeps_exit_code_zero() {
        let sink = DiagnosticSink::new();
        sink.emit(
            Diagnostic::warning(code::OPTIONAL_IMPORT_UNRESOLVED, "`optionalFeature` is not installed")
                .with_module("src/app.js"),
        );
        sink.emit(Diagnostic::note(code::IMPORT_CYCLE, "src/a.js -> src/b.js -> src/a.js"));
        let tally = sink.tally();
        assert_eq!(tally, Tally { notes: 1, warnings: 1, errors: 0 });
        assert_eq!(tally.exit_code(), 0);
        assert_eq!(tally.to_string(), "0 error(s), 1 warning(s)");
    }

    #[test]
    fn repeated_failure_is_reported_once() {
        let sink = DiagnosticSink::new();
        assert!(sink.emit(missing("src/app.js", "./gone")));
        assert!(!sink.emit(missing("src/app.js", "./gone")));
        assert!(sink.emit(missing("src/lib.js", "./gone")));
        assert_eq!(sink.tally().errors, 2);
        assert_eq!(sink.tally().exit_code(), 1);
    }

    #[test]
    fn take_sorted_groups_by_module_and_resets() {
        let sink = DiagnosticSink::new();
        sink.emit(Diagnostic::error(code::COMPILE_FAILED, "unexpected token").with_module("src/b.js"));
        sink.emit(missing("src/b.js", "./c"));
        sink.emit(missing("src/a.js", "./c"));
        sink.emit(Diagnostic::warning(code::CACHE_DISCARDED, "cache reset"));

        let (diagnostics, tally) = sink.take_sorted();
        let order: Vec<(Option<&str>, String)> = diagnostics
            .iter()
            .map(|d| (d.module.as_deref(), d.code.to_string()))
            .collect();
        assert_eq!(
            order,
            vec![
                (None, "W401".to_string()),
                (Some("src/a.js"), "E101".to_string()),
                (Some("src/b.js"), "E101".to_string()),
                (Some("src/b.js"), "E201".to_string()),
            ]
        );
        assert_eq!(tally, Tally { notes: 0, warnings: 1, errors: 3 });
        assert_eq!(sink.tally(), Tally::default());
        assert!(sink.diagnostics().is_empty());
    }

    #[test]
    fn parallel_workers_share_one_sink() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(DiagnosticSink::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for module in 0..50 {
                        sink.emit(missing(&format!("src/m{worker}_{module}.js"), "./gone"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(sink.tally().errors, 400);
        let (diagnostics, _) = sink.take_sorted();
        assert!(diagnostics.windows(2).all(|w| w[0].module <= w[1].module));
    }
}
