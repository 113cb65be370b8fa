//! The `keel dev` command.
//!
//! Opens a development session, reports the startup build, then watches the
//! source and package directories and rebuilds on every batch of changes.
//! Each reload notice is printed to stdout as one JSON line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::thread::JoinHandle;

use keel_dev::{channel, DevError, DevSession, FileWatcher, ReloadNotice, StartupReport};
use keel_diagnostics::DiagnosticSink;
use keel_graph::{ChannelFrontEnd, ScanFrontEnd};

use crate::pipeline::{cache_warning, diagnose, failure_diagnostic, finish, load_project, status};
use crate::{DevArgs, GlobalArgs};

/// Runs the `keel dev` command.
///
/// With `--once` the startup build is reported and the command exits: 0 if
/// every module built, 1 otherwise. Without it the command watches until
/// Ctrl+C, then saves the cache and exits with 0.
pub fn run(args: &DevArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, layout) = load_project(global, None)?;
    status(
        global,
        "Starting",
        format!(
            "{} v{} ({:?} bundler)",
            config.project.name, config.project.version, config.dev_bundler
        )
        .to_lowercase(),
    );

    let sink = DiagnosticSink::new();
    let (front_end, _worker) = ChannelFrontEnd::spawn(ScanFrontEnd);
    let (mut session, startup) = match DevSession::open(&config, &layout, Arc::new(front_end)) {
        Ok(opened) => opened,
        Err(DevError::Graph(err)) => {
            for diag in diagnose(err, None)? {
                sink.emit(diag);
            }
            return Ok(finish(&sink, args.format, global));
        }
        Err(e) => return Err(e.into()),
    };
    report_startup(&session, &startup, &sink, global);
    let code = finish(&sink, args.format, global);
    if args.once {
        return Ok(code);
    }

    let printer = print_notices(session.subscribe(), global.quiet);
    let (tx, mut queue) = channel();
    let watcher = FileWatcher::start(
        &[layout.source_root.clone(), layout.packages_root.clone()],
        vec![layout.cache_dir.clone(), layout.out_dir.clone()],
        tx,
    )?;
    for root in watcher.roots() {
        status(global, "Watching", root.display());
    }

    let running = Arc::new(AtomicBool::new(true));
    let stop = running.clone();
    ctrlc::set_handler(move || stop.store(false, Ordering::SeqCst))?;

    session.run(&mut queue, &running)?;
    status(global, "Stopped", "cache saved");
    drop(watcher);
    drop(session);
    // The printer ends once the session's sender is gone.
    let _ = printer.join();
    Ok(0)
}

fn report_startup(session: &DevSession, startup: &StartupReport, sink: &DiagnosticSink, global: &GlobalArgs) {
    if let Some(diag) = startup.cache.as_ref().and_then(cache_warning) {
        sink.emit(diag);
    }
    let stale = startup.stale.modified.len() + startup.stale.deleted.len();
    if stale > 0 {
        status(global, "Stale", format!("{stale} module(s) changed since the last session"));
    }
    let graph = session.bundler().graph();
    for (key, message) in &startup.failed {
        sink.emit(failure_diagnostic(key, message, graph));
    }
    status(
        global,
        "Ready",
        format!(
            "{} modules ({} compiled, {} reused)",
            startup.modules, startup.stats.compiled, startup.stats.reused
        ),
    );
}

/// Prints every notice as a JSON line on stdout, plus a short summary on
/// stderr.
fn print_notices(notices: Receiver<ReloadNotice>, quiet: bool) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for notice in notices {
            println!("{}", notice.to_json());
            if quiet {
                continue;
            }
            eprintln!("{:>12} {} file(s)", "Reloaded", notice.changed_paths.len());
            for failure in &notice.errors {
                eprintln!("{:>12} {}: {}", "Failed", failure.module, failure.message);
            }
        }
    })
}
