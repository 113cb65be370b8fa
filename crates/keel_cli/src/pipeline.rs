//! Shared pipeline helpers for CLI commands.
//!
//! Contains the steps every command needs: project root resolution,
//! configuration loading, the mapping from engine errors to diagnostics and
//! diagnostic rendering.

use std::path::{Path, PathBuf};

use keel_cache::CacheOpen;
use keel_config::{load_config, load_config_from_str, resolve_layout, ProjectConfig, ProjectLayout, CONFIG_FILE};
use keel_diagnostics::{
    code, Diagnostic, DiagnosticRenderer, DiagnosticSink, JsonRenderer, TerminalRenderer,
};
use keel_graph::{GraphError, ModuleGraph};

use crate::{GlobalArgs, ReportFormat};

/// Walks up from `start` looking for the nearest directory containing `keel.toml`.
///
/// Returns the directory containing `keel.toml`, or an error if none is found.
pub fn find_project_root(start: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(CONFIG_FILE).exists() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(format!(
                "could not find {CONFIG_FILE} in {} or any parent directory",
                start.display()
            )
            .into());
        }
    }
}

/// Resolves the project root directory from global CLI args.
///
/// If `--config` is specified, uses that path (file → parent dir, dir → itself).
/// Otherwise walks up from the current directory looking for `keel.toml`.
pub fn resolve_project_root(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref config_path) = global.config {
        let p = PathBuf::from(config_path);
        if p.is_file() {
            Ok(p.parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from(".")))
        } else {
            Ok(p)
        }
    } else {
        find_project_root(&std::env::current_dir()?)
    }
}

/// Loads the configuration and resolves every project directory.
///
/// A `--config` pointing at a file is read as is, whatever its name.
pub fn load_project(
    global: &GlobalArgs,
    out_dir: Option<&str>,
) -> Result<(ProjectConfig, ProjectLayout), Box<dyn std::error::Error>> {
    let root = resolve_project_root(global)?;
    let config = match global.config.as_deref().map(Path::new) {
        Some(file) if file.is_file() => load_config_from_str(&std::fs::read_to_string(file)?)?,
        _ => load_config(&root)?,
    };
    let root = std::path::absolute(&root)?;
    let layout = resolve_layout(&config, &root, out_dir.map(Path::new));
    Ok((config, layout))
}

/// Prints a status line to stderr unless `--quiet` is set.
pub fn status(global: &GlobalArgs, verb: &str, message: impl std::fmt::Display) {
    if !global.quiet {
        eprintln!("{verb:>12} {message}");
    }
}

/// Turns a graph failure into diagnostics.
///
/// Unresolved imports become `E101`, unresolved entries `E102` and front end
/// rejections `E201`. Failures that belong to no module are returned as
/// errors: the command cannot continue.
pub fn diagnose(err: GraphError, graph: Option<&ModuleGraph>) -> Result<Vec<Diagnostic>, GraphError> {
    let mut diags = Vec::new();
    for failure in err.flatten() {
        match failure {
            GraphError::Resolution(e) => match &e.importer {
                Some(importer) => {
                    let mut diag = Diagnostic::error(
                        code::UNRESOLVED_IMPORT,
                        format!("cannot resolve `{}` from {importer}", e.specifier),
                    )
                    .with_module(importer.clone())
                    .with_note(e.reason.clone());
                    if let Some(node) = graph.and_then(|g| g.node_by_key(importer)) {
                        diag = diag.with_path(node.path.clone());
                    }
                    diags.push(diag);
                }
                None => diags.push(
                    Diagnostic::error(
                        code::UNRESOLVED_ENTRY,
                        format!("cannot resolve entry `{}`", e.specifier),
                    )
                    .with_note(e.reason.clone())
                    .with_help(format!("check `entries` in {CONFIG_FILE}")),
                ),
            },
            GraphError::Compile(e) => diags.push(
                Diagnostic::error(code::COMPILE_FAILED, format!("failed to compile {}", e.key))
                    .with_module(e.key.clone())
                    .with_path(e.path.clone())
                    .with_note(e.message.clone()),
            ),
            other => return Err(other),
        }
    }
    Ok(diags)
}

/// An `E201` diagnostic for a module the dev engine holds as broken.
pub fn failure_diagnostic(key: &str, message: &str, graph: &ModuleGraph) -> Diagnostic {
    let mut diag = Diagnostic::error(code::COMPILE_FAILED, format!("{key} is broken"))
        .with_module(key)
        .with_note(message);
    if let Some(node) = graph.node_by_key(key) {
        diag = diag.with_path(node.path.clone());
    }
    diag
}

/// One `N501` note per import cycle in `graph`.
pub fn cycle_notes(graph: &ModuleGraph) -> Vec<Diagnostic> {
    graph
        .cycles()
        .into_iter()
        .map(|cycle| {
            let mut keys: Vec<&str> = cycle.iter().map(|&id| graph.get(id).key.as_str()).collect();
            keys.sort_unstable();
            let first = keys[0];
            Diagnostic::note(code::IMPORT_CYCLE, format!("import cycle through {} modules", keys.len()))
                .with_module(first)
                .with_note(keys.join(" <-> "))
        })
        .collect()
}

/// One `W402` warning per optional import left without a target.
pub fn optional_import_warnings(graph: &ModuleGraph) -> Vec<Diagnostic> {
    graph
        .unresolved_edges()
        .map(|(id, edge)| {
            let node = graph.get(id);
            Diagnostic::warning(
                code::OPTIONAL_IMPORT_UNRESOLVED,
                format!("optional import `{}` could not be resolved", edge.specifier),
            )
            .with_module(node.key.clone())
            .with_path(node.path.clone())
            .with_note(format!("{:?} import; it may fail at run time", edge.kind).to_lowercase())
        })
        .collect()
}

/// A `W401` warning if the cache was discarded after an integrity failure.
pub fn cache_warning(opened: &CacheOpen) -> Option<Diagnostic> {
    match opened {
        CacheOpen::Recovered { reason } => Some(
            Diagnostic::warning(code::CACHE_DISCARDED, "cache was corrupted and has been discarded")
                .with_note(reason.clone())
                .with_help("this build starts cold; nothing needs to be done"),
        ),
        _ => None,
    }
}

/// Renders every diagnostic in `sink`: text to stderr, JSON lines to stdout.
///
/// Returns the exit code: 1 if any diagnostic is an error.
pub fn finish(sink: &DiagnosticSink, format: ReportFormat, global: &GlobalArgs) -> i32 {
    let (diagnostics, tally) = sink.take_sorted();
    match format {
        ReportFormat::Text => {
            let renderer = TerminalRenderer::new(global.color);
            for diag in &diagnostics {
                if global.quiet && !diag.severity.is_error() {
                    continue;
                }
                eprintln!("{}", renderer.render(diag));
            }
            status(global, "Result", tally);
        }
        ReportFormat::Json => {
            for diag in &diagnostics {
                println!("{}", JsonRenderer.render(diag));
            }
        }
    }
    tally.exit_code()
}
