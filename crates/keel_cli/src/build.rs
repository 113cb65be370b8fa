//! The `keel build` command.
//!
//! Builds the module graph from the configured entries, writes the result
//! back to the incremental cache and assembles the output tree. With
//! `outputMode = "standalone"` the graph is pruned to what the entries can
//! reach and an entrypoint is synthesized; otherwise only the project's own
//! modules are emitted.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use keel_assemble::{AssemblyError, Assembler, AssemblyResult};
use keel_cache::Cache;
use keel_config::{OutputMode, ProjectConfig, ProjectLayout};
use keel_dev::manifest_entry;
use keel_diagnostics::{code, Diagnostic, DiagnosticSink};
use keel_graph::{BuildOptions, ChannelFrontEnd, GraphBuilder, ModuleGraph, ScanFrontEnd};
use keel_prune::{installed_packages, Pruner};

use crate::pipeline::{
    cache_warning, cycle_notes, diagnose, finish, load_project, optional_import_warnings, status,
};
use crate::{BuildArgs, GlobalArgs, ReportFormat};

/// Runs the `keel build` command.
///
/// Returns exit code 0 if the output tree was written without errors, 1
/// otherwise.
pub fn run(args: &BuildArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, layout) = load_project(global, args.out_dir.as_deref())?;
    status(
        global,
        "Building",
        format!("{} v{}", config.project.name, config.project.version),
    );

    let sink = DiagnosticSink::new();
    let (mut cache, opened) = Cache::open(&layout.cache_dir, config.fingerprint())?;
    if let Some(diag) = cache_warning(&opened) {
        sink.emit(diag);
    }

    let (front_end, _worker) = ChannelFrontEnd::spawn(ScanFrontEnd);
    let builder = GraphBuilder::new(
        BuildOptions::new(&config, &layout),
        Arc::new(front_end),
        cache.blobs().clone(),
    )?;
    let graph = match builder.build(&config.entries) {
        Ok(graph) => graph,
        Err(err) => {
            for diag in diagnose(err, None)? {
                sink.emit(diag);
            }
            return Ok(finish(&sink, args.format, global));
        }
    };
    let stats = builder.stats();
    status(
        global,
        "Compiled",
        format!("{} modules ({} reused)", graph.len(), stats.reused),
    );

    record_build(&mut cache, &graph);
    cache.save()?;

    for diag in cycle_notes(&graph).into_iter().chain(optional_import_warnings(&graph)) {
        sink.emit(diag);
    }

    if let Some(result) = assemble(&config, &layout, &builder, &graph, &sink, global)? {
        status(
            global,
            "Finished",
            format!(
                "{} files in {} ({} written, {} removed)",
                result.files.len(),
                result.out_dir.display(),
                result.written,
                result.removed.len()
            ),
        );
        if args.format == ReportFormat::Json {
            let summary = serde_json::json!({
                "outDir": result.out_dir,
                "modules": graph.len(),
                "compiled": stats.compiled,
                "reused": stats.reused,
                "files": result.files.len(),
                "written": result.written,
                "removed": result.removed,
            });
            println!("{summary}");
        }
    }

    Ok(finish(&sink, args.format, global))
}

/// Writes the output tree for the configured output mode. Assembly
/// failures are reported as `E301` and yield `None`.
fn assemble(
    config: &ProjectConfig,
    layout: &ProjectLayout,
    builder: &GraphBuilder,
    graph: &ModuleGraph,
    sink: &DiagnosticSink,
    global: &GlobalArgs,
) -> Result<Option<AssemblyResult>, Box<dyn std::error::Error>> {
    let assembler = Assembler::new(builder.blobs(), &layout.project_root)
        .with_entrypoint(config.build.entrypoint.clone());

    let outcome = match config.output_mode {
        OutputMode::Standalone => {
            let installed = installed_packages(&layout.project_root, &layout.packages_root)?;
            let set = Pruner::new(config.build.dynamic_imports.clone())
                .with_installed(installed)
                .prune(graph, graph.entries())?;
            status(
                global,
                "Pruned",
                format!(
                    "{} of {} modules reachable, {} of {} packages used",
                    set.len(),
                    graph.len(),
                    set.used_packages.len(),
                    set.used_packages.len() + set.prunable_packages.len()
                ),
            );
            assembler.assemble(graph, &set, &layout.out_dir)
        }
        OutputMode::Default => assembler.assemble_internal(graph, &layout.out_dir),
    };

    match outcome {
        Ok(result) => Ok(Some(result)),
        Err(err) => {
            sink.emit(assembly_diagnostic(&err));
            Ok(None)
        }
    }
}

fn assembly_diagnostic(err: &AssemblyError) -> Diagnostic {
    let diag = Diagnostic::error(code::ASSEMBLY_FAILED, "failed to assemble the output tree")
        .with_note(err.to_string());
    match err {
        AssemblyError::Io { path, .. } => diag.with_path(path.clone()),
        AssemblyError::Conflict { path } => diag.with_path(path.clone()),
        AssemblyError::MissingOutput { key } | AssemblyError::NotReady { key } => diag.with_module(key.clone()),
        _ => diag,
    }
}

/// Replaces the cache manifest with the modules of a successful build.
fn record_build(cache: &mut Cache, graph: &ModuleGraph) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let reverse = graph.reverse_edges();
    for (id, node) in graph.iter() {
        cache.upsert(node.key.clone(), manifest_entry(graph, &reverse, id, now));
    }
    cache.retain(|key, _| graph.lookup(key).is_some());
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(mode: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let write = |rel: &str, content: &str| {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        };
        write(
            "keel.toml",
            &format!("entries = [\"app\"]\noutputMode = \"{mode}\"\n[project]\nname = \"demo\"\n"),
        );
        write("src/app.js", "const util = require('./util');\nrequire('left-pad');\n");
        write("src/util.js", "module.exports = 1;\n");
        write("src/unused.js", "module.exports = 2;\n");
        write("node_modules/left-pad/package.json", "{\"name\":\"left-pad\",\"main\":\"index.js\"}\n");
        write("node_modules/left-pad/index.js", "module.exports = () => {};\n");
        write("node_modules/unrelated/package.json", "{\"name\":\"unrelated\",\"main\":\"index.js\"}\n");
        write("node_modules/unrelated/index.js", "module.exports = 3;\n");
        tmp
    }

    fn global(dir: &TempDir) -> GlobalArgs {
        GlobalArgs {
            quiet: true,
            verbose: false,
            color: false,
            config: Some(dir.path().display().to_string()),
        }
    }

    fn args() -> BuildArgs {
        BuildArgs {
            out_dir: None,
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn standalone_build_writes_pruned_tree() {
        let tmp = project("standalone");
        assert_eq!(run(&args(), &global(&tmp)).unwrap(), 0);

        let out = tmp.path().join(".keel/standalone");
        assert!(out.join("server.js").is_file());
        assert!(out.join("src/app.js").is_file());
        assert!(out.join("src/util.js").is_file());
        assert!(out.join("node_modules/left-pad/index.js").is_file());
        assert!(!out.join("src/unused.js").exists());
        assert!(!out.join("node_modules/unrelated").exists());
    }

    #[test]
    fn default_build_writes_internal_modules_only() {
        let tmp = project("default");
        let args = BuildArgs {
            out_dir: Some("build".into()),
            format: ReportFormat::Json,
        };
        assert_eq!(run(&args, &global(&tmp)).unwrap(), 0);

        let out = tmp.path().join("build");
        assert!(out.join("src/app.js").is_file());
        assert!(!out.join("server.js").exists());
        assert!(!out.join("node_modules").exists());
    }

    #[test]
    fn build_records_cache_entries() {
        let tmp = project("standalone");
        run(&args(), &global(&tmp)).unwrap();

        let config = keel_config::load_config(tmp.path()).unwrap();
        let (cache, _) = Cache::open(&tmp.path().join(".keel/cache"), config.fingerprint()).unwrap();
        assert!(cache.entry("src/app.js").is_some());
        assert!(cache.entry("src/unused.js").is_none());
        assert_eq!(cache.gc().unwrap(), 0);
    }

    #[test]
    fn missing_import_fails_the_build() {
        let tmp = project("standalone");
        std::fs::write(tmp.path().join("src/util.js"), "require('./gone');\n").unwrap();
        assert_eq!(run(&args(), &global(&tmp)).unwrap(), 1);
        assert!(!tmp.path().join(".keel/standalone/server.js").exists());
    }

    #[test]
    fn missing_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(run(&args(), &global(&tmp)).is_err());
    }
}
