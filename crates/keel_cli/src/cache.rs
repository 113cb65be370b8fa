//! The `keel cache` commands.

use keel_cache::{Cache, CacheOpen};

use crate::pipeline::{load_project, status};
use crate::{CacheCommand, GlobalArgs};

/// Runs `keel cache clean` or `keel cache gc`.
pub fn run(action: CacheCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (config, layout) = load_project(global, None)?;
    let (mut cache, opened) = Cache::open(&layout.cache_dir, config.fingerprint())?;

    match action {
        CacheCommand::Clean => {
            cache.clear()?;
            status(global, "Cleaned", layout.cache_dir.display());
        }
        CacheCommand::Gc => {
            if let CacheOpen::Reset { reason } | CacheOpen::Recovered { reason } = &opened {
                status(global, "Discarded", reason);
            }
            let removed = cache.gc()?;
            status(
                global,
                "Collected",
                format!("{removed} unreferenced blob(s), {} entries kept", cache.entries().count()),
            );
        }
    }
    Ok(0)
}
