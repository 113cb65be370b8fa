//! Module graph construction.
//!
//! A [`ModuleGraph`] is an arena of [`ModuleNode`]s whose edges are index
//! lists, so mutual imports form cycles in the data without forming cycles
//! in ownership. The [`GraphBuilder`] fills it from a set of entry
//! specifiers: it resolves each import with the [`Resolver`], reuses
//! compiled units from the content-addressed store when the source hash
//! matches, and otherwise asks the external [`FrontEnd`] to compile.

#![warn(missing_docs)]

pub mod arena;
pub mod builder;
pub mod error;
pub mod front_end;
pub mod graph;
pub mod ids;
pub mod node;
pub mod resolve;
pub mod scan;

pub use builder::{BuildOptions, BuildStats, CompiledModule, GraphBuilder, LinkOutcome};
pub use error::{CompileError, GraphError, ResolutionError};
pub use front_end::{
    ChannelFrontEnd, CompileFailure, CompileJob, CompileRequest, CompiledUnit, FrontEnd,
    ImportRequest, ImportSpecifier,
};
pub use graph::ModuleGraph;
pub use ids::ModuleId;
pub use node::{Edge, EdgeTarget, ImportKind, ModuleNode, NodeState, PackageRef};
pub use resolve::{Resolved, Resolver};
pub use scan::ScanFrontEnd;

use keel_cache::{BlobStore, CacheError};
use keel_common::ContentHash;

/// Reads the compiled output stored under `source_hash`.
///
/// Returns `Ok(None)` if the store has no unit for the hash.
pub fn load_output(blobs: &BlobStore, source_hash: &ContentHash) -> Result<Option<Vec<u8>>, CacheError> {
    let Some(blob) = blobs.get(source_hash)? else {
        return Ok(None);
    };
    let unit = CompiledUnit::decode(&blob.payload).map_err(|e| CacheError::Corrupted {
        path: blobs.blob_path(source_hash),
        reason: format!("undecodable compiled unit: {e}"),
    })?;
    Ok(Some(unit.output))
}
