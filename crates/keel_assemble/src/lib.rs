//! Standalone artifact assembly.
//!
//! Given a module graph and the reachability set computed from its
//! production entries, the [`Assembler`] copies every reachable compiled
//! output into a self-contained directory, together with the
//! `package.json` of each package still in use and a synthesized
//! entrypoint. A `keel-assembly.json` manifest records what was written so
//! the next run can remove files that are no longer part of the output.

#![warn(missing_docs)]

pub mod assembler;
pub mod entrypoint;
pub mod error;
pub mod manifest;

pub use assembler::{list_tree, Assembler, AssemblyResult, DEFAULT_ENTRYPOINT};
pub use entrypoint::render_entrypoint;
pub use error::AssemblyError;
pub use manifest::{AssemblyManifest, FileOrigin, WrittenFile, ASSEMBLY_MANIFEST};
