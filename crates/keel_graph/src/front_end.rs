//! The compilation front end seam.
//!
//! keel does not compile source languages itself. A [`FrontEnd`] turns a
//! module's source bytes into a [`CompiledUnit`]: the output bytes plus the
//! imports the module makes. [`ChannelFrontEnd`] puts the front end behind a
//! request/response channel so it can live on its own thread, or be driven
//! by a test that answers requests by hand.

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use keel_cache::FormatTag;
use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::node::ImportKind;

/// A module the front end is asked to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Module key.
    pub key: String,
    /// Absolute source path.
    pub path: PathBuf,
    /// Source bytes.
    pub source: Vec<u8>,
    /// Whether the module belongs to a third-party package.
    pub external: bool,
}

/// How an import names its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportSpecifier {
    /// A string literal.
    Literal(String),
    /// A computed specifier; holds its static prefix, possibly empty.
    Pattern(String),
}

/// One import reported by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    /// The import's target.
    pub specifier: ImportSpecifier,
    /// The import's kind.
    pub kind: ImportKind,
}

impl ImportRequest {
    /// A static import of a literal specifier.
    pub fn literal(specifier: impl Into<String>, kind: ImportKind) -> Self {
        Self {
            specifier: ImportSpecifier::Literal(specifier.into()),
            kind,
        }
    }

    /// A dynamic import with a computed specifier.
    pub fn pattern(prefix: impl Into<String>) -> Self {
        Self {
            specifier: ImportSpecifier::Pattern(prefix.into()),
            kind: ImportKind::Dynamic,
        }
    }
}

/// The front end's result for one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledUnit {
    /// Compiled output bytes.
    pub output: Vec<u8>,
    /// Output format.
    pub format: FormatTag,
    /// Imports in source order.
    pub imports: Vec<ImportRequest>,
}

impl CompiledUnit {
    /// Hash of the output bytes.
    pub fn output_hash(&self) -> ContentHash {
        ContentHash::from_bytes(&self.output)
    }

    /// Encodes the unit for the blob store.
    pub fn encode(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    /// Decodes a unit read from the blob store.
    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let (unit, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(unit)
    }
}

/// The front end rejected a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    /// Human-readable reason.
    pub message: String,
}

impl CompileFailure {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Compiles one module at a time. Called from several worker threads at once.
pub trait FrontEnd: Send + Sync {
    /// Compiles `request`. A failure is final for this source content.
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure>;
}

/// A compile request travelling to a channel-backed front end.
#[derive(Debug)]
pub struct CompileJob {
    request: CompileRequest,
    reply: mpsc::Sender<Result<CompiledUnit, CompileFailure>>,
}

impl CompileJob {
    /// The module to compile.
    pub fn request(&self) -> &CompileRequest {
        &self.request
    }

    /// Sends the result back. A caller that gave up waiting is ignored.
    pub fn respond(self, result: Result<CompiledUnit, CompileFailure>) {
        let _ = self.reply.send(result);
    }
}

/// A [`FrontEnd`] that forwards every request over a channel and blocks on
/// the reply.
#[derive(Debug, Clone)]
pub struct ChannelFrontEnd {
    jobs: mpsc::Sender<CompileJob>,
}

impl ChannelFrontEnd {
    /// Creates the front end and the receiving end of its job queue.
    pub fn new() -> (Self, mpsc::Receiver<CompileJob>) {
        let (jobs, rx) = mpsc::channel();
        (Self { jobs }, rx)
    }

    /// Runs `front_end` on a dedicated thread serving this channel's jobs.
    ///
    /// The thread exits once every `ChannelFrontEnd` clone is dropped.
    pub fn spawn<F: FrontEnd + 'static>(front_end: F) -> (Self, JoinHandle<()>) {
        let (channel, rx) = Self::new();
        let handle = std::thread::spawn(move || {
            for job in rx {
                let result = front_end.compile(job.request());
                job.respond(result);
            }
        });
        (channel, handle)
    }
}

impl FrontEnd for ChannelFrontEnd {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
        let (reply, response) = mpsc::channel();
        let job = CompileJob {
            request: request.clone(),
            reply,
        };
        self.jobs
            .send(job)
            .map_err(|_| CompileFailure::new("front end is not running"))?;
        response
            .recv()
            .map_err(|_| CompileFailure::new("front end dropped the request"))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl FrontEnd for Upper {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
            if request.source.is_empty() {
                return Err(CompileFailure::new("empty module"));
            }
            Ok(CompiledUnit {
                output: request.source.to_ascii_uppercase(),
                format: FormatTag::Script,
                imports: vec![ImportRequest::literal("./dep", ImportKind::Static)],
            })
        }
    }

    fn request(source: &str) -> CompileRequest {
        CompileRequest {
            key: "src/a.js".into(),
            path: PathBuf::from("/p/src/a.js"),
            source: source.as_bytes().to_vec(),
            external: false,
        }
    }

    #[test]
    fn unit_encoding_roundtrip() {
        let unit = Upper.compile(&request("abc")).unwrap();
        let decoded = CompiledUnit::decode(&unit.encode().unwrap()).unwrap();
        assert_eq!(decoded, unit);
        assert_eq!(decoded.output_hash(), ContentHash::from_bytes(b"ABC"));
    }

    #[test]
    fn spawned_channel_front_end() {
        let (front_end, handle) = ChannelFrontEnd::spawn(Upper);
        assert_eq!(front_end.compile(&request("x")).unwrap().output, b"X");
        assert_eq!(
            front_end.compile(&request("")).unwrap_err().message,
            "empty module"
        );
        drop(front_end);
        handle.join().unwrap();
    }

    #[test]
    fn requests_answered_by_hand() {
        let (front_end, jobs) = ChannelFrontEnd::new();
        let server = std::thread::spawn(move || {
            let job = jobs.recv().unwrap();
            assert_eq!(job.request().key, "src/a.js");
            job.respond(Err(CompileFailure::new("rejected")));
        });
        let err = front_end.compile(&request("x")).unwrap_err();
        assert_eq!(err.message, "rejected");
        server.join().unwrap();
    }

    #[test]
    fn dropped_server_is_a_failure() {
        let (front_end, jobs) = ChannelFrontEnd::new();
        drop(jobs);
        let err = front_end.compile(&request("x")).unwrap_err();
        assert!(err.message.contains("not running"));
    }
}
