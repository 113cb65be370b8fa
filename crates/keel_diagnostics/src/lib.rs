//! Diagnostic creation, severity management, and rendering.
//!
//! Build problems are reported as structured [`Diagnostic`] messages anchored
//! to a module identity and file path rather than to source spans: the engine
//! never sees source text positions, only compiled units and their imports.
//! The thread-safe [`DiagnosticSink`] accumulates diagnostics across parallel
//! compile waves and hands them out in a stable order with a [`Tally`].
//! [`DiagnosticRenderer`] implementations format them for the terminal or as
//! JSON lines for a live client.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::{DiagnosticSink, Tally};
