//! Structured diagnostic messages anchored to modules and files.

use crate::code::DiagnosticCode;
use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A structured diagnostic message.
///
/// Each diagnostic carries a severity, a code, a message and, where known, the
/// identity of the module it concerns and the file path that failed. Build
/// errors name both so that the developer gets a precise file/specifier
/// reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// Identity of the module this diagnostic is attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// File path involved in the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Explanatory footnotes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    /// Actionable suggestions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub help: Vec<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, code: DiagnosticCode, message: String) -> Self {
        Self {
            severity,
            code,
            message,
            module: None,
            path: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message.into())
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message.into())
    }

    /// Creates a new note diagnostic.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Note, code, message.into())
    }

    /// Attaches the diagnostic to a module identity.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Records the file path involved.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message to this diagnostic.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{COMPILE_FAILED, IMPORT_CYCLE, OPTIONAL_IMPORT_UNRESOLVED};

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(COMPILE_FAILED, "unexpected token");
        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.message, "unexpected token");
        assert_eq!(format!("{}", diag.code), "E201");
    }

    #[test]
    fn create_warning_and_note() {
        let w = Diagnostic::warning(OPTIONAL_IMPORT_UNRESOLVED, "optional import missing");
        assert_eq!(w.severity, Severity::Warning);
        let n = Diagnostic::note(IMPORT_CYCLE, "cycle");
        assert_eq!(n.severity, Severity::Note);
    }

    #[test]
    fn builder_methods() {
        let diag = Diagnostic::error(COMPILE_FAILED, "bad syntax")
            .with_module("src/broken.js")
            .with_path("/project/src/broken.js")
            .with_note("the front end rejected this module")
            .with_help("fix the module and save again");
        assert_eq!(diag.module.as_deref(), Some("src/broken.js"));
        assert_eq!(diag.path, Some(PathBuf::from("/project/src/broken.js")));
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }

    #[test]
    fn json_omits_empty_fields() {
        let diag = Diagnostic::error(COMPILE_FAILED, "oops");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("module"));
        assert!(!json.contains("notes"));
        let back: Diagnostic = serde_json::from_str(&json).unwrap();
        assert_eq!(back, diag);
    }
}
