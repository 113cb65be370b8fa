//! Error types for graph construction.

use std::path::PathBuf;

use keel_cache::CacheError;
use keel_common::InternalError;

/// A specifier could not be mapped to a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot resolve `{specifier}`{}: {reason}", importer_suffix(.importer))]
pub struct ResolutionError {
    /// The specifier as written.
    pub specifier: String,
    /// Key of the importing module; `None` for entries.
    pub importer: Option<String>,
    /// Why resolution failed.
    pub reason: String,
}

fn importer_suffix(importer: &Option<String>) -> String {
    match importer {
        Some(key) => format!(" from `{key}`"),
        None => " (entry)".to_string(),
    }
}

impl ResolutionError {
    /// Creates a resolution error.
    pub fn new(specifier: impl Into<String>, importer: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            importer: importer.map(str::to_string),
            reason: reason.into(),
        }
    }
}

/// The front end rejected a module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to compile `{key}`: {message}")]
pub struct CompileError {
    /// Key of the rejected module.
    pub key: String,
    /// Source file of the rejected module.
    pub path: PathBuf,
    /// The front end's message.
    pub message: String,
}

/// Errors raised while building or extending a module graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A specifier could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A module failed to compile.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The blob store failed outside an integrity check.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// An engine invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// Several modules failed in the same build.
    #[error("{} modules failed", .0.len())]
    Multiple(Vec<GraphError>),
}

impl GraphError {
    /// Collapses a list of errors: one error stays as is, several become
    /// [`GraphError::Multiple`]. Returns `None` for an empty list.
    pub fn from_many(mut errors: Vec<GraphError>) -> Option<GraphError> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(GraphError::Multiple(errors)),
        }
    }

    /// Flattens nested [`GraphError::Multiple`] values.
    pub fn flatten(self) -> Vec<GraphError> {
        match self {
            GraphError::Multiple(errors) => errors.into_iter().flat_map(GraphError::flatten).collect(),
            other => vec![other],
        }
    }

    /// Key of the module the error is attributed to.
    pub fn module_key(&self) -> Option<&str> {
        match self {
            GraphError::Resolution(e) => e.importer.as_deref(),
            GraphError::Compile(e) => Some(&e.key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_display_names_importer() {
        let err = ResolutionError::new("./missing", Some("src/app.js"), "no matching file");
        assert_eq!(
            err.to_string(),
            "cannot resolve `./missing` from `src/app.js`: no matching file"
        );
        let entry = ResolutionError::new("app", None, "no matching file");
        assert!(entry.to_string().contains("(entry)"));
    }

    #[test]
    fn from_many_collapses() {
        assert!(GraphError::from_many(vec![]).is_none());
        let one = GraphError::from_many(vec![ResolutionError::new("a", None, "x").into()]).unwrap();
        assert!(matches!(one, GraphError::Resolution(_)));
        let many = GraphError::from_many(vec![
            ResolutionError::new("a", None, "x").into(),
            ResolutionError::new("b", None, "y").into(),
        ])
        .unwrap();
        assert_eq!(many.to_string(), "2 modules failed");
        assert_eq!(many.flatten().len(), 2);
    }

    #[test]
    fn module_key_attribution() {
        let err: GraphError = CompileError {
            key: "src/broken.js".into(),
            path: PathBuf::from("/p/src/broken.js"),
            message: "unexpected token".into(),
        }
        .into();
        assert_eq!(err.module_key(), Some("src/broken.js"));
        assert!(err.to_string().contains("unexpected token"));
    }
}
