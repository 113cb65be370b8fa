//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The category of a diagnostic code, determining its prefix letter.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Error diagnostics, prefixed with `E`.
    Error,
    /// Warning diagnostics, prefixed with `W`.
    Warning,
    /// Informational notes, prefixed with `N`.
    Note,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Error => 'E',
            Category::Warning => 'W',
            Category::Note => 'N',
        }
    }
}

/// A structured diagnostic code combining a category prefix and a numeric identifier.
///
/// Displayed as the category prefix followed by a zero-padded 3-digit number,
/// e.g. `E101`, `W402`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

/// A specifier could not be mapped to a module.
pub const UNRESOLVED_IMPORT: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);
/// A production entry specifier could not be mapped to a module.
pub const UNRESOLVED_ENTRY: DiagnosticCode = DiagnosticCode::new(Category::Error, 102);
/// The compilation front end rejected a module.
pub const COMPILE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 201);
/// Writing the standalone artifact failed.
pub const ASSEMBLY_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);
/// The persisted cache failed its integrity check and was discarded.
pub const CACHE_DISCARDED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 401);
/// An optional (conditional or dynamic) import was left unresolved.
pub const OPTIONAL_IMPORT_UNRESOLVED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 402);
/// Modules import each other in a cycle.
pub const IMPORT_CYCLE: DiagnosticCode = DiagnosticCode::new(Category::Note, 501);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_prefixes() {
        assert_eq!(Category::Error.prefix(), 'E');
        assert_eq!(Category::Warning.prefix(), 'W');
        assert_eq!(Category::Note.prefix(), 'N');
    }

    #[test]
    fn display_format() {
        assert_eq!(format!("{UNRESOLVED_IMPORT}"), "E101");
        assert_eq!(format!("{CACHE_DISCARDED}"), "W401");
        let code = DiagnosticCode::new(Category::Note, 3);
        assert_eq!(format!("{code}"), "N003");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&COMPILE_FAILED).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, COMPILE_FAILED);
    }
}
