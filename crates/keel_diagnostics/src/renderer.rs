//! Diagnostic rendering backends for human-readable and machine-readable output.

use crate::diagnostic::Diagnostic;

/// Trait for rendering diagnostics into formatted output strings.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic) -> String;
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// ```text
/// error[E101]: cannot resolve 'lodash' from src/app.js
///   --> src/app.js (/project/src/app.js)
///    = note: ...
///    = help: ...
/// ```
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in output.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint_header(&self, diag: &Diagnostic) -> String {
        let header = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return header;
        }
        let ansi = match diag.severity {
            crate::Severity::Error => "\x1b[1;31m",
            crate::Severity::Warning => "\x1b[1;33m",
            crate::Severity::Note => "\x1b[1;36m",
        };
        format!("{ansi}{header}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        let mut out = format!("{}: {}\n", self.paint_header(diag), diag.message);

        match (&diag.module, &diag.path) {
            (Some(module), Some(path)) => {
                out.push_str(&format!("  --> {module} ({})\n", path.display()));
            }
            (Some(module), None) => out.push_str(&format!("  --> {module}\n")),
            (None, Some(path)) => out.push_str(&format!("  --> {}\n", path.display())),
            (None, None) => {}
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }

        out
    }
}

/// Renders each diagnostic as a single JSON object on one line.
#[derive(Default)]
pub struct JsonRenderer;

impl DiagnosticRenderer for JsonRenderer {
    fn render(&self, diag: &Diagnostic) -> String {
        serde_json::to_string(diag).unwrap_or_else(|e| {
            format!(r#"{{"severity":"error","message":"unrenderable diagnostic: {e}"}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{COMPILE_FAILED, UNRESOLVED_IMPORT};

    #[test]
    fn terminal_plain_output() {
        let diag = Diagnostic::error(UNRESOLVED_IMPORT, "cannot resolve 'lodash'")
            .with_module("src/app.js")
            .with_path("/p/src/app.js")
            .with_help("install the package");
        let out = TerminalRenderer::new(false).render(&diag);
        assert!(out.starts_with("error[E101]: cannot resolve 'lodash'\n"));
        assert!(out.contains("  --> src/app.js (/p/src/app.js)\n"));
        assert!(out.contains("   = help: install the package\n"));
    }

    #[test]
    fn terminal_color_wraps_header() {
        let diag = Diagnostic::error(COMPILE_FAILED, "bad");
        let out = TerminalRenderer::new(true).render(&diag);
        assert!(out.starts_with("\x1b[1;31merror[E201]\x1b[0m: bad"));
    }

    #[test]
    fn json_is_single_line() {
        let diag = Diagnostic::error(COMPILE_FAILED, "bad").with_module("src/a.js");
        let out = JsonRenderer.render(&diag);
        assert!(!out.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["module"], "src/a.js");
        assert_eq!(value["severity"], "error");
    }
}
