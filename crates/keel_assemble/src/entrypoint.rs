//! Synthesis of the runtime entrypoint script.

/// Renders an entrypoint that loads `entry_keys` in order, relative to the
/// directory the script lives in.
///
/// The output depends only on its inputs, so re-assembling an unchanged set
/// produces the same bytes.
pub fn render_entrypoint(entry_keys: &[String]) -> String {
    let mut script = String::from(
        "// Generated by keel. Loads the application from this directory only.\n\
         \"use strict\";\n\
         process.chdir(__dirname);\n",
    );
    for key in entry_keys {
        let specifier = format!("./{key}");
        // A JSON string literal is a valid JavaScript string literal.
        let literal = serde_json::to_string(&specifier).unwrap_or_else(|_| format!("\"{specifier}\""));
        script.push_str(&format!("require({literal});\n"));
    }
    script
}
