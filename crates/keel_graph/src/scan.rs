//! A pass-through front end that finds imports lexically.
//!
//! [`ScanFrontEnd`] copies source bytes to the output unchanged and reports
//! the `import`, `export ... from`, `require()` and `import()` forms it can
//! see in script sources. A `require` inside an `if`/`else`/`try`/`catch`
//! block or after `?`, `&&` or `||` in the same statement is reported as
//! conditional. It is good enough for projects whose sources need no
//! transformation and for exercising the engine end to end.

use std::path::Path;

use keel_cache::FormatTag;

use crate::front_end::{CompileFailure, CompileRequest, CompiledUnit, FrontEnd, ImportRequest};
use crate::node::ImportKind;

/// Lexical, non-transforming front end.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanFrontEnd;

impl FrontEnd for ScanFrontEnd {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
        let format = format_for(&request.path);
        let imports = match format {
            FormatTag::Script => {
                let text = std::str::from_utf8(&request.source)
                    .map_err(|e| CompileFailure::new(format!("source is not UTF-8: {e}")))?;
                scan_imports(text)?
            }
            FormatTag::Json => {
                serde_json::from_slice::<serde_json::Value>(&request.source)
                    .map_err(|e| CompileFailure::new(format!("invalid JSON: {e}")))?;
                Vec::new()
            }
            FormatTag::Asset => Vec::new(),
        };
        Ok(CompiledUnit {
            output: request.source.clone(),
            format,
            imports,
        })
    }
}

/// Output format implied by a file's extension.
pub fn format_for(path: &Path) -> FormatTag {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx") => FormatTag::Script,
        Some("json") => FormatTag::Json,
        _ => FormatTag::Asset,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    /// Template literal: text before the first substitution, and whether
    /// there is a substitution.
    Template(String, bool),
    Punct(char),
}

fn tokenize(src: &str) -> Result<Vec<Token>, CompileFailure> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            if i >= chars.len() {
                return Err(CompileFailure::new("unterminated block comment"));
            }
            i += 2;
        } else if c == '"' || c == '\'' {
            let mut value = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None | Some('\n') => return Err(CompileFailure::new("unterminated string literal")),
                    Some(&q) if q == c => break,
                    Some('\\') => {
                        if let Some(&escaped) = chars.get(i + 1) {
                            value.push(escaped);
                        }
                        i += 2;
                        continue;
                    }
                    Some(&other) => value.push(other),
                }
                i += 1;
            }
            i += 1;
            tokens.push(Token::Str(value));
        } else if c == '`' {
            let mut prefix = String::new();
            let mut interpolated = false;
            let mut depth = 0usize;
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(CompileFailure::new("unterminated template literal")),
                    Some('`') if depth == 0 => break,
                    Some('\\') => {
                        if !interpolated {
                            if let Some(&escaped) = chars.get(i + 1) {
                                prefix.push(escaped);
                            }
                        }
                        i += 2;
                        continue;
                    }
                    Some('$') if depth == 0 && chars.get(i + 1) == Some(&'{') => {
                        interpolated = true;
                        depth = 1;
                        i += 1;
                    }
                    Some('{') if depth > 0 => depth += 1,
                    Some('}') if depth > 0 => depth -= 1,
                    Some(&other) => {
                        if !interpolated {
                            prefix.push(other);
                        }
                    }
                }
                i += 1;
            }
            i += 1;
            tokens.push(Token::Template(prefix, interpolated));
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else {
            tokens.push(Token::Punct(c));
            i += 1;
        }
    }
    Ok(tokens)
}

fn scan_imports(src: &str) -> Result<Vec<ImportRequest>, CompileFailure> {
    let tokens = tokenize(src)?;
    let mut imports = Vec::new();

    // One entry per open brace: whether the block is guarded.
    let mut blocks: Vec<bool> = Vec::new();
    // A guard keyword was seen and its block has not opened yet.
    let mut block_guard = false;
    // The current statement contains a guard.
    let mut statement_guard = false;

    let punct = |i: usize, c: char| matches!(tokens.get(i), Some(Token::Punct(p)) if *p == c);

    let mut i = 0;
    while i < tokens.len() {
        let after_dot = i > 0 && punct(i - 1, '.');
        match &tokens[i] {
            Token::Punct('{') => {
                blocks.push(block_guard || blocks.last().copied().unwrap_or(false));
                block_guard = false;
                statement_guard = false;
            }
            Token::Punct('}') => {
                blocks.pop();
                statement_guard = false;
            }
            Token::Punct(';') => {
                block_guard = false;
                statement_guard = false;
            }
            Token::Punct('?') => statement_guard = true,
            Token::Punct('&') if punct(i + 1, '&') => statement_guard = true,
            Token::Punct('|') if punct(i + 1, '|') => statement_guard = true,
            Token::Ident(word) if !after_dot => match word.as_str() {
                "if" | "else" | "try" | "catch" | "finally" => {
                    block_guard = true;
                    statement_guard = word != "try" && word != "finally";
                }
                "require" if punct(i + 1, '(') => {
                    let guarded = statement_guard || blocks.last().copied().unwrap_or(false);
                    let kind = if guarded {
                        ImportKind::Conditional
                    } else {
                        ImportKind::Static
                    };
                    match tokens.get(i + 2) {
                        Some(Token::Str(s)) => imports.push(ImportRequest::literal(s, kind)),
                        Some(Token::Template(prefix, false)) => {
                            imports.push(ImportRequest::literal(prefix, kind))
                        }
                        Some(Token::Template(prefix, true)) => {
                            imports.push(ImportRequest::pattern(prefix))
                        }
                        _ => imports.push(ImportRequest::pattern("")),
                    }
                }
                "import" if punct(i + 1, '(') => match tokens.get(i + 2) {
                    Some(Token::Str(s)) => {
                        imports.push(ImportRequest::literal(s, ImportKind::Dynamic))
                    }
                    Some(Token::Template(prefix, false)) => {
                        imports.push(ImportRequest::literal(prefix, ImportKind::Dynamic))
                    }
                    Some(Token::Template(prefix, true)) => {
                        imports.push(ImportRequest::pattern(prefix))
                    }
                    _ => imports.push(ImportRequest::pattern("")),
                },
                "import" if punct(i + 1, '.') => {}
                "import" => {
                    if let Some(Token::Str(s)) = tokens.get(i + 1) {
                        imports.push(ImportRequest::literal(s, ImportKind::Static));
                        i += 1;
                    } else if let Some(end) = find_from(&tokens, i + 1) {
                        if let Some(Token::Str(s)) = tokens.get(end + 1) {
                            imports.push(ImportRequest::literal(s, ImportKind::Static));
                        }
                        i = end + 1;
                    }
                }
                "export" if punct(i + 1, '{') || punct(i + 1, '*') => {
                    if let Some(end) = find_from(&tokens, i + 1) {
                        if let Some(Token::Str(s)) = tokens.get(end + 1) {
                            imports.push(ImportRequest::literal(s, ImportKind::Static));
                        }
                        i = end + 1;
                    }
                }
                _ => {}
            },
            _ => {}
        }
        i += 1;
    }
    Ok(imports)
}

/// Finds the `from` keyword ending an import or re-export clause starting
/// at `start`. Gives up at a statement boundary.
fn find_from(tokens: &[Token], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, token) in tokens[start.min(tokens.len())..].iter().enumerate() {
        match token {
            Token::Punct('{') => depth += 1,
            Token::Punct('}') => depth = depth.saturating_sub(1),
            Token::Punct(';') if depth == 0 => return None,
            Token::Ident(word) if depth == 0 && word == "from" => {
                if matches!(tokens.get(start + offset + 1), Some(Token::Str(_))) {
                    return Some(start + offset);
                }
            }
            Token::Str(_) if depth == 0 => return None,
            _ => {}
        }
    }
    None
}
