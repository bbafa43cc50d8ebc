//! Restoration engine
//!
//! Inverse of the strategies: locate every placeholder token and substitute
//! the concrete value, with the originating format's structural awareness.
//! In structured data a quoted string holding exactly one token un-quotes
//! when the value is itself a valid bare scalar, so `8080 → "{{PORT}}"`
//! round-trips back to a number; string values are escaped for the host
//! syntax. Prose, markup, and component content substitute the token text
//! verbatim — convert never rewrote the surrounding syntax, so neither
//! does restore.
//!
//! A token with no ValueMap entry fails the whole file. Partial restoration
//! of a single file is never permitted; sibling files are unaffected.

use std::ops::Range;

use aho_corasick::AhoCorasick;
use memchr::{memchr, memmem};
use regex::Regex;
use tracing::trace;

use crate::core::change::{token_for, ValueMap};
use crate::core::dispatch::FileFormat;
use crate::core::error::{Error, Result};

/// Restore all tokens in one file's content. Returns the restored content
/// and the number of token occurrences replaced.
pub fn restore(format: FileFormat, content: &str, values: &ValueMap) -> Result<(String, usize)> {
    // Sweep for every engine-shaped token first: an undeclared one fails
    // the file before any substitution happens.
    let sweep = Regex::new(r"\{\{([A-Z][A-Z0-9_]*)\}\}").expect("static pattern");
    let mut seen_any = false;
    for caps in sweep.captures_iter(content) {
        seen_any = true;
        let name = &caps[1];
        if !values.contains_key(name) {
            return Err(Error::PlaceholderMismatch {
                token: name.to_string(),
            });
        }
    }
    if !seen_any {
        return Ok((content.to_string(), 0));
    }

    let patterns: Vec<String> = values.keys().map(|name| token_for(name)).collect();
    let automaton = AhoCorasick::new(&patterns)
        .map_err(|e| Error::Parse(format!("placeholder set too large: {e}")))?;

    let structured = matches!(format, FileFormat::Json | FileFormat::Toml);
    let bytes = content.as_bytes();

    // TOML literal strings interpret no escape sequences, so substitutions
    // inside them must be verbatim. Map the literal regions up front.
    let literal_spans = if format == FileFormat::Toml {
        toml_literal_spans(content)
    } else {
        Vec::new()
    };

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0usize;
    let mut replaced = 0usize;

    for m in automaton.find_iter(content) {
        let token = &patterns[m.pattern().as_usize()];
        let value = &values[m.pattern().as_usize()];
        trace!(token = %token, "restoring token");

        let literal = literal_spans
            .iter()
            .find(|(span, _)| span.start <= m.start() && m.end() <= span.end);

        // Quoted-exact position: `"{{NAME}}"` with the quotes adjacent.
        let quoted_exact = structured
            && literal.is_none()
            && m.start() > 0
            && bytes[m.start() - 1] == b'"'
            && bytes.get(m.end()) == Some(&b'"')
            && m.start() - 1 >= cursor;

        if quoted_exact && is_bare_scalar(format, value) {
            out.push_str(&content[cursor..m.start() - 1]);
            out.push_str(value);
            cursor = m.end() + 1;
        } else {
            out.push_str(&content[cursor..m.start()]);
            match literal {
                Some((_, multiline)) => {
                    let fits = if *multiline {
                        !value.contains("'''")
                    } else {
                        !value.contains('\'') && !value.contains('\n')
                    };
                    if !fits {
                        return Err(Error::Parse(format!(
                            "value for {token} cannot be represented in a TOML literal string"
                        )));
                    }
                    out.push_str(value);
                }
                None if structured => push_escaped(&mut out, value),
                None => out.push_str(value),
            }
            cursor = m.end();
        }
        replaced += 1;
    }
    out.push_str(&content[cursor..]);

    Ok((out, replaced))
}

/// Can `value` stand in raw value position for this format?
fn is_bare_scalar(format: FileFormat, value: &str) -> bool {
    match format {
        FileFormat::Json => matches!(value, "true" | "false" | "null")
            || serde_json::from_str::<serde_json::Number>(value).is_ok(),
        FileFormat::Toml => {
            matches!(value, "true" | "false")
                || value.parse::<i64>().is_ok()
                || value.parse::<f64>().is_ok()
        }
        _ => false,
    }
}

/// Escape a value for double-quoted string context (JSON and TOML basic
/// strings share these sequences).
fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
}

/// Interpret the escape sequences of a double-quoted (basic) string body.
/// Inverse of [`push_escaped`], plus the remaining JSON short escapes and
/// `\uXXXX`. Malformed sequences are kept as written.
pub(crate) fn unescape_basic(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Inner spans of TOML literal strings (`'...'` and `'''...'''`). The flag
/// marks the multi-line form. Basic strings and comments are skipped so a
/// quote character inside them cannot open a phantom literal.
fn toml_literal_spans(content: &str) -> Vec<(Range<usize>, bool)> {
    let bytes = content.as_bytes();
    let mut spans = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        match bytes[pos] {
            b'#' => {
                pos = memchr(b'\n', &bytes[pos..]).map_or(bytes.len(), |n| pos + n + 1);
            }
            b'"' => {
                if bytes[pos..].starts_with(b"\"\"\"") {
                    pos = match basic_string_end(bytes, pos + 3, true) {
                        Some(end) => end + 3,
                        None => bytes.len(),
                    };
                } else {
                    pos = match basic_string_end(bytes, pos + 1, false) {
                        Some(end) => end + 1,
                        None => bytes.len(),
                    };
                }
            }
            b'\'' => {
                if bytes[pos..].starts_with(b"'''") {
                    let start = pos + 3;
                    match memmem::find(&bytes[start..], b"'''") {
                        Some(rel) => {
                            spans.push((start..start + rel, true));
                            pos = start + rel + 3;
                        }
                        None => pos = bytes.len(),
                    }
                } else {
                    let start = pos + 1;
                    let line_end = memchr(b'\n', &bytes[start..]).map_or(bytes.len(), |n| start + n);
                    match memchr(b'\'', &bytes[start..line_end]) {
                        Some(rel) => {
                            spans.push((start..start + rel, false));
                            pos = start + rel + 1;
                        }
                        // Unterminated literal; resume on the next line.
                        None => pos = line_end,
                    }
                }
            }
            _ => pos += 1,
        }
    }
    spans
}

/// Offset of the closing quote of a basic string whose body starts at `pos`.
fn basic_string_end(bytes: &[u8], mut pos: usize, multiline: bool) -> Option<usize> {
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' if multiline => {
                if bytes[pos..].starts_with(b"\"\"\"") {
                    return Some(pos);
                }
                pos += 1;
            }
            b'"' => return Some(pos),
            b'\n' if !multiline => return Some(pos),
            _ => pos += 1,
        }
    }
    None
}
