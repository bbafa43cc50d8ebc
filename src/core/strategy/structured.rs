//! Structured-data strategy (JSON, TOML)
//!
//! Selectors are dotted paths (`name`, `author.name`, `deps.0`). Leaves are
//! located by hand-rolled, span-tracking scanners over the raw text so the
//! surrounding structural syntax, key order, and whitespace survive exactly.
//! serde_json / toml validate the document first (with skip markers masked
//! out, since those ride in comment syntax the grammars reject).
//!
//! String leaves yield the span inside the quotes; any other scalar yields
//! the full literal and quotes the token, because a bare `{{NAME}}` is not
//! valid JSON or TOML.

use std::ops::Range;

use memchr::memmem;

use crate::core::change::line_col;
use crate::core::dispatch::FileFormat;
use crate::core::error::{Error, Result};
use crate::core::strategy::{Candidate, Resolution, Strategy};

/// One addressable scalar in a structured document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leaf {
    pub path: String,
    pub span: Range<usize>,
    pub string: bool,
}

pub struct StructuredStrategy {
    format: FileFormat,
}

impl StructuredStrategy {
    pub fn new(format: FileFormat) -> Self {
        debug_assert!(matches!(format, FileFormat::Json | FileFormat::Toml));
        Self { format }
    }

    fn leaves(&self, content: &str) -> Result<Vec<Leaf>> {
        // Skip directives use `//` comment syntax the host grammar rejects;
        // blank them (offset-preserving) before serde validation.
        let masked = mask_skip_markers(content);
        match self.format {
            FileFormat::Json => {
                serde_json::from_str::<serde_json::Value>(&masked)
                    .map_err(|e| Error::Parse(format!("invalid JSON: {e}")))?;
                JsonScanner::new(content).scan()
            }
            FileFormat::Toml => {
                toml::from_str::<toml::Value>(&masked)
                    .map_err(|e| Error::Parse(format!("invalid TOML: {e}")))?;
                scan_toml(content)
            }
            _ => unreachable!("structured strategy only binds json/toml"),
        }
    }
}

impl Strategy for StructuredStrategy {
    fn resolve(&self, content: &str, selector: &str, _attribute: Option<&str>) -> Result<Resolution> {
        if selector.is_empty() || selector.split('.').any(str::is_empty) {
            return Err(Error::InvalidSelector {
                selector: selector.to_string(),
                reason: "path segments must be non-empty".to_string(),
            });
        }

        let mut resolution = Resolution::default();
        for leaf in self.leaves(content)? {
            if leaf.path == selector {
                resolution.candidates.push(if leaf.string {
                    Candidate::new(selector, leaf.span)
                } else {
                    Candidate::quoted(selector, leaf.span)
                });
            }
        }
        Ok(resolution)
    }
}

fn mask_skip_markers(content: &str) -> String {
    let mut masked = content.as_bytes().to_vec();
    // End marker first: the start marker is its prefix.
    for marker in ["// @template-skip-end", "// @template-skip"] {
        let mut pos = 0;
        while let Some(hit) = memmem::find(&masked[pos..], marker.as_bytes()) {
            let at = pos + hit;
            masked[at..at + marker.len()].fill(b' ');
            pos = at + marker.len();
        }
    }
    // Masking never splits a UTF-8 sequence: markers are pure ASCII.
    String::from_utf8(masked).expect("masking preserves UTF-8")
}

// --- JSON ---------------------------------------------------------------

struct JsonScanner<'a> {
    content: &'a str,
    bytes: &'a [u8],
    pos: usize,
    leaves: Vec<Leaf>,
}

impl<'a> JsonScanner<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            content,
            bytes: content.as_bytes(),
            pos: 0,
            leaves: Vec::new(),
        }
    }

    fn scan(mut self) -> Result<Vec<Leaf>> {
        self.skip_trivia();
        let mut path = Vec::new();
        self.value(&mut path)?;
        self.skip_trivia();
        if self.pos != self.bytes.len() {
            return Err(self.error("trailing content after document root"));
        }
        Ok(self.leaves)
    }

    fn error(&self, msg: &str) -> Error {
        let (line, col) = line_col(self.content, self.pos);
        Error::Parse(format!("{msg} at line {line}, column {col}"))
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Whitespace plus `//` line comments (skip-directive carrier).
    fn skip_trivia(&mut self) {
        loop {
            while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
                self.pos += 1;
            }
            if self.bytes[self.pos..].starts_with(b"//") {
                match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
                    Some(nl) => self.pos += nl + 1,
                    None => self.pos = self.bytes.len(),
                }
            } else {
                return;
            }
        }
    }

    fn value(&mut self, path: &mut Vec<String>) -> Result<()> {
        match self.peek() {
            Some(b'{') => self.object(path),
            Some(b'[') => self.array(path),
            Some(b'"') => {
                let inner = self.string()?;
                self.leaves.push(Leaf {
                    path: path.join("."),
                    span: inner,
                    string: true,
                });
                Ok(())
            }
            Some(_) => {
                let span = self.scalar()?;
                self.leaves.push(Leaf {
                    path: path.join("."),
                    span,
                    string: false,
                });
                Ok(())
            }
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self, path: &mut Vec<String>) -> Result<()> {
        self.pos += 1; // '{'
        self.skip_trivia();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(());
        }
        loop {
            self.skip_trivia();
            if self.peek() != Some(b'"') {
                return Err(self.error("expected object key"));
            }
            let key_span = self.string()?;
            let key = self.content[key_span].to_string();

            self.skip_trivia();
            if self.peek() != Some(b':') {
                return Err(self.error("expected ':' after key"));
            }
            self.pos += 1;
            self.skip_trivia();

            path.push(key);
            self.value(path)?;
            path.pop();

            self.skip_trivia();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn array(&mut self, path: &mut Vec<String>) -> Result<()> {
        self.pos += 1; // '['
        self.skip_trivia();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(());
        }
        let mut index = 0usize;
        loop {
            self.skip_trivia();
            path.push(index.to_string());
            self.value(path)?;
            path.pop();
            index += 1;

            self.skip_trivia();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(self.error("expected ',' or ']'")),
            }
        }
    }

    /// Consume a string literal; return the span inside the quotes.
    fn string(&mut self) -> Result<Range<usize>> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        let start = self.pos + 1;
        self.pos += 1;
        while let Some(b) = self.peek() {
            match b {
                b'\\' => self.pos += 2,
                b'"' => {
                    let span = start..self.pos;
                    self.pos += 1;
                    return Ok(span);
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error("unterminated string"))
    }

    fn scalar(&mut self) -> Result<Range<usize>> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b',' | b'}' | b']' | b' ' | b'\t' | b'\r' | b'\n') {
                break;
            }
            self.pos += 1;
        }
        let text = &self.content[start..self.pos];
        let valid = matches!(text, "true" | "false" | "null") || text.parse::<f64>().is_ok();
        if text.is_empty() || !valid {
            return Err(self.error("expected a JSON value"));
        }
        Ok(start..self.pos)
    }
}

// --- TOML ---------------------------------------------------------------

/// Line-oriented TOML leaf scanner. Tables, dotted keys, and the three
/// string forms are handled; arrays and inline tables are containers and
/// never addressable as leaves.
fn scan_toml(content: &str) -> Result<Vec<Leaf>> {
    let mut leaves = Vec::new();
    let mut table: Vec<String> = Vec::new();
    let bytes = content.as_bytes();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let line_end = memchr::memchr(b'\n', &bytes[pos..]).map_or(bytes.len(), |n| pos + n);
        let line = &content[pos..line_end];
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        let line_start = pos + indent;

        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
            pos = line_end + 1;
            continue;
        }

        if let Some(header) = trimmed.strip_prefix('[') {
            let header = header.strip_prefix('[').unwrap_or(header);
            let Some(close) = header.find(']') else {
                return Err(toml_error(content, line_start, "unclosed table header"));
            };
            table = split_key(&header[..close]);
            pos = line_end + 1;
            continue;
        }

        let Some(eq) = trimmed.find('=') else {
            return Err(toml_error(content, line_start, "expected 'key = value'"));
        };
        let key_part = trimmed[..eq].trim();
        if key_part.is_empty() {
            return Err(toml_error(content, line_start, "empty key"));
        }
        let mut path = table.clone();
        path.extend(split_key(key_part));

        // Offset of the first value byte.
        let after_eq = &trimmed[eq + 1..];
        let value_off = line_start + eq + 1 + (after_eq.len() - after_eq.trim_start().len());
        let (leaf, next) = toml_value(content, value_off, path.join("."))?;
        if let Some(leaf) = leaf {
            leaves.push(leaf);
        }
        // Multi-line strings may have consumed beyond this line.
        pos = next.max(line_end + 1);
    }

    Ok(leaves)
}

fn toml_error(content: &str, pos: usize, msg: &str) -> Error {
    let (line, _) = line_col(content, pos);
    Error::Parse(format!("{msg} at line {line}"))
}

/// Split a (possibly dotted, possibly quoted) TOML key into segments.
fn split_key(key: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in key.chars() {
        match (c, quote) {
            ('"' | '\'', None) => quote = Some(c),
            (q, Some(open)) if q == open => quote = None,
            ('.', None) => {
                parts.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(c),
        }
    }
    parts.push(current.trim().to_string());
    parts
}

/// Parse one TOML value starting at `pos`. Returns the leaf (if the value
/// is an addressable scalar) and the scan position after the value.
fn toml_value(content: &str, pos: usize, path: String) -> Result<(Option<Leaf>, usize)> {
    let rest = &content[pos..];

    for delim in ["\"\"\"", "'''"] {
        if let Some(body) = rest.strip_prefix(delim) {
            let Some(close) = body.find(delim) else {
                return Err(toml_error(content, pos, "unterminated multi-line string"));
            };
            let start = pos + delim.len();
            return Ok((
                Some(Leaf {
                    path,
                    span: start..start + close,
                    string: true,
                }),
                start + close + delim.len(),
            ));
        }
    }

    if let Some(quote @ ('"' | '\'')) = rest.chars().next() {
        let body = &rest[1..];
        let mut bytes = body.bytes().enumerate();
        let close = loop {
            match bytes.next() {
                Some((_, b'\\')) if quote == '"' => {
                    let _ = bytes.next();
                }
                Some((i, b)) if b == quote as u8 => break i,
                Some(_) => {}
                None => return Err(toml_error(content, pos, "unterminated string")),
            }
        };
        let start = pos + 1;
        return Ok((
            Some(Leaf {
                path,
                span: start..start + close,
                string: true,
            }),
            start + close + 1,
        ));
    }

    if rest.starts_with('[') || rest.starts_with('{') {
        // Containers are not leaves; skip to the matching close bracket.
        let (open, close) = if rest.starts_with('[') { (b'[', b']') } else { (b'{', b'}') };
        let mut depth = 0usize;
        let mut in_str: Option<u8> = None;
        for (i, b) in rest.bytes().enumerate() {
            match in_str {
                Some(q) => {
                    if b == q {
                        in_str = None;
                    }
                }
                None => match b {
                    b'"' | b'\'' => in_str = Some(b),
                    b if b == open => depth += 1,
                    b if b == close => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok((None, pos + i + 1));
                        }
                    }
                    _ => {}
                },
            }
        }
        return Err(toml_error(content, pos, "unterminated array or inline table"));
    }

    // Bare scalar: up to a comment or end of line, trimmed.
    let end = rest
        .find(['#', '\n'])
        .map_or(content.len(), |i| pos + i);
    let text = content[pos..end].trim_end();
    if text.is_empty() {
        return Err(toml_error(content, pos, "missing value"));
    }
    Ok((
        Some(Leaf {
            path,
            span: pos..pos + text.len(),
            string: false,
        }),
        end,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn json_leaves(content: &str) -> Vec<Leaf> {
        StructuredStrategy::new(FileFormat::Json).leaves(content).unwrap()
    }

    fn toml_leaves(content: &str) -> Vec<Leaf> {
        StructuredStrategy::new(FileFormat::Toml).leaves(content).unwrap()
    }

    #[test]
    fn json_nested_paths_and_spans() {
        let content = r#"{"name": "foo", "author": {"name": "bar"}, "port": 8080}"#;
        let leaves = json_leaves(content);
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].path, "name");
        assert_eq!(&content[leaves[0].span.clone()], "foo");
        assert_eq!(leaves[1].path, "author.name");
        assert_eq!(&content[leaves[1].span.clone()], "bar");
        assert_eq!(leaves[2].path, "port");
        assert_eq!(&content[leaves[2].span.clone()], "8080");
        assert!(!leaves[2].string);
    }

    #[test]
    fn json_array_indices() {
        let content = r#"{"deps": ["serde", "clap"]}"#;
        let leaves = json_leaves(content);
        assert_eq!(leaves[0].path, "deps.0");
        assert_eq!(&content[leaves[0].span.clone()], "serde");
        assert_eq!(leaves[1].path, "deps.1");
    }

    #[test]
    fn json_escaped_strings_keep_raw_span() {
        let content = r#"{"msg": "say \"hi\""}"#;
        let leaves = json_leaves(content);
        assert_eq!(&content[leaves[0].span.clone()], r#"say \"hi\""#);
    }

    #[test]
    fn json_tolerates_skip_marker_comments() {
        let content = "{\n// @template-skip\n\"a\": 1\n// @template-skip-end\n}";
        let leaves = json_leaves(content);
        assert_eq!(leaves[0].path, "a");
    }

    #[test]
    fn json_garbage_is_a_parse_error() {
        let err = StructuredStrategy::new(FileFormat::Json)
            .leaves("{\"a\": nope}")
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn toml_tables_and_dotted_keys() {
        let content = "name = \"demo\"\n\n[package.metadata]\nversion = \"1.0\"\ncount = 3\n";
        let leaves = toml_leaves(content);
        assert_eq!(leaves[0].path, "name");
        assert_eq!(&content[leaves[0].span.clone()], "demo");
        assert_eq!(leaves[1].path, "package.metadata.version");
        assert_eq!(leaves[2].path, "package.metadata.count");
        assert_eq!(&content[leaves[2].span.clone()], "3");
        assert!(!leaves[2].string);
    }

    #[test]
    fn toml_arrays_are_not_leaves() {
        let content = "tags = [\"a\", \"b\"]\nname = \"x\"\n";
        let leaves = toml_leaves(content);
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].path, "name");
    }

    #[test]
    fn toml_value_comment_is_not_part_of_span() {
        let content = "port = 8080 # default\n";
        let leaves = toml_leaves(content);
        assert_eq!(&content[leaves[0].span.clone()], "8080");
    }

    #[test]
    fn resolve_matches_exact_path_only() {
        let strategy = StructuredStrategy::new(FileFormat::Json);
        let content = r#"{"name":"foo","author":{"name":"bar"}}"#;
        let res = strategy.resolve(content, "name", None).unwrap();
        assert_eq!(res.candidates.len(), 1);
        assert_eq!(&content[res.candidates[0].span.clone()], "foo");
    }

    #[test]
    fn resolve_rejects_empty_segments() {
        let strategy = StructuredStrategy::new(FileFormat::Json);
        assert!(strategy.resolve("{}", "a..b", None).is_err());
        assert!(strategy.resolve("{}", "", None).is_err());
    }
}
