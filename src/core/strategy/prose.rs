//! Prose strategy (Markdown + YAML frontmatter)
//!
//! Two selector families:
//! - `heading:<regex>` — matched against block-level heading text, located
//!   through pulldown-cmark offset events so only the heading text span is
//!   replaced, never the `#` markers.
//! - `frontmatter:<key.path>` — resolved against the leading `---` metadata
//!   block via serde_yaml, then pinned to a byte span by a line scanner.
//!
//! A bare selector prefers a frontmatter path when a block exists, else it
//! is treated as a heading pattern.

use std::ops::Range;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use regex::Regex;

use crate::core::error::{Error, Result};
use crate::core::strategy::{Candidate, Resolution, Strategy};

pub struct ProseStrategy;

/// Leading metadata block: inner text span between the `---` fences.
fn frontmatter_block(content: &str) -> Option<Range<usize>> {
    let rest = content.strip_prefix("---")?;
    let first_nl = rest.find('\n')?;
    if !rest[..first_nl].trim().is_empty() {
        return None; // `--- something` is a thematic break, not a fence
    }
    let body_start = 3 + first_nl + 1;

    let mut pos = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some(body_start..pos);
        }
        pos += line.len();
    }
    None
}

impl Strategy for ProseStrategy {
    fn resolve(&self, content: &str, selector: &str, _attribute: Option<&str>) -> Result<Resolution> {
        let block = frontmatter_block(content);

        if let Some(path) = selector.strip_prefix("frontmatter:") {
            return resolve_frontmatter(content, selector, path, block.as_ref());
        }
        if let Some(pattern) = selector.strip_prefix("heading:") {
            return resolve_heading(content, selector, pattern, block.as_ref());
        }
        if block.is_some() {
            resolve_frontmatter(content, selector, selector, block.as_ref())
        } else {
            resolve_heading(content, selector, selector, None)
        }
    }
}

fn resolve_heading(
    content: &str,
    selector: &str,
    pattern: &str,
    block: Option<&Range<usize>>,
) -> Result<Resolution> {
    let regex = Regex::new(pattern).map_err(|e| Error::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("bad heading pattern: {e}"),
    })?;

    // Markdown parsing starts after the frontmatter fence so metadata
    // lines can never masquerade as setext headings.
    let body_start = block.map_or(0, |b| {
        content[b.end..]
            .find('\n')
            .map_or(content.len(), |nl| b.end + nl + 1)
    });
    let body = &content[body_start..];

    let mut resolution = Resolution::default();
    let mut heading_spans: Option<Vec<Range<usize>>> = None;

    for (event, range) in Parser::new_ext(body, Options::empty()).into_offset_iter() {
        match event {
            Event::Start(Tag::Heading { .. }) => heading_spans = Some(Vec::new()),
            Event::Text(_) | Event::Code(_) => {
                if let Some(spans) = heading_spans.as_mut() {
                    spans.push(range);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                let spans = heading_spans.take().unwrap_or_default();
                if spans.is_empty() {
                    continue;
                }
                let text: String = spans.iter().map(|r| &body[r.clone()]).collect();
                if regex.is_match(&text) {
                    let start = body_start + spans.first().map(|r| r.start).unwrap_or(0);
                    let end = body_start + spans.last().map(|r| r.end).unwrap_or(0);
                    resolution.candidates.push(Candidate::new(selector, start..end));
                }
            }
            _ => {}
        }
    }

    Ok(resolution)
}

fn resolve_frontmatter(
    content: &str,
    selector: &str,
    path: &str,
    block: Option<&Range<usize>>,
) -> Result<Resolution> {
    if path.is_empty() || path.split('.').any(str::is_empty) {
        return Err(Error::InvalidSelector {
            selector: selector.to_string(),
            reason: "frontmatter path segments must be non-empty".to_string(),
        });
    }

    let Some(block) = block else {
        // No metadata block: a frontmatter selector simply has nothing to
        // match (zero-match tolerance, not an error).
        return Ok(Resolution::default());
    };
    let body = &content[block.clone()];

    let doc: serde_yaml::Value = serde_yaml::from_str(body)
        .map_err(|e| Error::Parse(format!("invalid frontmatter: {e}")))?;
    if !path_resolves_to_scalar(&doc, path) {
        return Ok(Resolution::default());
    }

    let mut resolution = Resolution::default();
    if let Some(span) = locate_key_span(body, path) {
        resolution.candidates.push(Candidate::new(
            selector,
            block.start + span.start..block.start + span.end,
        ));
    }
    Ok(resolution)
}

fn path_resolves_to_scalar(doc: &serde_yaml::Value, path: &str) -> bool {
    let mut node = doc;
    for segment in path.split('.') {
        node = match node {
            serde_yaml::Value::Mapping(map) => {
                match map.get(serde_yaml::Value::String(segment.to_string())) {
                    Some(v) => v,
                    None => return false,
                }
            }
            serde_yaml::Value::Sequence(seq) => match segment.parse::<usize>().ok().and_then(|i| seq.get(i)) {
                Some(v) => v,
                None => return false,
            },
            _ => return false,
        };
    }
    matches!(
        node,
        serde_yaml::Value::String(_) | serde_yaml::Value::Number(_) | serde_yaml::Value::Bool(_)
    )
}

/// Walk the block line by line with an indentation stack and return the
/// byte span of the scalar value for `path`. Quoted scalars narrow to the
/// span inside the quotes; bare scalars drop trailing comments.
fn locate_key_span(body: &str, path: &str) -> Option<Range<usize>> {
    let want: Vec<&str> = path.split('.').collect();
    let mut stack: Vec<(usize, String)> = Vec::new();
    let mut pos = 0usize;

    for line in body.split_inclusive('\n') {
        let line_start = pos;
        pos += line.len();

        let stripped = line.trim_end();
        let trimmed = stripped.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('-') {
            continue;
        }
        let indent = stripped.len() - trimmed.len();

        let Some(colon) = find_key_colon(trimmed) else {
            continue;
        };
        let key = trimmed[..colon].trim().trim_matches(['"', '\'']).to_string();

        while matches!(stack.last(), Some((i, _)) if *i >= indent) {
            stack.pop();
        }
        stack.push((indent, key));

        let current: Vec<&str> = stack.iter().map(|(_, k)| k.as_str()).collect();
        if current != want {
            continue;
        }

        let after = &trimmed[colon + 1..];
        let value = after.trim_start();
        if value.is_empty() {
            return None; // nested mapping follows; not a scalar line
        }
        // Block scalars (`|`, `>` and their chomping/indent variants) fold
        // over the following lines; there is no single value span here.
        if matches!(value.chars().next(), Some('|' | '>')) {
            return None;
        }
        let value_off = line_start + indent + colon + 1 + (after.len() - value.len());

        if let Some(quote @ ('"' | '\'')) = value.chars().next() {
            let inner = &value[1..];
            let close = inner.find(quote)?;
            return Some(value_off + 1..value_off + 1 + close);
        }

        // Bare scalar: trim an end-of-line ` #comment`.
        let cut = value.find(" #").map_or(value.len(), |i| i);
        let text = value[..cut].trim_end();
        return Some(value_off..value_off + text.len());
    }
    None
}

/// First ':' that terminates the key (followed by space or end of line).
fn find_key_colon(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b == b':' && matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) {
            return Some(i);
        }
    }
    None
}
