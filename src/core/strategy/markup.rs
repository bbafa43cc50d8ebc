//! Markup strategy (HTML/XML-like)
//!
//! A single-pass tag scanner builds an element arena with parent links,
//! attribute value spans, and direct text-child spans. Selectors are
//! structural chains (`tag.class#id[attr=v]`, descendant by whitespace);
//! an `attribute` config target redirects the match from element text to a
//! named attribute value. Only leaf text or attribute values are ever
//! replaced — element boundaries and nested markup stay untouched.

use std::ops::Range;

use memchr::memchr;

use crate::core::change::line_col;
use crate::core::error::{Error, Result};
use crate::core::selector::SelectorChain;
use crate::core::strategy::{Candidate, Resolution, Strategy};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

#[derive(Debug, Clone)]
pub struct MarkupAttr {
    pub name: String,
    /// Span inside the quotes (or the bare value). None for boolean attrs.
    pub value_span: Option<Range<usize>>,
}

#[derive(Debug, Clone)]
pub struct MarkupElement {
    pub tag: String,
    pub parent: Option<usize>,
    pub attrs: Vec<MarkupAttr>,
    /// Direct text children, raw source spans.
    pub text_spans: Vec<Range<usize>>,
}

impl MarkupElement {
    fn attr_value<'a>(&self, content: &'a str, name: &str) -> Option<&'a str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value_span.clone().map_or("", |s| &content[s]))
    }
}

pub struct MarkupStrategy;

impl Strategy for MarkupStrategy {
    fn resolve(&self, content: &str, selector: &str, attribute: Option<&str>) -> Result<Resolution> {
        let chain = SelectorChain::parse(selector)?;
        let arena = parse_markup(content)?;

        let matches_part = |idx: usize, part: &crate::core::selector::SimpleSelector| {
            let el = &arena[idx];
            part.matches(&el.tag, "class", |name| el.attr_value(content, name))
        };

        let mut resolution = Resolution::default();
        for idx in 0..arena.len() {
            if !chain.matches_node(idx, |i| arena[i].parent, matches_part) {
                continue;
            }
            let el = &arena[idx];

            if let Some(attr_name) = attribute {
                let Some(span) = el
                    .attrs
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(attr_name))
                    .and_then(|a| a.value_span.clone())
                else {
                    continue;
                };
                resolution
                    .candidates
                    .push(Candidate::new(format!("{selector}@{attr_name}"), span));
                continue;
            }

            // Text target: exactly one non-whitespace direct text child.
            // Mixed content (several text runs around nested elements) is
            // not a leaf text situation and never matches.
            let mut runs = el
                .text_spans
                .iter()
                .filter(|s| !content[(*s).clone()].trim().is_empty());
            match (runs.next(), runs.next()) {
                (Some(span), None) => {
                    resolution
                        .candidates
                        .push(Candidate::new(selector, trim_span(content, span.clone())));
                }
                _ => continue,
            }
        }
        Ok(resolution)
    }
}

/// Narrow a span to its non-whitespace core so surrounding indentation is
/// preserved through replacement.
fn trim_span(content: &str, span: Range<usize>) -> Range<usize> {
    let text = &content[span.clone()];
    let start = span.start + (text.len() - text.trim_start().len());
    let end = span.end - (text.len() - text.trim_end().len());
    start..end.max(start)
}

fn parse_error(content: &str, pos: usize, msg: &str) -> Error {
    let (line, col) = line_col(content, pos);
    Error::Parse(format!("{msg} at line {line}, column {col}"))
}

/// Build the element arena. Tolerant of unclosed elements (common in
/// hand-written HTML) but strict about unterminated tags and comments.
pub fn parse_markup(content: &str) -> Result<Vec<MarkupElement>> {
    let bytes = content.as_bytes();
    let mut arena: Vec<MarkupElement> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut pos = 0usize;
    let mut text_start = 0usize;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }

        let next = bytes.get(pos + 1).copied();
        let is_construct = matches!(next, Some(b'/') | Some(b'!') | Some(b'?'))
            || next.is_some_and(|b| b.is_ascii_alphabetic());
        if !is_construct {
            pos += 1;
            continue;
        }

        // Close the running text span.
        if text_start < pos {
            if let Some(&top) = stack.last() {
                arena[top].text_spans.push(text_start..pos);
            }
        }

        if content[pos..].starts_with("<!--") {
            let Some(end) = find_from(bytes, pos + 4, b"-->") else {
                return Err(parse_error(content, pos, "unterminated comment"));
            };
            pos = end + 3;
        } else if matches!(next, Some(b'!') | Some(b'?')) {
            let Some(gt) = memchr(b'>', &bytes[pos..]) else {
                return Err(parse_error(content, pos, "unterminated declaration"));
            };
            pos += gt + 1;
        } else if next == Some(b'/') {
            let Some(gt) = memchr(b'>', &bytes[pos..]) else {
                return Err(parse_error(content, pos, "unterminated closing tag"));
            };
            let name = content[pos + 2..pos + gt].trim();
            // Pop to the matching open element; ignore strays.
            if let Some(found) = stack
                .iter()
                .rposition(|&i| arena[i].tag.eq_ignore_ascii_case(name))
            {
                stack.truncate(found);
            }
            pos += gt + 1;
        } else {
            let (element, after, self_closing) = parse_open_tag(content, pos)?;
            let tag = element.tag.clone();
            let idx = arena.len();
            arena.push(MarkupElement {
                parent: stack.last().copied(),
                ..element
            });
            pos = after;

            if self_closing || VOID_TAGS.contains(&tag.as_str()) {
                // complete; nothing pushed
            } else if RAW_TEXT_TAGS.contains(&tag.as_str()) {
                // Raw text runs to the matching close tag.
                let close = format!("</{tag}");
                let lower = content[pos..].to_ascii_lowercase();
                let Some(rel) = lower.find(&close) else {
                    return Err(parse_error(content, pos, "unterminated raw-text element"));
                };
                if rel > 0 {
                    arena[idx].text_spans.push(pos..pos + rel);
                }
                let Some(gt) = memchr(b'>', &bytes[pos + rel..]) else {
                    return Err(parse_error(content, pos, "unterminated closing tag"));
                };
                pos = pos + rel + gt + 1;
            } else {
                stack.push(idx);
            }
        }
        text_start = pos;
    }

    Ok(arena)
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    memchr::memmem::find(&bytes[from..], needle).map(|i| from + i)
}

/// Parse `<tag attr="v" ...>`; returns the element, the offset just past
/// '>', and whether the tag self-closed.
fn parse_open_tag(content: &str, start: usize) -> Result<(MarkupElement, usize, bool)> {
    let bytes = content.as_bytes();
    let mut pos = start + 1;

    let name_start = pos;
    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'-') {
        pos += 1;
    }
    let tag = content[name_start..pos].to_ascii_lowercase();

    let mut attrs = Vec::new();
    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Err(parse_error(content, start, "unterminated tag")),
            Some(b'>') => {
                pos += 1;
                break;
            }
            Some(b'/') => {
                if bytes.get(pos + 1) == Some(&b'>') {
                    return Ok((
                        MarkupElement {
                            tag,
                            parent: None,
                            attrs,
                            text_spans: Vec::new(),
                        },
                        pos + 2,
                        true,
                    ));
                }
                pos += 1;
            }
            Some(_) => {
                let attr_start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && !matches!(bytes[pos], b'=' | b'>' | b'/')
                {
                    pos += 1;
                }
                if pos == attr_start {
                    return Err(parse_error(content, pos, "malformed attribute"));
                }
                let name = content[attr_start..pos].to_string();

                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let value_span = if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    match bytes.get(pos) {
                        Some(&q @ (b'"' | b'\'')) => {
                            let vstart = pos + 1;
                            let Some(rel) = memchr(q, &bytes[vstart..]) else {
                                return Err(parse_error(content, pos, "unterminated attribute value"));
                            };
                            pos = vstart + rel + 1;
                            Some(vstart..vstart + rel)
                        }
                        Some(_) => {
                            let vstart = pos;
                            while pos < bytes.len()
                                && !bytes[pos].is_ascii_whitespace()
                                && !matches!(bytes[pos], b'>' | b'/')
                            {
                                pos += 1;
                            }
                            Some(vstart..pos)
                        }
                        None => return Err(parse_error(content, pos, "unterminated tag")),
                    }
                } else {
                    None
                };
                attrs.push(MarkupAttr { name, value_span });
            }
        }
    }

    Ok((
        MarkupElement {
            tag,
            parent: None,
            attrs,
            text_spans: Vec::new(),
        },
        pos,
        false,
    ))
}
