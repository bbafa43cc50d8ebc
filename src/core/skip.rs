//! Skip-directive filter
//!
//! Scans raw content for marker pairs before any strategy-specific parsing
//! and produces byte spans no resolver may touch. Marker syntax is
//! bit-exact per format family:
//! - markup/prose:   `<!-- @template-skip -->` … `<!-- @template-skip-end -->`
//! - code/structured: `// @template-skip` … `// @template-skip-end`
//!
//! Nested or unterminated markers never pick a silent resolution; the file
//! fails with `InvalidSkipDirective`.

use std::ops::Range;

use memchr::memmem;

use crate::core::change::line_col;
use crate::core::dispatch::FileFormat;
use crate::core::error::{Error, Result};

/// One excluded byte span, covering both markers inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipSpan {
    pub start: usize,
    pub end: usize,
}

impl SkipSpan {
    /// True when `span` intersects this skip span fully or partially.
    pub fn intersects(&self, span: &Range<usize>) -> bool {
        span.start < self.end && self.start < span.end
    }
}

/// Marker strings for a format's native comment syntax.
fn markers(format: FileFormat) -> (&'static str, &'static str) {
    match format {
        FileFormat::Markup | FileFormat::Prose => {
            ("<!-- @template-skip -->", "<!-- @template-skip-end -->")
        }
        FileFormat::Json | FileFormat::Toml | FileFormat::Component => {
            ("// @template-skip", "// @template-skip-end")
        }
    }
}

/// Compute all skip spans in `content`, validating pairing.
pub fn scan(content: &str, format: FileFormat) -> Result<Vec<SkipSpan>> {
    let (start_marker, end_marker) = markers(format);
    let bytes = content.as_bytes();

    // Collect (offset, is_end) events in positional order. The start
    // marker is a prefix of the end marker in the code-comment syntax,
    // so an end hit must shadow the start hit at the same offset.
    let mut events: Vec<(usize, bool)> = memmem::find_iter(bytes, end_marker.as_bytes())
        .map(|pos| (pos, true))
        .collect();
    for pos in memmem::find_iter(bytes, start_marker.as_bytes()) {
        if !events.iter().any(|&(p, _)| p == pos) {
            events.push((pos, false));
        }
    }
    events.sort_unstable_by_key(|&(pos, _)| pos);

    let mut spans = Vec::new();
    let mut open: Option<usize> = None;

    for (pos, is_end) in events {
        let (line, _) = line_col(content, pos);
        match (is_end, open) {
            (false, None) => open = Some(pos),
            (false, Some(_)) => {
                return Err(Error::InvalidSkipDirective(format!(
                    "nested skip marker at line {line}"
                )));
            }
            (true, Some(start)) => {
                spans.push(SkipSpan {
                    start,
                    end: pos + end_marker.len(),
                });
                open = None;
            }
            (true, None) => {
                return Err(Error::InvalidSkipDirective(format!(
                    "skip end marker without a start at line {line}"
                )));
            }
        }
    }

    if let Some(start) = open {
        let (line, _) = line_col(content, start);
        return Err(Error::InvalidSkipDirective(format!(
            "unterminated skip marker at line {line}"
        )));
    }

    Ok(spans)
}

/// True when a candidate span survives filtering (touches no skip span).
pub fn allowed(span: &Range<usize>, skips: &[SkipSpan]) -> bool {
    skips.iter().all(|s| !s.intersects(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_comment_style_spans() {
        let content = "keep\n<!-- @template-skip -->\nhidden\n<!-- @template-skip-end -->\nkeep";
        let spans = scan(content, FileFormat::Markup).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(&content[spans[0].start..spans[0].end].lines().next().unwrap(), &"<!-- @template-skip -->");
        assert!(content[spans[0].start..spans[0].end].contains("hidden"));
    }

    #[test]
    fn finds_code_style_spans() {
        let content = "a\n// @template-skip\nb\n// @template-skip-end\nc";
        let spans = scan(content, FileFormat::Json).unwrap();
        assert_eq!(spans.len(), 1);
        assert!(content[spans[0].start..spans[0].end].contains('b'));
    }

    #[test]
    fn end_marker_is_not_misread_as_start() {
        // "// @template-skip" prefixes "// @template-skip-end"; make sure
        // the end marker does not register as a second start.
        let content = "// @template-skip\nx\n// @template-skip-end\n";
        assert_eq!(scan(content, FileFormat::Component).unwrap().len(), 1);
    }

    #[test]
    fn nested_markers_fail() {
        let content = "// @template-skip\n// @template-skip\n// @template-skip-end\n// @template-skip-end";
        let err = scan(content, FileFormat::Json).unwrap_err();
        assert!(matches!(err, Error::InvalidSkipDirective(_)));
    }

    #[test]
    fn unterminated_marker_fails() {
        let content = "// @template-skip\nno end";
        assert!(matches!(
            scan(content, FileFormat::Json).unwrap_err(),
            Error::InvalidSkipDirective(_)
        ));
    }

    #[test]
    fn stray_end_marker_fails() {
        let content = "// @template-skip-end";
        assert!(matches!(
            scan(content, FileFormat::Json).unwrap_err(),
            Error::InvalidSkipDirective(_)
        ));
    }

    #[test]
    fn partial_overlap_is_excluded() {
        let skips = vec![SkipSpan { start: 10, end: 20 }];
        assert!(!allowed(&(5..12), &skips));
        assert!(!allowed(&(15..25), &skips));
        assert!(!allowed(&(12..14), &skips));
        assert!(allowed(&(0..10), &skips));
        assert!(allowed(&(20..30), &skips));
    }
}
