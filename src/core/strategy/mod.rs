//! Format strategies
//!
//! Every strategy implements the same contract: match selectors against
//! content, extract candidate spans, and propose Changes. The pipeline here
//! owns the cross-cutting rules — skip filtering, the ambiguity policy,
//! zero-match warnings, and cross-selector overlap detection — so each
//! strategy only has to produce candidates in document order.

use std::ops::Range;

use tracing::debug;

use crate::core::change::{
    apply_changes, token_for, validate_config, Change, TemplatizeConfig,
};
use crate::core::dispatch::{strategy_for, FileFormat};
use crate::core::error::{Error, MatchWarning, Result};
use crate::core::skip;

pub mod component;
pub mod markup;
pub mod prose;
pub mod structured;

/// One location a selector resolved to, before filtering.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Selector-relative locator reported on the Change.
    pub path: String,
    /// Byte range of the content being replaced.
    pub span: Range<usize>,
    /// Wrap the placeholder token in quotes. Structured strategies set
    /// this for non-string leaves, where a bare token would break the
    /// host syntax.
    pub quote_token: bool,
}

impl Candidate {
    pub fn new(path: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            path: path.into(),
            span,
            quote_token: false,
        }
    }

    pub fn quoted(path: impl Into<String>, span: Range<usize>) -> Self {
        Self {
            path: path.into(),
            span,
            quote_token: true,
        }
    }
}

/// Per-selector resolution outcome.
#[derive(Debug, Default)]
pub struct Resolution {
    pub candidates: Vec<Candidate>,
    pub warnings: Vec<MatchWarning>,
}

/// Changes plus the non-fatal conditions observed while producing them.
#[derive(Debug, Default)]
pub struct Proposal {
    pub changes: Vec<Change>,
    pub warnings: Vec<MatchWarning>,
}

/// Format-specific matcher/substituter bound to one file kind.
pub trait Strategy {
    /// Resolve one selector to candidate locations in document order.
    fn resolve(
        &self,
        content: &str,
        selector: &str,
        attribute: Option<&str>,
    ) -> Result<Resolution>;
}

/// Run the full convert pipeline for one file's content:
/// scan skip directives, resolve every selector, filter, and emit the
/// ordered Change list. Changes come out in selector declaration order,
/// then position order within a selector.
pub fn propose(format: FileFormat, content: &str, cfg: &TemplatizeConfig) -> Result<Proposal> {
    validate_config(cfg)?;

    let skips = skip::scan(content, format)?;
    let strategy = strategy_for(format);
    let token = token_for(&cfg.placeholder);

    let mut proposal = Proposal::default();

    for selector in &cfg.selectors {
        let resolution = strategy.resolve(content, selector, cfg.attribute.as_deref())?;
        proposal.warnings.extend(resolution.warnings);

        let mut kept: Vec<Candidate> = Vec::new();
        for candidate in resolution.candidates {
            if candidate.span.is_empty() {
                proposal.warnings.push(MatchWarning {
                    selector: selector.clone(),
                    reason: "matched value is empty".to_string(),
                });
                continue;
            }
            if !skip::allowed(&candidate.span, &skips) {
                debug!(selector, start = candidate.span.start, "candidate inside skip span");
                continue;
            }
            kept.push(candidate);
        }

        if kept.is_empty() {
            proposal.warnings.push(MatchWarning::no_match(selector));
            continue;
        }
        if kept.len() > 1 && !cfg.allow_multiple {
            return Err(Error::AmbiguousMatch {
                selector: selector.clone(),
                count: kept.len(),
            });
        }

        for candidate in kept {
            let replacement = if candidate.quote_token {
                format!("\"{token}\"")
            } else {
                token.clone()
            };
            proposal.changes.push(Change::at(
                candidate.path,
                content[candidate.span.clone()].to_string(),
                replacement,
                candidate.span,
                content,
            ));
        }
    }

    check_overlaps(&proposal.changes)?;
    Ok(proposal)
}

/// Convert content in one shot: propose, then apply.
pub fn convert(
    format: FileFormat,
    content: &str,
    cfg: &TemplatizeConfig,
) -> Result<(String, Proposal)> {
    let proposal = propose(format, content, cfg)?;
    let output = apply_changes(content, &proposal.changes)?;
    Ok((output, proposal))
}

/// Two selectors addressing overlapping spans is a config bug the operator
/// must resolve; report both paths instead of applying either.
pub fn check_overlaps(changes: &[Change]) -> Result<()> {
    let mut sorted: Vec<&Change> = changes.iter().collect();
    sorted.sort_by_key(|c| c.span.start);
    for pair in sorted.windows(2) {
        if pair[1].span.start < pair[0].span.end {
            return Err(Error::ConflictingChange {
                first: pair[0].path.clone(),
                second: pair[1].path.clone(),
            });
        }
    }
    Ok(())
}
