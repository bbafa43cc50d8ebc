//! Structural selector parsing
//!
//! Shared by the markup and component strategies. A selector is a chain of
//! simple selectors separated by whitespace (descendant combinator):
//!
//! ```text
//! div.card#main[data-kind=hero] span.title
//! ```
//!
//! Each simple selector carries an optional tag name plus class/id/attribute
//! qualifiers. Chains are evaluated right-to-left over ancestor links, as
//! predicate checks over arena indices rather than pointer chasing.

use crate::core::error::{Error, Result};

/// Attribute qualifier: `[name]` (presence) or `[name=value]` (exact value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrQualifier {
    pub name: String,
    pub value: Option<String>,
}

/// One link in a selector chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleSelector {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub attrs: Vec<AttrQualifier>,
}

impl SimpleSelector {
    /// Match one element. `get_attr` resolves an attribute by name;
    /// `class_attr` names the class-carrying attribute for the format
    /// ("class" in markup, "className" in component markup).
    pub fn matches<'a>(
        &self,
        tag: &str,
        class_attr: &str,
        get_attr: impl Fn(&str) -> Option<&'a str>,
    ) -> bool {
        if let Some(want) = &self.tag {
            if !want.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(want) = &self.id {
            if get_attr("id") != Some(want.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let Some(classes) = get_attr(class_attr) else {
                return false;
            };
            let have: Vec<&str> = classes.split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|q| match (&q.value, get_attr(&q.name)) {
            (None, found) => found.is_some(),
            (Some(want), Some(found)) => want == found,
            (Some(_), None) => false,
        })
    }
}

/// A whitespace-separated descendant chain; the last part is the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorChain {
    pub parts: Vec<SimpleSelector>,
}

impl SelectorChain {
    /// Parse a selector string or fail with `InvalidSelector`.
    pub fn parse(selector: &str) -> Result<Self> {
        let mut parts = Vec::new();
        for token in selector.split_whitespace() {
            parts.push(parse_simple(selector, token)?);
        }
        if parts.is_empty() {
            return Err(invalid(selector, "selector is empty"));
        }
        Ok(Self { parts })
    }

    /// Evaluate the chain against a node in an arena. `parent` resolves a
    /// node's parent index; `matches` checks one simple selector against a
    /// node. Ancestor parts are matched greedily upward, which is
    /// sufficient for descendant combinators.
    pub fn matches_node(
        &self,
        node: usize,
        parent: impl Fn(usize) -> Option<usize>,
        matches: impl Fn(usize, &SimpleSelector) -> bool,
    ) -> bool {
        let target = self.parts.last().expect("chain is never empty");
        if !matches(node, target) {
            return false;
        }

        let mut cursor = node;
        for part in self.parts[..self.parts.len() - 1].iter().rev() {
            let mut found = false;
            while let Some(anc) = parent(cursor) {
                cursor = anc;
                if matches(anc, part) {
                    found = true;
                    break;
                }
            }
            if !found {
                return false;
            }
        }
        true
    }
}

fn invalid(selector: &str, reason: &str) -> Error {
    Error::InvalidSelector {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn parse_simple(selector: &str, token: &str) -> Result<SimpleSelector> {
    let mut sel = SimpleSelector::default();
    let mut chars = token.char_indices().peekable();

    // Leading tag name, if the token does not start with a qualifier.
    if matches!(chars.peek(), Some((_, c)) if is_name_char(*c)) {
        let mut tag = String::new();
        while let Some((_, c)) = chars.peek() {
            if is_name_char(*c) {
                tag.push(*c);
                chars.next();
            } else {
                break;
            }
        }
        sel.tag = Some(tag);
    }

    while let Some((pos, c)) = chars.next() {
        match c {
            '.' | '#' => {
                let mut name = String::new();
                while let Some((_, nc)) = chars.peek() {
                    if is_name_char(*nc) {
                        name.push(*nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err(invalid(selector, "empty class or id qualifier"));
                }
                if c == '.' {
                    sel.classes.push(name);
                } else if sel.id.replace(name).is_some() {
                    return Err(invalid(selector, "duplicate #id qualifier"));
                }
            }
            '[' => {
                let rest = &token[pos + 1..];
                let Some(close) = rest.find(']') else {
                    return Err(invalid(selector, "unclosed attribute qualifier"));
                };
                let body = &rest[..close];
                // Advance past the consumed qualifier body and ']'.
                for _ in 0..=close {
                    chars.next();
                }
                let (name, value) = match body.split_once('=') {
                    Some((n, v)) => (n, Some(v.trim_matches(['"', '\'']).to_string())),
                    None => (body, None),
                };
                if name.is_empty() || !name.chars().all(is_name_char) {
                    return Err(invalid(selector, "bad attribute name"));
                }
                sel.attrs.push(AttrQualifier {
                    name: name.to_string(),
                    value,
                });
            }
            _ => return Err(invalid(selector, "unexpected character in selector")),
        }
    }

    Ok(sel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_compound_selector() {
        let chain = SelectorChain::parse("div.card#main[data-kind=hero] span.title").unwrap();
        assert_eq!(chain.parts.len(), 2);

        let first = &chain.parts[0];
        assert_eq!(first.tag.as_deref(), Some("div"));
        assert_eq!(first.id.as_deref(), Some("main"));
        assert_eq!(first.classes, vec!["card"]);
        assert_eq!(first.attrs[0].name, "data-kind");
        assert_eq!(first.attrs[0].value.as_deref(), Some("hero"));

        let target = &chain.parts[1];
        assert_eq!(target.tag.as_deref(), Some("span"));
        assert_eq!(target.classes, vec!["title"]);
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert!(SelectorChain::parse("").is_err());
        assert!(SelectorChain::parse("div[unclosed").is_err());
        assert!(SelectorChain::parse("div.").is_err());
        assert!(SelectorChain::parse("a##b").is_err());
    }

    #[test]
    fn simple_selector_matching() {
        let chain = SelectorChain::parse("h1.title").unwrap();
        let sel = &chain.parts[0];
        assert!(sel.matches("h1", "class", |a| (a == "class").then_some("big title")));
        assert!(!sel.matches("h2", "class", |a| (a == "class").then_some("title")));
        assert!(!sel.matches("h1", "class", |_| None));
    }

    #[test]
    fn chain_walks_ancestors() {
        // Arena: 0=html 1=div.card(parent 0) 2=span(parent 1) 3=span(parent 0)
        let tags = ["html", "div", "span", "span"];
        let classes = [None, Some("card"), None, None];
        let parents = [None, Some(0), Some(1), Some(0)];

        let chain = SelectorChain::parse("div.card span").unwrap();
        let check = |i: usize, s: &SimpleSelector| {
            s.matches(tags[i], "class", |a| {
                (a == "class").then_some(classes[i]).flatten()
            })
        };
        assert!(chain.matches_node(2, |i| parents[i], check));
        assert!(!chain.matches_node(3, |i| parents[i], check));
    }
}
