//! Component-markup strategy (JSX/TSX)
//!
//! Replacement targets here can sit inside component boundaries and string
//! literals that a textual scan could corrupt, so content is parsed with
//! tree-sitter and flattened into an arena of element nodes with explicit
//! parent indices. Selector chains are then evaluated as predicate checks
//! over indices, the same way the markup strategy walks its arena.
//!
//! Only static string literals and static text children are eligible.
//! A matched node whose content is a dynamic expression is reported as a
//! warning and never attempted — synthesizing a placeholder inside
//! arbitrary expression syntax is unsafe.

use std::ops::Range;

use tree_sitter::{Node, Parser};

use crate::core::error::{Error, MatchWarning, Result};
use crate::core::selector::SelectorChain;
use crate::core::strategy::{Candidate, Resolution, Strategy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Span inside the string literal's quotes.
    Static(Range<usize>),
    /// `{expr}`, template string, or anything else executable.
    Dynamic,
    /// Bare attribute with no value (`<Button disabled>`).
    Bare,
}

#[derive(Debug, Clone)]
pub struct ComponentAttr {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone)]
pub struct ComponentElement {
    pub tag: String,
    pub parent: Option<usize>,
    pub attrs: Vec<ComponentAttr>,
    /// Direct `jsx_text` children, raw source spans.
    pub texts: Vec<Range<usize>>,
    /// True when a direct child is an embedded expression.
    pub has_dynamic_child: bool,
}

impl ComponentElement {
    fn attr(&self, name: &str) -> Option<&ComponentAttr> {
        self.attrs.iter().find(|a| a.name == name)
    }

    fn attr_text<'a>(&self, content: &'a str, name: &str) -> Option<&'a str> {
        self.attr(name).map(|a| match &a.value {
            AttrValue::Static(span) => &content[span.clone()],
            AttrValue::Dynamic | AttrValue::Bare => "",
        })
    }
}

pub struct ComponentStrategy;

impl Strategy for ComponentStrategy {
    fn resolve(&self, content: &str, selector: &str, attribute: Option<&str>) -> Result<Resolution> {
        let chain = SelectorChain::parse(selector)?;
        let arena = parse_component(content)?;

        let matches_part = |idx: usize, part: &crate::core::selector::SimpleSelector| {
            let el = &arena[idx];
            part.matches(&el.tag, "className", |name| el.attr_text(content, name))
        };

        let mut resolution = Resolution::default();
        for idx in 0..arena.len() {
            if !chain.matches_node(idx, |i| arena[i].parent, matches_part) {
                continue;
            }
            let el = &arena[idx];

            if let Some(attr_name) = attribute {
                match el.attr(attr_name).map(|a| &a.value) {
                    Some(AttrValue::Static(span)) => {
                        resolution
                            .candidates
                            .push(Candidate::new(format!("{selector}@{attr_name}"), span.clone()));
                    }
                    Some(AttrValue::Dynamic) => {
                        resolution.warnings.push(MatchWarning::dynamic_content(selector));
                    }
                    Some(AttrValue::Bare) | None => {}
                }
                continue;
            }

            if el.has_dynamic_child {
                resolution.warnings.push(MatchWarning::dynamic_content(selector));
                continue;
            }
            let mut runs = el
                .texts
                .iter()
                .filter(|s| !content[(*s).clone()].trim().is_empty());
            if let (Some(span), None) = (runs.next(), runs.next()) {
                resolution
                    .candidates
                    .push(Candidate::new(selector, trim_span(content, span.clone())));
            }
        }
        Ok(resolution)
    }
}

fn trim_span(content: &str, span: Range<usize>) -> Range<usize> {
    let text = &content[span.clone()];
    let start = span.start + (text.len() - text.trim_start().len());
    let end = span.end - (text.len() - text.trim_end().len());
    start..end.max(start)
}

/// Parse TSX and flatten every JSX element into the arena.
pub fn parse_component(content: &str) -> Result<Vec<ComponentElement>> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_typescript::LANGUAGE_TSX.into())
        .map_err(|e| Error::Parse(format!("tsx grammar unavailable: {e}")))?;

    let tree = parser
        .parse(content, None)
        .ok_or_else(|| Error::Parse("tree-sitter could not parse content".to_string()))?;
    if tree.root_node().has_error() {
        return Err(Error::Parse("component markup contains syntax errors".to_string()));
    }

    let mut arena = Vec::new();
    collect(tree.root_node(), None, content, &mut arena);
    Ok(arena)
}

/// Depth-first walk; JSX elements become arena nodes, everything else is
/// traversed transparently so elements nested in functions, conditionals,
/// and fragments keep correct ancestor links.
fn collect(node: Node, parent: Option<usize>, content: &str, arena: &mut Vec<ComponentElement>) {
    match node.kind() {
        "jsx_element" => {
            let opening = (0..node.child_count())
                .filter_map(|i| node.child(i))
                .find(|c| c.kind() == "jsx_opening_element");
            let idx = arena.len();
            arena.push(element_from(opening.as_ref(), parent, content));

            for i in 0..node.child_count() {
                let Some(child) = node.child(i) else { continue };
                match child.kind() {
                    "jsx_opening_element" | "jsx_closing_element" => {}
                    "jsx_text" => arena[idx].texts.push(child.byte_range()),
                    "jsx_expression" => arena[idx].has_dynamic_child = true,
                    _ => collect(child, Some(idx), content, arena),
                }
            }
        }
        "jsx_self_closing_element" => {
            arena.push(element_from(Some(&node), parent, content));
        }
        _ => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    collect(child, parent, content, arena);
                }
            }
        }
    }
}

/// Read tag name and attributes from an opening (or self-closing) element.
fn element_from(opening: Option<&Node>, parent: Option<usize>, content: &str) -> ComponentElement {
    let mut element = ComponentElement {
        tag: String::new(),
        parent,
        attrs: Vec::new(),
        texts: Vec::new(),
        has_dynamic_child: false,
    };
    let Some(opening) = opening else {
        return element;
    };

    if let Some(name) = opening.child_by_field_name("name") {
        element.tag = content[name.byte_range()].to_string();
    }

    for i in 0..opening.child_count() {
        let Some(attr) = opening.child(i) else { continue };
        if attr.kind() != "jsx_attribute" {
            continue;
        }
        let Some(name_node) = attr.child(0) else { continue };
        let name = content[name_node.byte_range()].to_string();

        // The value node, when present, follows the '=' token.
        let value = match (0..attr.child_count())
            .filter_map(|j| attr.child(j))
            .find(|c| !matches!(c.kind(), "property_identifier" | "="))
        {
            None => AttrValue::Bare,
            Some(v) if v.kind() == "string" => {
                let range = v.byte_range();
                AttrValue::Static(range.start + 1..range.end.saturating_sub(1).max(range.start + 1))
            }
            Some(_) => AttrValue::Dynamic,
        };
        element.attrs.push(ComponentAttr { name, value });
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const APP: &str = r#"
export function App({ version }: { version: string }) {
  return (
    <div className="app" id="root">
      <header className="hero">
        <h1 className="title">My Project</h1>
        <a href="https://example.com" title="docs">Read more</a>
      </header>
      <footer>
        <span>{version}</span>
      </footer>
    </div>
  );
}
"#;

    #[test]
    fn arena_links_through_non_jsx_nodes() {
        let arena = parse_component(APP).unwrap();
        let h1 = arena.iter().position(|e| e.tag == "h1").unwrap();
        let header = arena[h1].parent.unwrap();
        assert_eq!(arena[header].tag, "header");
        assert_eq!(arena[arena[header].parent.unwrap()].tag, "div");
    }

    #[test]
    fn class_name_qualifier_matches() {
        let res = ComponentStrategy.resolve(APP, "header.hero h1.title", None).unwrap();
        assert_eq!(res.candidates.len(), 1);
        assert_eq!(&APP[res.candidates[0].span.clone()], "My Project");
    }

    #[test]
    fn static_attribute_target() {
        let res = ComponentStrategy.resolve(APP, "a", Some("href")).unwrap();
        assert_eq!(res.candidates.len(), 1);
        assert_eq!(&APP[res.candidates[0].span.clone()], "https://example.com");
    }

    #[test]
    fn dynamic_text_child_is_warned_not_matched() {
        let res = ComponentStrategy.resolve(APP, "span", None).unwrap();
        assert!(res.candidates.is_empty());
        assert_eq!(res.warnings, vec![MatchWarning::dynamic_content("span")]);
    }

    #[test]
    fn dynamic_attribute_is_warned_not_matched() {
        let doc = r#"const x = <img src={path} alt="logo" />;"#;
        let res = ComponentStrategy.resolve(doc, "img", Some("src")).unwrap();
        assert!(res.candidates.is_empty());
        assert_eq!(res.warnings, vec![MatchWarning::dynamic_content("img")]);

        let alt = ComponentStrategy.resolve(doc, "img", Some("alt")).unwrap();
        assert_eq!(&doc[alt.candidates[0].span.clone()], "logo");
    }

    #[test]
    fn syntax_errors_fail_parse() {
        let err = ComponentStrategy
            .resolve("const x = <div", "div", None)
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}
