//! Minimal structural matcher over the owned HTML tree. The sanitizer and
//! extractor only need tag/class/id/attribute predicates, not a CSS engine.

use bookmirror_markdown::node::{HtmlElement, HtmlNode};

#[derive(Debug, Clone, Copy)]
pub enum NodeMatcher {
    Tag(&'static str),
    Class(&'static str),
    Id(&'static str),
    AttrEquals(&'static str, &'static str),
}

impl NodeMatcher {
    pub fn matches(&self, element: &HtmlElement) -> bool {
        match self {
            NodeMatcher::Tag(tag) => element.tag_name == *tag,
            NodeMatcher::Class(class) => element.has_class(class),
            NodeMatcher::Id(id) => element.id() == Some(*id),
            NodeMatcher::AttrEquals(name, value) => element.attr(name) == Some(*value),
        }
    }
}

/// Depth-first search over a node forest.
pub fn find_element<'a>(
    nodes: &'a [HtmlNode],
    pred: &dyn Fn(&HtmlElement) -> bool,
) -> Option<&'a HtmlElement> {
    for node in nodes {
        if let HtmlNode::Element(element) = node {
            if pred(element) {
                return Some(element);
            }
            if let Some(found) = find_element(&element.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// Depth-first search returning the child-index path to the first match,
/// so callers can revisit the element mutably.
pub fn find_path(nodes: &[HtmlNode], pred: &dyn Fn(&HtmlElement) -> bool) -> Option<Vec<usize>> {
    for (index, node) in nodes.iter().enumerate() {
        if let HtmlNode::Element(element) = node {
            if pred(element) {
                return Some(vec![index]);
            }
            if let Some(mut rest) = find_path(&element.children, pred) {
                let mut path = vec![index];
                path.append(&mut rest);
                return Some(path);
            }
        }
    }
    None
}

pub fn element_at_mut<'a>(
    nodes: &'a mut Vec<HtmlNode>,
    path: &[usize],
) -> Option<&'a mut HtmlElement> {
    let (first, rest) = path.split_first()?;
    match nodes.get_mut(*first)? {
        HtmlNode::Element(element) => {
            if rest.is_empty() {
                Some(element)
            } else {
                element_at_mut(&mut element.children, rest)
            }
        }
        _ => None,
    }
}
