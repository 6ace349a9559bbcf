//! In-place removal of non-content noise from a parsed page, applied before
//! extraction. Removal classes run in a fixed order; ambiguous content is
//! never removed.

use bookmirror_markdown::node::{HtmlElement, HtmlNode};
use regex_lite::Regex;
use std::sync::OnceLock;

use crate::extract::MAIN_CONTAINER_MATCHERS;
use crate::matcher::{self, NodeMatcher};

const NO_RENDER_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Known plugin/analytics/ad containers that never carry content.
const PLUGIN_MATCHERS: [NodeMatcher; 6] = [
    NodeMatcher::Class("adsbygoogle"),
    NodeMatcher::Id("carbonads"),
    NodeMatcher::Class("carbon-ads"),
    NodeMatcher::Class("view-count"),
    NodeMatcher::Class("pageview-count"),
    NodeMatcher::Class("sharethis-inline-share-buttons"),
];

const SEARCH_WIDGET_MATCHERS: [NodeMatcher; 4] = [
    NodeMatcher::AttrEquals("role", "search"),
    NodeMatcher::Class("algolia-autocomplete"),
    NodeMatcher::Class("docsearch"),
    NodeMatcher::Class("search-box"),
];

const VENDOR_SEARCH_KEYWORDS: [&str; 3] = ["algolia", "docsearch", "typeahead"];

const COUNT_MATCHERS: [NodeMatcher; 3] = [
    NodeMatcher::Class("count"),
    NodeMatcher::Class("views"),
    NodeMatcher::Id("views"),
];

const DATA_ATTR_ALLOWLIST: [&str; 2] = ["data-src", "data-href"];

fn tracking_iframe_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)count|analytics|google-analytics|track|pixel")
            .expect("valid tracking pattern")
    })
}

fn view_count_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\d+(\s+views?)?$|^views?\s*:\s*\d+$").expect("valid view count pattern")
    })
}

/// Strip noise from a parsed document, in place.
pub fn sanitize(document: &mut Vec<HtmlNode>) {
    remove_matching(document, &|el| {
        NO_RENDER_TAGS.contains(&el.tag_name.as_str()) || is_import_link(el)
    });
    remove_matching(document, &|el| {
        PLUGIN_MATCHERS.iter().any(|m| m.matches(el))
    });
    remove_matching(document, &is_tracking_iframe);
    strip_event_handlers(document);
    strip_comments(document);
    strip_tracking_attributes_in_main(document);
    remove_matching(document, &is_removable_search_widget);
    remove_matching(document, &is_view_counter);
}

fn remove_matching(nodes: &mut Vec<HtmlNode>, pred: &dyn Fn(&HtmlElement) -> bool) {
    nodes.retain(|node| match node {
        HtmlNode::Element(element) => !pred(element),
        _ => true,
    });
    for node in nodes.iter_mut() {
        if let HtmlNode::Element(element) = node {
            remove_matching(&mut element.children, pred);
        }
    }
}

fn is_import_link(element: &HtmlElement) -> bool {
    element.tag_name == "link"
        && element
            .attr("rel")
            .is_some_and(|rel| rel.eq_ignore_ascii_case("import"))
}

fn is_tracking_iframe(element: &HtmlElement) -> bool {
    if element.tag_name != "iframe" {
        return false;
    }
    match element.attr("src") {
        None => true,
        Some(src) if src.is_empty() => true,
        Some(src) => tracking_iframe_pattern().is_match(src),
    }
}

fn strip_event_handlers(nodes: &mut Vec<HtmlNode>) {
    for node in nodes.iter_mut() {
        if let HtmlNode::Element(element) = node {
            element
                .attributes
                .retain(|name, _| !name.to_ascii_lowercase().starts_with("on"));
            strip_event_handlers(&mut element.children);
        }
    }
}

fn strip_comments(nodes: &mut Vec<HtmlNode>) {
    nodes.retain(|node| !matches!(node, HtmlNode::Comment(_)));
    for node in nodes.iter_mut() {
        if let HtmlNode::Element(element) = node {
            strip_comments(&mut element.children);
        }
    }
}

/// Inside the main container only: drop `aria-*` unconditionally and
/// `data-*` unless it is a lazy-load source hint.
fn strip_tracking_attributes_in_main(document: &mut Vec<HtmlNode>) {
    let path = MAIN_CONTAINER_MATCHERS
        .iter()
        .find_map(|m| matcher::find_path(document, &|el| m.matches(el)))
        .or_else(|| matcher::find_path(document, &|el| el.tag_name == "body"));
    match path.and_then(|path| matcher::element_at_mut(document, &path)) {
        Some(main) => strip_tracking_attributes(main),
        None => {
            for node in document.iter_mut() {
                if let HtmlNode::Element(element) = node {
                    strip_tracking_attributes(element);
                }
            }
        }
    }
}

fn strip_tracking_attributes(element: &mut HtmlElement) {
    element.attributes.retain(|name, _| {
        let name = name.to_ascii_lowercase();
        if name.starts_with("aria-") {
            return false;
        }
        if name.starts_with("data-") {
            return DATA_ATTR_ALLOWLIST.contains(&name.as_str())
                || name.starts_with("data-original");
        }
        true
    });
    for node in element.children.iter_mut() {
        if let HtmlNode::Element(child) = node {
            strip_tracking_attributes(child);
        }
    }
}

/// Search widgets are removed only when they demonstrably are widgets: they
/// contain an interactive control, or a vendor name appears in their
/// class/id. Prose that merely mentions "search" survives.
fn is_removable_search_widget(element: &HtmlElement) -> bool {
    if !SEARCH_WIDGET_MATCHERS.iter().any(|m| m.matches(element)) {
        return false;
    }
    let has_control = element
        .find(&|el| matches!(el.tag_name.as_str(), "input" | "textarea" | "button"))
        .is_some();
    has_control || has_vendor_search_name(element)
}

fn has_vendor_search_name(element: &HtmlElement) -> bool {
    let mut names: Vec<String> = element.classes().map(str::to_ascii_lowercase).collect();
    if let Some(id) = element.id() {
        names.push(id.to_ascii_lowercase());
    }
    names
        .iter()
        .any(|name| VENDOR_SEARCH_KEYWORDS.iter().any(|kw| name.contains(kw)))
}

/// Count elements go only when their whole trimmed text is a view counter.
fn is_view_counter(element: &HtmlElement) -> bool {
    if !COUNT_MATCHERS.iter().any(|m| m.matches(element)) {
        return false;
    }
    view_count_pattern().is_match(element.text().trim())
}
