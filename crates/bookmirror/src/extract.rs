//! Select the title/subtitle/body region of a sanitized page. A container
//! always exists: candidate selectors first, then the document body, then
//! the whole tree.

use bookmirror_markdown::node::{HtmlElement, HtmlNode};
use url::Url;

use crate::matcher::{self, NodeMatcher};

pub(crate) const MAIN_CONTAINER_MATCHERS: [NodeMatcher; 6] = [
    NodeMatcher::Tag("main"),
    NodeMatcher::Class("book-body"),
    NodeMatcher::Class("page-wrapper"),
    NodeMatcher::Class("page"),
    NodeMatcher::Class("content"),
    NodeMatcher::Id("content"),
];

const SUBTITLE_MATCHERS: [NodeMatcher; 4] = [
    NodeMatcher::Class("subtitle"),
    NodeMatcher::Class("description"),
    NodeMatcher::Class("lead"),
    NodeMatcher::Class("page-subtitle"),
];

const BODY_MATCHERS: [NodeMatcher; 4] = [
    NodeMatcher::Class("markdown-section"),
    NodeMatcher::Class("page-inner"),
    NodeMatcher::Class("page-body"),
    NodeMatcher::Tag("article"),
];

/// The minimal extracted markup handed to the converter: title, subtitle,
/// body, in that order. Any part may be empty; the order is always
/// preserved.
#[derive(Debug, Clone, Default)]
pub struct ContentFragment {
    pub title: Vec<HtmlNode>,
    pub subtitle: Vec<HtmlNode>,
    pub body: Vec<HtmlNode>,
}

impl ContentFragment {
    /// Concatenated converter input.
    pub fn into_nodes(self) -> Vec<HtmlNode> {
        let mut nodes = self.title;
        nodes.extend(self.subtitle);
        nodes.extend(self.body);
        nodes
    }
}

fn find_by_matchers<'a>(
    nodes: &'a [HtmlNode],
    matchers: &[NodeMatcher],
) -> Option<&'a HtmlElement> {
    matchers
        .iter()
        .find_map(|m| matcher::find_element(nodes, &|el| m.matches(el)))
}

/// Extract the content fragment from a sanitized document. Image sources in
/// the body are absolutized against `page_url` before the fragment leaves
/// the document context.
pub fn extract_content(document: &[HtmlNode], page_url: &Url) -> ContentFragment {
    let main = find_by_matchers(document, &MAIN_CONTAINER_MATCHERS)
        .or_else(|| matcher::find_element(document, &|el| el.tag_name == "body"));
    let scope: &[HtmlNode] = main.map_or(document, |el| el.children.as_slice());

    let title = matcher::find_element(scope, &|el| el.tag_name == "h1")
        .or_else(|| matcher::find_element(document, &|el| el.tag_name == "h1"))
        .map(|el| vec![HtmlNode::Element(el.clone())])
        .unwrap_or_default();

    let subtitle = find_by_matchers(scope, &SUBTITLE_MATCHERS)
        .or_else(|| find_by_matchers(document, &SUBTITLE_MATCHERS))
        .map(|el| el.text().trim().to_string())
        .filter(|text| !text.is_empty())
        .map(|text| {
            // Re-wrap the trimmed text so nested markup noise does not
            // propagate.
            let mut wrapper = HtmlElement::new("p", vec![HtmlNode::Text(text)]);
            wrapper.set_attr("class", "subtitle");
            vec![HtmlNode::Element(wrapper)]
        })
        .unwrap_or_default();

    let mut body = find_by_matchers(scope, &BODY_MATCHERS)
        .map(|el| el.children.clone())
        .unwrap_or_else(|| scope.to_vec());
    absolutize_images(&mut body, page_url);

    ContentFragment {
        title,
        subtitle,
        body,
    }
}

/// Rewrite protocol-relative and root-relative image sources to absolute
/// URLs. Relative resolution after the fragment leaves the document would
/// be ambiguous.
fn absolutize_images(nodes: &mut [HtmlNode], page_url: &Url) {
    for node in nodes.iter_mut() {
        let HtmlNode::Element(element) = node else {
            continue;
        };
        if element.tag_name == "img" {
            if let Some(src) = element.attr("src").map(str::to_string) {
                if src.starts_with("//") {
                    element.set_attr("src", &format!("{}:{}", page_url.scheme(), src));
                } else if src.starts_with('/') {
                    if let Ok(absolute) = page_url.join(&src) {
                        element.set_attr("src", absolute.as_str());
                    }
                }
            }
        }
        absolutize_images(&mut element.children, page_url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmirror_markdown::Converter;
    use bookmirror_markdown::parser::parse_document;

    fn extract(html: &str, url: &str) -> ContentFragment {
        let document = parse_document(html);
        extract_content(&document, &Url::parse(url).unwrap())
    }

    fn markdown_of(fragment: ContentFragment) -> String {
        Converter::new()
            .convert(&fragment.into_nodes())
            .expect("conversion succeeds")
    }

    #[test]
    fn test_title_subtitle_body_selection() {
        let html = concat!(
            "<html><body><main>",
            "<h1>Guide</h1>",
            "<p class=\"description\">  What this covers.  </p>",
            "<div class=\"markdown-section\"><p>Body text.</p></div>",
            "</main></body></html>"
        );
        let fragment = extract(html, "https://docs.example.com/guide");
        assert_eq!(fragment.title.len(), 1);
        assert_eq!(fragment.subtitle.len(), 1);
        let markdown = markdown_of(fragment);
        assert_eq!(markdown.trim(), "# Guide\n\nWhat this covers.\n\nBody text.");
    }

    #[test]
    fn test_subtitle_is_rewrapped_from_trimmed_text() {
        let html = concat!(
            "<html><body><main><h1>T</h1>",
            "<div class=\"lead\"><span data-x=\"1\">lead </span><b>text</b></div>",
            "<article><p>b</p></article>",
            "</main></body></html>"
        );
        let fragment = extract(html, "https://docs.example.com/");
        let subtitle = fragment.subtitle[0].as_element().expect("subtitle");
        assert_eq!(subtitle.tag_name, "p");
        assert_eq!(subtitle.attr("class"), Some("subtitle"));
        assert_eq!(subtitle.text(), "lead text");
    }

    #[test]
    fn test_falls_back_to_document_body() {
        let html = "<html><body><p>plain</p></body></html>";
        let fragment = extract(html, "https://docs.example.com/");
        assert!(fragment.title.is_empty());
        assert!(fragment.subtitle.is_empty());
        let markdown = markdown_of(fragment);
        assert_eq!(markdown.trim(), "plain");
    }

    #[test]
    fn test_body_falls_back_to_main_container_itself() {
        let html = "<html><body><main><p>direct</p></main></body></html>";
        let fragment = extract(html, "https://docs.example.com/");
        let markdown = markdown_of(fragment);
        assert_eq!(markdown.trim(), "direct");
    }

    #[test]
    fn test_image_sources_are_absolutized() {
        let html = concat!(
            "<html><body><main><article>",
            "<img src=\"/img/a.png\" alt=\"a\">",
            "<img src=\"//cdn.example.com/b.png\" alt=\"b\">",
            "<img src=\"https://other.example.com/c.png\" alt=\"c\">",
            "<img src=\"relative/d.png\" alt=\"d\">",
            "</article></main></body></html>"
        );
        let fragment = extract(html, "https://docs.example.com/guide/intro");
        let markdown = markdown_of(fragment);
        assert!(markdown.contains("![a](https://docs.example.com/img/a.png)"));
        assert!(markdown.contains("![b](https://cdn.example.com/b.png)"));
        assert!(markdown.contains("![c](https://other.example.com/c.png)"));
        assert!(markdown.contains("![d](relative/d.png)"));
    }

    #[test]
    fn test_title_found_outside_main_container() {
        let html = concat!(
            "<html><body>",
            "<header><h1>Site Title</h1></header>",
            "<main><p>content</p></main>",
            "</body></html>"
        );
        let fragment = extract(html, "https://docs.example.com/");
        assert_eq!(fragment.title.len(), 1);
    }
}
