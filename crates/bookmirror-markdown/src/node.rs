use rustc_hash::FxHashMap;

/// A parsed HTML node, owned and mutable so that callers can rewrite the
/// tree before conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlNode {
    Text(String),
    Element(HtmlElement),
    Comment(String),
}

impl HtmlNode {
    pub fn as_element(&self) -> Option<&HtmlElement> {
        match self {
            HtmlNode::Element(element) => Some(element),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HtmlElement {
    pub tag_name: String,
    pub attributes: FxHashMap<String, Option<String>>,
    pub children: Vec<HtmlNode>,
}

impl HtmlElement {
    pub fn new(tag_name: &str, children: Vec<HtmlNode>) -> Self {
        HtmlElement {
            tag_name: tag_name.to_lowercase(),
            attributes: FxHashMap::default(),
            children,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|value| value.as_deref())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attributes
            .insert(name.to_string(), Some(value.to_string()));
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c.eq_ignore_ascii_case(class))
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text(&self) -> String {
        fn collect(nodes: &[HtmlNode], out: &mut String) {
            for node in nodes {
                match node {
                    HtmlNode::Text(text) => out.push_str(text),
                    HtmlNode::Element(element) => collect(&element.children, out),
                    HtmlNode::Comment(_) => {}
                }
            }
        }
        let mut out = String::new();
        collect(&self.children, &mut out);
        out
    }

    /// Depth-first search for the first descendant element matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&HtmlElement) -> bool) -> Option<&HtmlElement> {
        for node in &self.children {
            if let HtmlNode::Element(element) = node {
                if pred(element) {
                    return Some(element);
                }
                if let Some(found) = element.find(pred) {
                    return Some(found);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element_with_class(tag: &str, class: &str) -> HtmlElement {
        let mut element = HtmlElement::new(tag, vec![]);
        element.set_attr("class", class);
        element
    }

    #[test]
    fn test_has_class_is_token_based() {
        let element = element_with_class("div", "book-body page-wrapper");
        assert!(element.has_class("book-body"));
        assert!(element.has_class("page-wrapper"));
        assert!(!element.has_class("page"));
    }

    #[test]
    fn test_text_skips_comments() {
        let element = HtmlElement::new(
            "p",
            vec![
                HtmlNode::Text("a".to_string()),
                HtmlNode::Comment("hidden".to_string()),
                HtmlNode::Element(HtmlElement::new(
                    "em",
                    vec![HtmlNode::Text("b".to_string())],
                )),
            ],
        );
        assert_eq!(element.text(), "ab");
    }

    #[test]
    fn test_find_is_depth_first() {
        let inner = HtmlElement::new("code", vec![HtmlNode::Text("x".to_string())]);
        let pre = HtmlElement::new("pre", vec![HtmlNode::Element(inner)]);
        let div = HtmlElement::new("div", vec![HtmlNode::Element(pre)]);
        let found = div.find(&|el| el.tag_name == "code");
        assert_eq!(found.map(|el| el.text()), Some("x".to_string()));
    }
}
