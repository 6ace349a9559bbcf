use ego_tree::NodeRef;
use rustc_hash::FxHashMap;
use scraper::{Html, node::Node};

use crate::node::{HtmlElement, HtmlNode};

/// Parse a full HTML document into the owned node tree.
pub fn parse_document(html: &str) -> Vec<HtmlNode> {
    let document = Html::parse_document(html);
    map_children(document.tree.root())
}

/// Parse an HTML fragment (no implied `<html>`/`<body>` wrapper in the
/// result) into the owned node tree.
pub fn parse_fragment(html: &str) -> Vec<HtmlNode> {
    let fragment = Html::parse_fragment(html);
    map_children(*fragment.root_element())
}

fn map_children(node: NodeRef<'_, Node>) -> Vec<HtmlNode> {
    node.children().filter_map(map_node).collect()
}

fn map_node(node: NodeRef<'_, Node>) -> Option<HtmlNode> {
    match node.value() {
        Node::Text(text) => Some(HtmlNode::Text(text.to_string())),
        Node::Comment(comment) => Some(HtmlNode::Comment(comment.to_string())),
        Node::Element(element) => {
            let mut attributes = FxHashMap::default();
            for (name, value) in element.attrs() {
                attributes.insert(name.to_string(), Some(value.to_string()));
            }
            Some(HtmlNode::Element(HtmlElement {
                tag_name: element.name().to_lowercase(),
                attributes,
                children: map_children(node),
            }))
        }
        _ => None,
    }
}
