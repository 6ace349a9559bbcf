use itertools::Itertools;

use crate::node::{HtmlElement, HtmlNode};

/// A conversion rule: a node-match predicate plus a replacement function.
/// Rules are tried in registration order and the first match wins; the
/// replacement may recurse through the converter for child content.
pub struct Rule {
    pub name: &'static str,
    matches: fn(&HtmlElement) -> bool,
    replace: fn(&Converter, &HtmlElement) -> miette::Result<String>,
}

/// Rule-driven DOM fragment to Markdown converter. Elements no rule claims
/// fall through to generic block and inline defaults.
pub struct Converter {
    rules: Vec<Rule>,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter {
    pub fn new() -> Self {
        Converter {
            rules: vec![
                Rule {
                    name: "table",
                    matches: is_table,
                    replace: replace_table,
                },
                Rule {
                    name: "fenced-code",
                    matches: is_code_block,
                    replace: replace_code_block,
                },
                Rule {
                    name: "list-compaction",
                    matches: is_list,
                    replace: replace_list,
                },
                Rule {
                    name: "noise",
                    matches: is_noise,
                    replace: replace_noise,
                },
            ],
        }
    }

    /// Convert a node forest to Markdown.
    pub fn convert(&self, nodes: &[HtmlNode]) -> miette::Result<String> {
        self.convert_blocks(nodes)
    }

    pub(crate) fn convert_blocks(&self, nodes: &[HtmlNode]) -> miette::Result<String> {
        let mut blocks: Vec<(String, bool)> = Vec::new();
        for node in nodes {
            match node {
                HtmlNode::Text(text) => {
                    if !text.trim().is_empty() {
                        blocks.push((text.to_string(), true));
                    }
                }
                HtmlNode::Comment(_) => {}
                HtmlNode::Element(element) => {
                    if let Some(rule) = self.rules.iter().find(|rule| (rule.matches)(element)) {
                        let replaced = (rule.replace)(self, element)?;
                        if !replaced.is_empty() {
                            blocks.push((replaced, false));
                        }
                    } else {
                        self.convert_default(element, &mut blocks)?;
                    }
                }
            }
        }
        Ok(join_blocks(&blocks))
    }

    fn convert_default(
        &self,
        element: &HtmlElement,
        blocks: &mut Vec<(String, bool)>,
    ) -> miette::Result<()> {
        match element.tag_name.as_str() {
            "html" | "head" | "header" | "footer" | "body" | "div" | "nav" | "main" | "article"
            | "section" | "hgroup" | "figure" | "aside" => {
                let inner = self.convert_blocks(&element.children)?;
                if !inner.is_empty() {
                    blocks.push((inner, false));
                }
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = element.tag_name[1..].parse().unwrap_or(1);
                let content = self.convert_inline(&element.children)?;
                blocks.push((format!("{} {}", "#".repeat(level), content.trim()), false));
            }
            "p" => {
                let content = self.convert_inline(&element.children)?;
                if !content.trim().is_empty() {
                    blocks.push((content, false));
                }
            }
            "hr" => blocks.push(("---".to_string(), false)),
            "blockquote" => {
                let inner = self.convert_blocks(&element.children)?;
                let quoted = if inner.is_empty() {
                    ">".to_string()
                } else {
                    inner.lines().map(|line| format!("> {}", line)).join("\n")
                };
                blocks.push((quoted, false));
            }
            "dl" => {
                let definition = self.convert_definition_list(element)?;
                if !definition.is_empty() {
                    blocks.push((definition, false));
                }
            }
            "strong" | "b" | "em" | "i" | "a" | "code" | "span" | "img" | "br" | "input" | "s"
            | "strike" | "del" | "kbd" | "u" | "sub" | "sup" => {
                let node = HtmlNode::Element(element.clone());
                let inline = self.convert_inline(std::slice::from_ref(&node))?;
                if !inline.is_empty() {
                    blocks.push((inline.trim().to_string(), true));
                }
            }
            _ => {
                let content = self.convert_inline(&element.children)?;
                if !content.is_empty() {
                    blocks.push((content, false));
                }
            }
        }
        Ok(())
    }

    fn convert_definition_list(&self, element: &HtmlElement) -> miette::Result<String> {
        let mut parts = Vec::new();
        for node in &element.children {
            match node {
                HtmlNode::Element(term) if term.tag_name == "dt" => {
                    let text = self.convert_inline(&term.children)?;
                    parts.push(format!("**{}**", text.trim()));
                }
                HtmlNode::Element(detail) if detail.tag_name == "dd" => {
                    let block = self.convert_blocks(&detail.children)?;
                    if !block.is_empty() {
                        parts.push(block.lines().map(|line| format!("  {}", line)).join("\n"));
                    }
                }
                _ => {}
            }
        }
        Ok(parts.join("\n"))
    }

    /// Convert nodes as inline content, emitting Markdown span syntax.
    pub fn convert_inline(&self, nodes: &[HtmlNode]) -> miette::Result<String> {
        let mut parts = Vec::new();
        for node in nodes {
            match node {
                HtmlNode::Text(text) => {
                    let trimmed = text.trim_start_matches('\n').trim_end_matches('\n');
                    let trimmed = if trimmed.starts_with(' ') {
                        format!(" {}", trimmed.trim_start())
                    } else {
                        trimmed.to_owned()
                    };
                    let trimmed = if trimmed.ends_with(' ') {
                        format!("{} ", trimmed.trim_end())
                    } else {
                        trimmed.to_owned()
                    };
                    parts.push(trimmed);
                }
                HtmlNode::Comment(_) => {}
                HtmlNode::Element(element) => {
                    let inner = self.convert_inline(&element.children)?;
                    match element.tag_name.as_str() {
                        "strong" | "b" => {
                            if !inner.is_empty() {
                                parts.push(format!("**{}**", inner));
                            }
                        }
                        "em" | "i" => {
                            if !inner.is_empty() {
                                parts.push(format!("*{}*", inner));
                            }
                        }
                        "a" => {
                            if let Some(href) = element.attr("href") {
                                let title = element
                                    .attr("title")
                                    .filter(|title| !title.is_empty())
                                    .map(|title| format!(" \"{}\"", title.replace('"', "\\\"")))
                                    .unwrap_or_default();
                                parts.push(format!(
                                    "[{}]({}{})",
                                    inner.replace('\n', "").trim(),
                                    process_url_for_markdown(href),
                                    title
                                ));
                            } else if !inner.is_empty() {
                                parts.push(inner);
                            }
                        }
                        "code" => {
                            if !inner.is_empty() {
                                parts.push(format!("`{}`", inner));
                            }
                        }
                        "br" => parts.push("  \n".to_string()),
                        "img" => {
                            if let Some(src) = element.attr("src") {
                                if !src.is_empty() {
                                    let alt = element.attr("alt").unwrap_or("");
                                    let title = element
                                        .attr("title")
                                        .filter(|title| !title.is_empty())
                                        .map(|title| {
                                            format!(" \"{}\"", title.replace('"', "\\\""))
                                        })
                                        .unwrap_or_default();
                                    parts.push(format!(
                                        "![{}]({}{})",
                                        alt,
                                        process_url_for_markdown(src),
                                        title
                                    ));
                                }
                            }
                        }
                        "input" => {
                            if let Some(kind) = element.attr("type") {
                                match kind.to_lowercase().as_str() {
                                    "checkbox" | "radio" => {
                                        if element.attributes.contains_key("checked") {
                                            parts.push("[x] ".to_string());
                                        } else {
                                            parts.push("[ ] ".to_string());
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        }
                        "s" | "strike" | "del" => {
                            if !inner.is_empty() {
                                parts.push(format!("~~{}~~", inner));
                            }
                        }
                        "kbd" => parts.push(format!("<kbd>{}</kbd>", inner)),
                        "u" => parts.push(format!("<u>{}</u>", inner)),
                        _ => parts.push(inner),
                    }
                }
            }
        }
        Ok(parts.join(""))
    }
}

fn join_blocks(blocks: &[(String, bool)]) -> String {
    let mut result = String::new();
    for (index, (content, is_inline)) in blocks.iter().enumerate() {
        if !is_inline
            && index > 0
            && !content.is_empty()
            && !result.ends_with("\n\n")
            && !result.ends_with("```\n")
            && !result.ends_with("  \n")
            && !(result.ends_with('\n') && content.starts_with('\n'))
        {
            result.push_str("\n\n");
        }
        result.push_str(if *is_inline {
            content
        } else {
            content.trim_start_matches(' ')
        });
    }
    result
}

fn process_url_for_markdown(url: &str) -> String {
    let processed = url.replace(' ', "%20");
    let needs_angle_brackets =
        url.is_empty() || url.contains(' ') || processed.contains('(') || processed.contains(')');
    if needs_angle_brackets {
        format!("<{}>", processed)
    } else {
        processed
    }
}

// --- Table rule ---

fn is_table(element: &HtmlElement) -> bool {
    element.tag_name == "table"
}

fn replace_table(converter: &Converter, element: &HtmlElement) -> miette::Result<String> {
    match build_table(converter, element) {
        Ok(table) => Ok(table),
        // A malformed table must never abort the document; degrade to the
        // default conversion of its content.
        Err(_) => {
            let fallback = converter
                .convert_blocks(&element.children)
                .unwrap_or_default();
            Ok(format!("\n{}\n", fallback.trim()))
        }
    }
}

fn table_rows(element: &HtmlElement) -> Vec<&HtmlElement> {
    fn walk<'a>(nodes: &'a [HtmlNode], out: &mut Vec<&'a HtmlElement>) {
        for node in nodes {
            if let HtmlNode::Element(el) = node {
                if el.tag_name == "tr" {
                    out.push(el);
                } else {
                    walk(&el.children, out);
                }
            }
        }
    }
    let mut rows = Vec::new();
    walk(&element.children, &mut rows);
    rows
}

fn row_cells(row: &HtmlElement) -> Vec<&HtmlElement> {
    row.children
        .iter()
        .filter_map(|node| node.as_element())
        .filter(|el| el.tag_name == "td" || el.tag_name == "th")
        .collect()
}

/// Collapse newlines to single spaces, escape literal pipes, trim.
fn normalize_cell(content: &str) -> String {
    content
        .split('\n')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .join(" ")
        .replace('|', "\\|")
}

fn build_table(converter: &Converter, element: &HtmlElement) -> miette::Result<String> {
    let rows = table_rows(element);
    if rows.is_empty() {
        return Ok(String::new());
    }
    let header_index = rows
        .iter()
        .position(|row| row_cells(row).iter().any(|cell| cell.tag_name == "th"))
        .unwrap_or(0);
    let header_cells = converted_cells(converter, rows[header_index])?;
    if header_cells.is_empty() {
        return Ok(String::new());
    }
    let columns = header_cells.len();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(format!("| {} |", header_cells.join(" | ")));
    lines.push(separator_line(columns));
    for (index, row) in rows.iter().enumerate() {
        if index == header_index {
            continue;
        }
        let cells = converted_cells(converter, row)?;
        // Re-align to the header width: missing cells become empty fields,
        // extra cells are not emitted.
        let aligned: Vec<String> = (0..columns)
            .map(|column| cells.get(column).cloned().unwrap_or_default())
            .collect();
        lines.push(format!("| {} |", aligned.join(" | ")));
    }
    Ok(lines.join("\n"))
}

fn converted_cells(converter: &Converter, row: &HtmlElement) -> miette::Result<Vec<String>> {
    row_cells(row)
        .iter()
        .map(|cell| {
            converter
                .convert_inline(&cell.children)
                .map(|content| normalize_cell(&content))
        })
        .collect()
}

pub(crate) fn separator_line(columns: usize) -> String {
    format!("|{}|", vec![" --- "; columns.max(1)].join("|"))
}

// --- Fenced code rule ---

fn is_code_block(element: &HtmlElement) -> bool {
    (element.tag_name == "pre" && element.find(&|el| el.tag_name == "code").is_some())
        || element.has_class("code-block")
        || element.has_class("codeblock")
}

fn replace_code_block(_converter: &Converter, element: &HtmlElement) -> miette::Result<String> {
    let code = if element.tag_name == "code" {
        Some(element)
    } else {
        element.find(&|el| el.tag_name == "code")
    };
    let Some(code) = code else {
        return Ok(String::new());
    };
    let language = code
        .classes()
        .find_map(|class| {
            class
                .strip_prefix("language-")
                .or_else(|| class.strip_prefix("lang-"))
        })
        .unwrap_or("");
    let text = raw_text(&code.children);
    Ok(format!("```{}\n{}\n```", language, trim_blank_lines(&text)))
}

/// Raw text of a code element, with `<br>` as newlines and markup dropped.
fn raw_text(nodes: &[HtmlNode]) -> String {
    let mut text = String::new();
    for node in nodes {
        match node {
            HtmlNode::Text(content) => text.push_str(content),
            HtmlNode::Element(el) if el.tag_name == "br" => text.push('\n'),
            HtmlNode::Element(el) => text.push_str(&raw_text(&el.children)),
            HtmlNode::Comment(_) => {}
        }
    }
    text
}

/// Drop leading and trailing blank lines; interior whitespace is preserved
/// exactly.
fn trim_blank_lines(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| !line.trim().is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(start, |index| index + 1);
    lines[start..end].join("\n")
}

// --- List compaction rule ---

fn is_list(element: &HtmlElement) -> bool {
    element.tag_name == "ul" || element.tag_name == "ol"
}

fn replace_list(converter: &Converter, element: &HtmlElement) -> miette::Result<String> {
    let converted = convert_list(converter, element)?;
    let compacted = converted
        .lines()
        .filter(|line| !line.trim().is_empty())
        .join("\n");
    if compacted.is_empty() {
        return Ok(String::new());
    }
    Ok(format!("\n{}\n", compacted))
}

fn convert_list(converter: &Converter, list: &HtmlElement) -> miette::Result<String> {
    let mut number = if list.tag_name == "ol" {
        list.attr("start")
            .and_then(|start| start.parse::<usize>().ok())
            .unwrap_or(1)
    } else {
        0
    };
    let mut items = Vec::new();
    for node in &list.children {
        let HtmlNode::Element(item) = node else {
            continue;
        };
        if item.tag_name != "li" {
            continue;
        }
        let marker = if list.tag_name == "ol" {
            let marker = format!("{}. ", number);
            number += 1;
            marker
        } else {
            "* ".to_string()
        };
        let content = converter.convert_blocks(&item.children)?;
        if content.is_empty() {
            items.push(marker);
            continue;
        }
        let continuation = " ".repeat(marker.len());
        for (index, line) in content.lines().enumerate() {
            if index == 0 {
                items.push(format!("{}{}", marker, line));
            } else {
                items.push(format!("{}{}", continuation, line));
            }
        }
    }
    Ok(items.join("\n"))
}

// --- Noise removal rule ---

fn is_noise(element: &HtmlElement) -> bool {
    matches!(element.tag_name.as_str(), "script" | "style")
}

fn replace_noise(_converter: &Converter, _element: &HtmlElement) -> miette::Result<String> {
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use rstest::rstest;

    fn convert(html: &str) -> String {
        Converter::new()
            .convert(&parse_document(html))
            .expect("conversion succeeds")
    }

    #[rstest]
    #[case("<p>Hello, world!</p>", "Hello, world!")]
    #[case("<h2>Title</h2>", "## Title")]
    #[case(
        "<p><strong>Bold</strong> and <em>Italic</em></p>",
        "**Bold** and *Italic*"
    )]
    #[case(
        "<a href=\"https://example.com\">link</a>",
        "[link](https://example.com)"
    )]
    #[case("<blockquote><p>Quote</p></blockquote>", "> Quote")]
    #[case("<img src=\"img.png\" alt=\"alt text\">", "![alt text](img.png)")]
    #[case("<hr>", "---")]
    #[case("<del>gone</del>", "~~gone~~")]
    #[case("<p>before<br>after</p>", "before  \nafter")]
    fn test_default_conversion(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(convert(html).trim(), expected);
    }

    #[rstest]
    #[case(
        "<ul><li>Item 1</li><li>Item 2</li></ul>",
        "* Item 1\n* Item 2"
    )]
    #[case(
        "<ol><li>First</li><li>Second</li></ol>",
        "1. First\n2. Second"
    )]
    #[case(
        "<ol start=\"3\"><li>Third</li></ol>",
        "3. Third"
    )]
    fn test_list_conversion(#[case] html: &str, #[case] expected: &str) {
        assert_eq!(convert(html).trim(), expected);
    }

    #[test]
    fn test_list_compaction_drops_blank_lines() {
        let html = "<ul><li><p>One</p><p>Two</p></li><li>Three</li></ul>";
        let markdown = convert(html);
        let lines: Vec<&str> = markdown.trim().lines().collect();
        assert!(lines.iter().all(|line| !line.trim().is_empty()));
        assert_eq!(lines[0], "* One");
        assert_eq!(lines[1], "  Two");
        assert_eq!(lines[2], "* Three");
    }

    #[test]
    fn test_nested_list_levels() {
        let html = "<ul><li>Outer<ul><li>Inner</li></ul></li></ul>";
        let markdown = convert(html);
        assert!(markdown.contains("* Outer"));
        assert!(markdown.contains("  * Inner"));
    }

    #[test]
    fn test_fenced_code_with_language() {
        let html = "<pre><code class=\"language-rust\">let x = 1;</code></pre>";
        assert_eq!(convert(html).trim(), "```rust\nlet x = 1;\n```");
    }

    #[test]
    fn test_fenced_code_preserves_interior_whitespace() {
        let html = "<pre><code>\n\nfn a() {\n\n    body();\n}\n\n</code></pre>";
        let markdown = convert(html);
        assert_eq!(markdown.trim(), "```\nfn a() {\n\n    body();\n}\n```");
    }

    #[test]
    fn test_code_block_marker_without_code_emits_nothing() {
        let html = "<div class=\"code-block\"><span>no code element</span></div>";
        assert_eq!(convert(html).trim(), "");
    }

    #[test]
    fn test_table_basic_shape() {
        let html = concat!(
            "<table><thead><tr><th>Name</th><th>Role</th></tr></thead>",
            "<tbody><tr><td>Ada</td><td>Engineer</td></tr></tbody></table>"
        );
        assert_eq!(
            convert(html).trim(),
            "| Name | Role |\n| --- | --- |\n| Ada | Engineer |"
        );
    }

    #[test]
    fn test_table_escapes_pipes() {
        let html = "<table><tr><th>a|b</th></tr><tr><td>c|d</td></tr></table>";
        let markdown = convert(html);
        assert!(markdown.contains("a\\|b"));
        assert!(markdown.contains("c\\|d"));
    }

    #[test]
    fn test_table_pads_and_truncates_to_header_width() {
        let html = concat!(
            "<table><tr><th>A</th><th>B</th></tr>",
            "<tr><td>1</td></tr>",
            "<tr><td>1</td><td>2</td><td>3</td></tr></table>"
        );
        let markdown = convert(html);
        let lines: Vec<&str> = markdown.trim().lines().collect();
        assert_eq!(lines.len(), 4);
        for line in &lines {
            let fields = line.trim_matches('|').split('|').count();
            assert_eq!(fields, 2, "line {:?} should have 2 fields", line);
        }
    }

    #[test]
    fn test_table_without_header_cells_uses_first_row() {
        let html = "<table><tr><td>x</td><td>y</td></tr><tr><td>1</td><td>2</td></tr></table>";
        assert_eq!(
            convert(html).trim(),
            "| x | y |\n| --- | --- |\n| 1 | 2 |"
        );
    }

    #[test]
    fn test_empty_table_emits_nothing() {
        assert_eq!(convert("<table></table>").trim(), "");
        assert_eq!(convert("<table><tbody></tbody></table>").trim(), "");
    }

    #[test]
    fn test_table_inside_container_is_still_ruled() {
        let html = "<div><table><tr><th>H</th></tr><tr><td>v</td></tr></table></div>";
        assert_eq!(convert(html).trim(), "| H |\n| --- |\n| v |");
    }

    #[test]
    fn test_noise_rule_emits_nothing() {
        assert_eq!(convert("<script>alert(1)</script>").trim(), "");
        assert_eq!(convert("<style>p { color: red }</style>").trim(), "");
    }
}
