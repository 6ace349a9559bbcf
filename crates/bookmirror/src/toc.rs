use itertools::Itertools;
use regex_lite::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

/// One page discovered in the site hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub title: String,
    /// Site-relative path, normalized to a leading `/`.
    pub path: String,
    /// Nesting depth in the hierarchy, 1 = top level.
    pub level: usize,
}

/// Container strategies in priority order: the modern table-of-contents
/// marker, then the classic summary list.
const CONTAINER_SELECTORS: [&str; 4] = [
    r#"[data-testid="table-of-contents"]"#,
    r#"nav[aria-label="Table of contents"]"#,
    "ul.summary",
    ".book-summary",
];

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid scheme pattern"))
}

/// Normalize a hierarchy link href to a site-relative path. Idempotent.
pub fn normalize_href(href: &str) -> String {
    let trimmed = href.strip_prefix("./").unwrap_or(href);
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Discover the ordered page hierarchy from the root page HTML. An empty
/// result means no recognizable hierarchy container; the caller falls back
/// to single-page mode. Duplicate hrefs yield duplicate entries.
pub fn resolve_toc(html: &str) -> Vec<PageEntry> {
    let document = Html::parse_document(html);
    let container = CONTAINER_SELECTORS.iter().find_map(|selector| {
        let selector = Selector::parse(selector).ok()?;
        document.select(&selector).next()
    });
    let Some(container) = container else {
        return Vec::new();
    };

    let link_selector = Selector::parse("a[href]").expect("valid link selector");
    let mut entries = Vec::new();
    for link in container.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        if scheme_pattern().is_match(href) {
            continue;
        }
        let title = link.text().collect::<String>().split_whitespace().join(" ");
        entries.push(PageEntry {
            title,
            path: normalize_href(href),
            level: nesting_level(link, container),
        });
    }
    entries
}

/// Count list-item ancestors strictly below the container, floored at 1.
fn nesting_level(link: ElementRef<'_>, container: ElementRef<'_>) -> usize {
    let mut level = 0;
    for ancestor in link.ancestors() {
        if ancestor.id() == container.id() {
            break;
        }
        if let Some(element) = ElementRef::wrap(ancestor) {
            if element.value().name() == "li" {
                level += 1;
            }
        }
    }
    level.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/foo/bar", "/foo/bar")]
    #[case("./foo/bar", "/foo/bar")]
    #[case("foo/bar", "/foo/bar")]
    #[case("/", "/")]
    fn test_normalize_href(#[case] href: &str, #[case] expected: &str) {
        assert_eq!(normalize_href(href), expected);
        // Idempotent: normalizing the result changes nothing.
        assert_eq!(normalize_href(&normalize_href(href)), expected);
    }

    #[test]
    fn test_no_container_returns_empty() {
        let html = "<html><body><a href=\"/page\">page</a></body></html>";
        assert!(resolve_toc(html).is_empty());
    }

    #[test]
    fn test_classic_summary_links_in_document_order() {
        let html = concat!(
            "<html><body><ul class=\"summary\">",
            "<li><a href=\"/\">Introduction</a></li>",
            "<li><a href=\"./guide/setup\">Setup</a></li>",
            "<li><a href=\"guide/usage\">Usage</a></li>",
            "</ul></body></html>"
        );
        let entries = resolve_toc(html);
        assert_eq!(
            entries.iter().map(|e| e.path.as_str()).collect::<Vec<_>>(),
            vec!["/", "/guide/setup", "/guide/usage"]
        );
        assert_eq!(entries[0].title, "Introduction");
        assert!(entries.iter().all(|e| e.level == 1));
    }

    #[test]
    fn test_skips_external_fragment_and_empty_links() {
        let html = concat!(
            "<html><body><ul class=\"summary\">",
            "<li><a href=\"https://elsewhere.test/x\">External</a></li>",
            "<li><a href=\"mailto:a@b.c\">Mail</a></li>",
            "<li><a href=\"#\">Fragment</a></li>",
            "<li><a href=\"#section\">Section</a></li>",
            "<li><a href=\"\">Empty</a></li>",
            "<li><a href=\"/kept\">Kept</a></li>",
            "</ul></body></html>"
        );
        let entries = resolve_toc(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/kept");
    }

    #[test]
    fn test_level_counts_list_item_ancestors() {
        // list -> li -> list -> li -> list -> li -> link: depth 3.
        let html = concat!(
            "<html><body><ul class=\"summary\">",
            "<li><a href=\"/top\">Top</a>",
            "<ul><li><a href=\"/mid\">Mid</a>",
            "<ul><li><a href=\"/deep\">Deep</a></li></ul>",
            "</li></ul>",
            "</li></ul></body></html>"
        );
        let entries = resolve_toc(html);
        let levels: Vec<(String, usize)> = entries
            .iter()
            .map(|e| (e.path.clone(), e.level))
            .collect();
        assert_eq!(
            levels,
            vec![
                ("/top".to_string(), 1),
                ("/mid".to_string(), 2),
                ("/deep".to_string(), 3)
            ]
        );
    }

    #[test]
    fn test_link_without_list_item_ancestor_floors_at_one() {
        let html = concat!(
            "<html><body><div data-testid=\"table-of-contents\">",
            "<a href=\"/bare\">Bare</a>",
            "</div></body></html>"
        );
        let entries = resolve_toc(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, 1);
    }

    #[test]
    fn test_duplicate_hrefs_are_preserved() {
        let html = concat!(
            "<html><body><ul class=\"summary\">",
            "<li><a href=\"/twice\">First</a></li>",
            "<li><a href=\"/twice\">Second</a></li>",
            "</ul></body></html>"
        );
        let entries = resolve_toc(html);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, entries[1].path);
    }

    #[test]
    fn test_modern_container_takes_priority() {
        let html = concat!(
            "<html><body>",
            "<div data-testid=\"table-of-contents\"><a href=\"/modern\">M</a></div>",
            "<ul class=\"summary\"><li><a href=\"/classic\">C</a></li></ul>",
            "</body></html>"
        );
        let entries = resolve_toc(html);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/modern");
    }
}
