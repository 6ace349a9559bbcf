//! Output layout: per-page Markdown files at paths mirroring the site's
//! relative URL structure, plus a README index mirroring the hierarchy.

use std::path::{Path, PathBuf};

use url::Url;

use crate::error::PersistenceError;
use crate::toc::PageEntry;

/// Sanitize one path component for the local filesystem.
fn sanitize_component(component: &str, max_len: usize) -> String {
    let mut sanitized: String = component
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        sanitized = "page".to_string();
    }
    if sanitized.chars().count() > max_len {
        sanitized = sanitized.chars().take(max_len).collect();
    }
    sanitized
}

/// Relative output path (under the output root) for a site-relative page
/// path. The site root maps to a filename derived from the hostname.
pub fn page_relative_path(page_path: &str, root_url: &Url) -> PathBuf {
    let trimmed = page_path.trim_matches('/');
    if trimmed.is_empty() {
        let host = root_url.host_str().unwrap_or("index");
        return PathBuf::from(format!("{}.md", sanitize_component(host, 64)));
    }
    let components: Vec<&str> = trimmed.split('/').filter(|c| !c.is_empty()).collect();
    let mut path = PathBuf::new();
    for (index, component) in components.iter().enumerate() {
        let sane = sanitize_component(component, 100);
        if index == components.len() - 1 {
            let stem = sane
                .strip_suffix(".html")
                .or_else(|| sane.strip_suffix(".htm"))
                .or_else(|| sane.strip_suffix(".md"))
                .unwrap_or(&sane);
            path.push(format!("{}.md", stem));
        } else {
            path.push(sane);
        }
    }
    path
}

/// Write an artifact, creating parent directories as needed. Prior content
/// is overwritten unconditionally.
pub async fn persist_markdown(path: &Path, content: &str) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|error| PersistenceError {
                path: path.display().to_string(),
                message: error.to_string(),
            })?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|error| PersistenceError {
            path: path.display().to_string(),
            message: error.to_string(),
        })
}

/// Render the README index: site title plus a nested bullet list mirroring
/// TOC levels, each entry linking to its Markdown artifact.
pub fn render_index(title: &str, entries: &[PageEntry], root_url: &Url) -> String {
    let mut index = format!("# {}\n\n", title);
    for entry in entries {
        let indent = "  ".repeat(entry.level.saturating_sub(1));
        let target = page_relative_path(&entry.path, root_url);
        index.push_str(&format!(
            "{}- [{}]({})\n",
            indent,
            entry.title,
            target.display()
        ));
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn root() -> Url {
        Url::parse("https://docs.example.com/").unwrap()
    }

    #[rstest]
    #[case("/", "docs.example.com.md")]
    #[case("", "docs.example.com.md")]
    #[case("/intro", "intro.md")]
    #[case("/guide/setup", "guide/setup.md")]
    #[case("/guide/setup.html", "guide/setup.md")]
    #[case("/a/b/c", "a/b/c.md")]
    #[case("/../../etc/passwd", "page/page/etc/passwd.md")]
    fn test_page_relative_path(#[case] page_path: &str, #[case] expected: &str) {
        assert_eq!(
            page_relative_path(page_path, &root()),
            PathBuf::from(expected)
        );
    }

    #[rstest]
    #[case("abcDEF-123_foo", 20, "abcDEF-123_foo")]
    #[case("!@#abc<>|", 20, "abc")]
    #[case("", 10, "page")]
    #[case("..", 10, "page")]
    #[case("valid_name", 5, "valid")]
    fn test_sanitize_component(#[case] input: &str, #[case] max_len: usize, #[case] expected: &str) {
        assert_eq!(sanitize_component(input, max_len), expected);
    }

    #[test]
    fn test_render_index_nests_by_level() {
        let entries = vec![
            PageEntry {
                title: "Intro".to_string(),
                path: "/".to_string(),
                level: 1,
            },
            PageEntry {
                title: "Setup".to_string(),
                path: "/guide/setup".to_string(),
                level: 2,
            },
            PageEntry {
                title: "FAQ".to_string(),
                path: "/faq".to_string(),
                level: 1,
            },
        ];
        let index = render_index("Example Docs", &entries, &root());
        let lines: Vec<&str> = index.lines().collect();
        assert_eq!(lines[0], "# Example Docs");
        assert_eq!(lines[2], "- [Intro](docs.example.com.md)");
        assert_eq!(lines[3], "  - [Setup](guide/setup.md)");
        assert_eq!(lines[4], "- [FAQ](faq.md)");
    }

    #[tokio::test]
    async fn test_persist_overwrites_existing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b.md");
        persist_markdown(&path, "first").await.unwrap();
        persist_markdown(&path, "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
    }
}
