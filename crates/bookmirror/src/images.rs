//! Localize Markdown image references. Bookkeeping is keyed by occurrence
//! and scoped to one page's conversion: two occurrences of the same source
//! URL get two local files. Rewrites are span edits applied back-to-front
//! so overlapping source prefixes cannot corrupt earlier edits.

use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use regex_lite::Regex;
use url::Url;

use crate::engine::PageSession;
use crate::error::ImageError;

/// One localized image occurrence.
#[derive(Debug, Clone)]
pub struct ImageReference {
    pub original_src: String,
    pub resolved_url: Option<String>,
    pub local_path: String,
    pub downloaded: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ImageStats {
    pub downloaded: usize,
    pub failed: usize,
}

fn image_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // The outer capture spans src plus an optional trailing quoted
        // title, so a rewrite drops the title; the inner capture is the
        // src itself.
        Regex::new(r#"!\[[^\]]*\]\(\s*(([^)\s]+)(?:\s+"[^"]*")?)\s*\)"#)
            .expect("valid image reference pattern")
    })
}

/// Rewrite successfully downloaded image references to local relative
/// paths; unresolved and data-URI references pass through unchanged.
pub async fn localize_images(
    session: &mut dyn PageSession,
    markdown: &str,
    page_url: &Url,
    page_dir: &Path,
    output_dir: &Path,
) -> (String, ImageStats) {
    let mut stats = ImageStats::default();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();

    let occurrences: Vec<(Range<usize>, String)> = image_pattern()
        .captures_iter(markdown)
        .filter_map(|caps| {
            let span = caps.get(1)?.range();
            let src = caps.get(2)?.as_str().to_string();
            Some((span, src))
        })
        .collect();

    for (span, src) in occurrences {
        if src.starts_with("data:") {
            continue;
        }
        let resolved = resolve_src(&src, page_url);
        let reference = download_occurrence(session, &src, &resolved, page_dir, output_dir).await;
        if reference.downloaded {
            stats.downloaded += 1;
            edits.push((span, reference.local_path));
        } else {
            stats.failed += 1;
        }
    }

    let mut rewritten = markdown.to_string();
    for (span, replacement) in edits.into_iter().rev() {
        rewritten.replace_range(span, &replacement);
    }
    (rewritten, stats)
}

/// Absolute URL for a reference: already-absolute, else joined against the
/// page URL, else the literal src (best-effort degrade).
fn resolve_src(src: &str, page_url: &Url) -> String {
    if Url::parse(src).is_ok() {
        return src.to_string();
    }
    match page_url.join(src) {
        Ok(url) => url.to_string(),
        Err(_) => src.to_string(),
    }
}

async fn download_occurrence(
    session: &mut dyn PageSession,
    src: &str,
    resolved: &str,
    page_dir: &Path,
    output_dir: &Path,
) -> ImageReference {
    let filename = occurrence_filename(resolved);
    let mut reference = ImageReference {
        original_src: src.to_string(),
        resolved_url: Some(resolved.to_string()),
        local_path: markdown_relative_path(page_dir, &filename),
        downloaded: false,
    };
    let bytes = match fetch_in_page(session, resolved).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!("{}", error);
            return reference;
        }
    };
    let image_dir = output_dir.join("images").join(page_dir);
    if let Err(error) = tokio::fs::create_dir_all(&image_dir).await {
        tracing::warn!(
            "failed to create image directory {}: {}",
            image_dir.display(),
            error
        );
        return reference;
    }
    let target = image_dir.join(&filename);
    if let Err(error) = tokio::fs::write(&target, &bytes).await {
        tracing::warn!("failed to write image {}: {}", target.display(), error);
        return reference;
    }
    reference.downloaded = true;
    reference
}

/// Unique per occurrence: timestamp plus a random component, keeping a
/// derivable image extension and defaulting to `.png`.
fn occurrence_filename(resolved: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    let nonce: u32 = rand::thread_rng().r#gen();
    format!("{}-{:08x}{}", timestamp, nonce, image_extension(resolved))
}

fn image_extension(resolved: &str) -> String {
    let path = resolved.split(['?', '#']).next().unwrap_or(resolved);
    let candidate = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");
    if !candidate.is_empty()
        && candidate.len() <= 5
        && candidate.chars().all(|c| c.is_ascii_alphanumeric())
    {
        format!(".{}", candidate.to_ascii_lowercase())
    } else {
        ".png".to_string()
    }
}

/// Reference path from the page's own directory to the mirrored image
/// subtree.
fn markdown_relative_path(page_dir: &Path, filename: &str) -> String {
    let mut path = String::new();
    for _ in page_dir.components() {
        path.push_str("../");
    }
    path.push_str("images");
    for component in page_dir.components() {
        path.push('/');
        path.push_str(&component.as_os_str().to_string_lossy());
    }
    path.push('/');
    path.push_str(filename);
    path
}

/// Fetch the binary inside the page's execution context so the site's
/// cookie/session state applies, round-tripping through a data URL.
async fn fetch_in_page(session: &mut dyn PageSession, url: &str) -> Result<Vec<u8>, ImageError> {
    let script = format!(
        r#"(async () => {{
            try {{
                const response = await fetch({url}, {{ credentials: 'include' }});
                if (!response.ok) {{ return null; }}
                const blob = await response.blob();
                return await new Promise((resolve) => {{
                    const reader = new FileReader();
                    reader.onload = () => resolve(reader.result);
                    reader.onerror = () => resolve(null);
                    reader.readAsDataURL(blob);
                }});
            }} catch (_error) {{
                return null;
            }}
        }})()"#,
        url = serde_json::Value::String(url.to_string()),
    );
    let value = session
        .evaluate(&script)
        .await
        .map_err(|error| ImageError {
            src: url.to_string(),
            message: error.to_string(),
        })?;
    let data_url = value.as_str().ok_or_else(|| ImageError {
        src: url.to_string(),
        message: "fetch returned no data".to_string(),
    })?;
    decode_data_url(data_url).ok_or_else(|| ImageError {
        src: url.to_string(),
        message: "unparseable data URL".to_string(),
    })
}

fn decode_data_url(data_url: &str) -> Option<Vec<u8>> {
    let (_, payload) = data_url.split_once("base64,")?;
    BASE64.decode(payload).ok()
}
