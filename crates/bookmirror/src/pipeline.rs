//! Bounded worker pool driving per-page fetch, convert, and persist. Pages
//! are assigned to workers by a striped round-robin scheme so each page is
//! processed exactly once; a page's failure is logged and counted, never
//! propagated to its siblings.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bookmirror_markdown::{Converter, normalize_tables, parser};
use futures::future;
use url::Url;

use crate::config::MirrorConfig;
use crate::engine::{DocumentEngine, PageSession, WaitUntil};
use crate::error::MirrorError;
use crate::extract;
use crate::images::{self, ImageStats};
use crate::output;
use crate::resilience;
use crate::sanitize;
use crate::toc::{self, PageEntry};

/// Marker that the themed page body has rendered. Missing it is non-fatal.
const CONTENT_READY_SELECTOR: &str = "main, .book-body, .markdown-section, article";

#[derive(Debug, Default)]
pub struct RunStats {
    pub pages_converted: usize,
    pub pages_skipped: usize,
    pub pages_failed: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
}

impl RunStats {
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            Some(end.duration_since(start))
        } else {
            None
        }
    }

    fn absorb(&mut self, other: RunStats) {
        self.pages_converted += other.pages_converted;
        self.pages_skipped += other.pages_skipped;
        self.pages_failed += other.pages_failed;
        self.images_downloaded += other.images_downloaded;
        self.images_failed += other.images_failed;
    }

    pub fn write_stats_to_stderr(&self) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();

        let _ = writeln!(handle, "\n=== Mirror Statistics ===");
        let _ = writeln!(handle, "Pages converted: {}", self.pages_converted);
        let _ = writeln!(handle, "Pages skipped (empty): {}", self.pages_skipped);
        let _ = writeln!(handle, "Pages failed: {}", self.pages_failed);
        let _ = writeln!(handle, "Images downloaded: {}", self.images_downloaded);
        let _ = writeln!(handle, "Images failed: {}", self.images_failed);
        if let Some(duration) = self.duration() {
            let _ = writeln!(handle, "Total duration: {:.2}s", duration.as_secs_f64());
        }
        let _ = writeln!(handle, "=========================\n");
    }
}

enum PageOutcome {
    Converted(ImageStats),
    Empty,
}

pub struct Mirror {
    engine: Arc<dyn DocumentEngine>,
    config: Arc<MirrorConfig>,
}

impl Mirror {
    pub fn new(engine: Arc<dyn DocumentEngine>, config: MirrorConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    pub async fn run(&self) -> Result<RunStats, MirrorError> {
        let mut stats = RunStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        };

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(|error| MirrorError::OutputDir {
                path: self.config.output_dir.display().to_string(),
                message: error.to_string(),
            })?;

        let (mut entries, effective_root, title) = self.discover().await?;
        let discovered_toc = !entries.is_empty();
        if discovered_toc {
            tracing::info!("discovered {} pages in the hierarchy", entries.len());
            let index = output::render_index(&title, &entries, &effective_root);
            let index_path = self.config.output_dir.join("README.md");
            if let Err(error) = output::persist_markdown(&index_path, &index).await {
                tracing::warn!("{}", error);
            }
        } else {
            tracing::info!("no hierarchy container found; single-page mode");
            entries.push(PageEntry {
                title: title.clone(),
                path: self.config.root_url.path().to_string(),
                level: 1,
            });
        }

        let worker_count = self.config.concurrency.max(1).min(entries.len());
        let entries = Arc::new(entries);
        let mut workers = Vec::with_capacity(worker_count);
        for worker in 0..worker_count {
            let engine = Arc::clone(&self.engine);
            let config = Arc::clone(&self.config);
            let entries = Arc::clone(&entries);
            let origin = effective_root.clone();
            workers.push(tokio::spawn(async move {
                let mut partial = RunStats::default();
                let mut index = worker;
                while index < entries.len() {
                    let entry = &entries[index];
                    match process_page(engine.as_ref(), &config, entry, &origin).await {
                        Ok(PageOutcome::Converted(image_stats)) => {
                            partial.pages_converted += 1;
                            partial.images_downloaded += image_stats.downloaded;
                            partial.images_failed += image_stats.failed;
                        }
                        Ok(PageOutcome::Empty) => partial.pages_skipped += 1,
                        Err(error) => {
                            tracing::warn!("skipping page {}: {}", entry.path, error);
                            partial.pages_failed += 1;
                        }
                    }
                    index += worker_count;
                }
                partial
            }));
        }
        for worker in future::join_all(workers).await {
            match worker {
                Ok(partial) => stats.absorb(partial),
                Err(error) => tracing::error!("worker task failed: {}", error),
            }
        }

        stats.end_time = Some(Instant::now());
        Ok(stats)
    }

    /// Load the root page and discover the hierarchy. Returns the ordered
    /// entries (empty when no container was found), the effective root URL
    /// after retries, and the site title for the index.
    async fn discover(&self) -> Result<(Vec<PageEntry>, Url, String), MirrorError> {
        let mut session = self
            .engine
            .open()
            .await
            .map_err(|error| MirrorError::Engine(error.to_string()))?;
        let result = self.discover_with(session.as_mut()).await;
        session.close().await;
        result
    }

    async fn discover_with(
        &self,
        session: &mut dyn PageSession,
    ) -> Result<(Vec<PageEntry>, Url, String), MirrorError> {
        if let Some(credentials) = &self.config.auth {
            if let Err(error) = session.authenticate(credentials).await {
                tracing::warn!("failed to apply basic auth to the root session: {}", error);
            }
        }
        let effective = resilience::navigate_with_retries(
            session,
            &self.config.root_url,
            self.config.auth.as_ref(),
            WaitUntil::NetworkIdle,
            self.config.navigation_timeout,
        )
        .await?;
        if let Some(credentials) = &self.config.auth {
            match resilience::maybe_form_login(session, credentials, self.config.content_timeout)
                .await
            {
                Ok(true) => tracing::info!("submitted login form on the root page"),
                Ok(false) => {}
                Err(error) => tracing::warn!("form login failed: {}", error),
            }
        }
        session
            .wait_for_selector(CONTENT_READY_SELECTOR, self.config.content_timeout)
            .await;
        let html = session
            .content()
            .await
            .map_err(|error| MirrorError::Engine(error.to_string()))?;
        let title = site_title(&html, &effective);
        let entries = if self.config.crawl_all {
            toc::resolve_toc(&html)
        } else {
            Vec::new()
        };
        Ok((entries, effective, title))
    }
}

async fn process_page(
    engine: &dyn DocumentEngine,
    config: &MirrorConfig,
    entry: &PageEntry,
    origin: &Url,
) -> Result<PageOutcome, MirrorError> {
    let mut session = engine
        .open()
        .await
        .map_err(|error| MirrorError::Engine(error.to_string()))?;
    let outcome = process_with_session(session.as_mut(), config, entry, origin).await;
    session.close().await;
    outcome
}

async fn process_with_session(
    session: &mut dyn PageSession,
    config: &MirrorConfig,
    entry: &PageEntry,
    origin: &Url,
) -> Result<PageOutcome, MirrorError> {
    if let Some(credentials) = &config.auth {
        if let Err(error) = session.authenticate(credentials).await {
            tracing::warn!("failed to apply basic auth for {}: {}", entry.path, error);
        }
    }
    let target = origin
        .join(&entry.path)
        .map_err(|error| MirrorError::InvalidPath {
            path: entry.path.clone(),
            message: error.to_string(),
        })?;
    let effective = resilience::navigate_with_retries(
        session,
        &target,
        config.auth.as_ref(),
        WaitUntil::NetworkIdle,
        config.navigation_timeout,
    )
    .await?;
    session
        .wait_for_selector(CONTENT_READY_SELECTOR, config.content_timeout)
        .await;
    let html = session
        .content()
        .await
        .map_err(|error| MirrorError::Engine(error.to_string()))?;

    let mut document = parser::parse_document(&html);
    sanitize::sanitize(&mut document);
    let fragment = extract::extract_content(&document, &effective);
    let markdown = match Converter::new().convert(&fragment.into_nodes()) {
        Ok(markdown) => markdown,
        Err(error) => {
            tracing::warn!("conversion degraded for {}: {}", entry.path, error);
            String::new()
        }
    };

    let relative = output::page_relative_path(&entry.path, origin);
    let page_dir = relative.parent().map(PathBuf::from).unwrap_or_default();

    let (markdown, image_stats) = if config.download_images {
        images::localize_images(session, &markdown, &effective, &page_dir, &config.output_dir)
            .await
    } else {
        (markdown, ImageStats::default())
    };

    let markdown = normalize_tables(&markdown);
    if markdown.trim().is_empty() {
        tracing::info!("page {} converted to empty markdown; skipping", entry.path);
        return Ok(PageOutcome::Empty);
    }

    let path = config.output_dir.join(&relative);
    tracing::info!("writing {}", path.display());
    output::persist_markdown(&path, &markdown).await?;
    Ok(PageOutcome::Converted(image_stats))
}

fn site_title(html: &str, url: &Url) -> String {
    let document = scraper::Html::parse_document(html);
    let selector = scraper::Selector::parse("title").expect("valid title selector");
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| url.host_str().unwrap_or("Documentation").to_string())
}
