use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONCURRENCY: usize = 3;

/// Username/password pair used for HTTP Basic auth and the form-login
/// fallback.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Configuration for one mirroring run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub root_url: Url,
    pub output_dir: PathBuf,
    pub download_images: bool,
    pub auth: Option<Credentials>,
    pub concurrency: usize,
    /// Crawl the whole discovered hierarchy, or convert the root page only.
    pub crawl_all: bool,
    pub navigation_timeout: Duration,
    /// Bounded wait for the themed page body to render; timing out is not
    /// an error.
    pub content_timeout: Duration,
}

impl MirrorConfig {
    /// A root URL without a sub-path selects whole-site mode.
    pub fn new(root_url: Url, output_dir: PathBuf) -> Self {
        let crawl_all = matches!(root_url.path(), "" | "/");
        Self {
            root_url,
            output_dir,
            download_images: true,
            auth: None,
            concurrency: DEFAULT_CONCURRENCY,
            crawl_all,
            navigation_timeout: Duration::from_secs(30),
            content_timeout: Duration::from_secs(5),
        }
    }
}
