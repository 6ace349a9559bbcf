use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use url::Url;

use bookmirror::config::{Credentials, DEFAULT_CONCURRENCY, MirrorConfig};
use bookmirror::engine::{ChromiumEngine, DocumentEngine};
use bookmirror::pipeline::Mirror;

/// Mirror a GitBook-style documentation site into a local tree of Markdown
/// files with downloaded images.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// Root URL of the site to mirror. A URL without a sub-path crawls the
    /// whole hierarchy; a deep link converts that single page.
    #[clap(required = true)]
    url: Url,
    /// Output directory for the mirrored Markdown tree.
    #[clap(short, long)]
    output: PathBuf,
    /// Number of pages processed concurrently.
    #[clap(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,
    /// Do not download images; remote references are left untouched.
    #[clap(long)]
    skip_images: bool,
    /// Username for HTTP Basic auth and the form-login fallback.
    #[clap(long)]
    username: Option<String>,
    /// Password for HTTP Basic auth and the form-login fallback.
    #[clap(long)]
    password: Option<String>,
    /// Navigation timeout in seconds.
    #[clap(long, default_value_t = 30)]
    timeout: u64,
    /// How long to wait for the themed page body to render, in seconds.
    #[clap(long, default_value_t = 5)]
    content_timeout: u64,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    tracing_subscriber::fmt::init();
    let args = CliArgs::parse();

    let mut config = MirrorConfig::new(args.url.clone(), args.output);
    config.concurrency = args.concurrency.max(1);
    config.download_images = !args.skip_images;
    config.navigation_timeout = Duration::from_secs(args.timeout);
    config.content_timeout = Duration::from_secs(args.content_timeout);
    config.auth = match (args.username, args.password) {
        (Some(username), Some(password)) => Some(Credentials { username, password }),
        (Some(username), None) => Some(Credentials {
            username,
            password: String::new(),
        }),
        _ => None,
    };

    tracing::info!(
        "mirroring {} into {}",
        args.url,
        config.output_dir.display()
    );

    let engine = Arc::new(
        ChromiumEngine::launch()
            .await
            .map_err(|error| miette::miette!("failed to launch the browser engine: {}", error))?,
    );
    let shared: Arc<dyn DocumentEngine> = engine.clone();
    let mirror = Mirror::new(shared, config);
    let result = mirror.run().await;
    drop(mirror);

    if let Ok(engine) = Arc::try_unwrap(engine) {
        engine.shutdown().await;
    }

    match result {
        Ok(stats) => {
            stats.write_stats_to_stderr();
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
