use anyhow::Context;
use clap::Parser;
use k8s_openapi::serde_json;
use nodeload::k8s::cache::config::{DEFAULT_CONCURRENT_FETCHERS, DEFAULT_TTL_SECS};
use nodeload::k8s::source::KubeDataSource;
use nodeload::k8s::{USER_AGENT, client};
use nodeload::{CacheConfig, SnapshotCache, server};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Only list pods in this namespace (all namespaces when unset)
    #[arg(short, long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Kubeconfig file to use instead of the inferred configuration
    #[arg(long, env = "KUBE_CONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Seconds a snapshot is served before it is refreshed in the background
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    ttl_secs: u64,

    /// Maximum number of concurrent per-node pod listings
    #[arg(long, env = "CONCURRENCY", default_value_t = DEFAULT_CONCURRENT_FETCHERS)]
    concurrency: usize,

    /// Seconds a request waits for the very first snapshot
    #[arg(long, env = "POPULATE_TIMEOUT_SECS", default_value_t = 60)]
    populate_timeout_secs: u64,

    /// Address the HTTP server listens on
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Log level used when RUST_LOG is not set
    #[arg(long, env = "LOGLEVEL", default_value = "info")]
    log_level: String,

    /// Fetch one snapshot, print it as JSON and exit
    #[arg(long)]
    once: bool,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider already installed");
    }

    let config = CacheConfig::default()
        .with_ttl(Duration::from_secs(args.ttl_secs))
        .with_concurrency(args.concurrency);
    config.validate()?;
    let populate_timeout = Duration::from_secs(args.populate_timeout_secs);

    if args.kubeconfig.is_none() {
        info!("No kubeconfig given, inferring configuration (in-cluster or default)");
    }
    let client = client::new(Some(USER_AGENT), args.kubeconfig.as_deref())
        .await
        .context("creating Kubernetes client")?;
    let source = Arc::new(KubeDataSource::new(client, args.namespace));
    let cache = SnapshotCache::new(source, &config);

    if args.once {
        return print_once(&cache, populate_timeout).await;
    }

    serve(cache, populate_timeout, &args.listen).await
}

async fn print_once(cache: &SnapshotCache, populate_timeout: Duration) -> anyhow::Result<()> {
    let snapshot = cache.get_within(populate_timeout).await?;

    for node in &snapshot.nodes {
        debug!("node: {}", node.name);
        for pod in &node.pods {
            debug!("  {} ({} {})", pod.name, pod.cpu, pod.memory);
        }
    }
    for warning in &snapshot.warnings {
        warn!("node {} degraded: {}", warning.node, warning.message);
    }

    println!("{}", serde_json::to_string_pretty(&snapshot.nodes)?);
    Ok(())
}

async fn serve(cache: SnapshotCache, populate_timeout: Duration, listen: &str) -> anyhow::Result<()> {
    info!(
        "Cache configured with {}s TTL and {} concurrent fetchers",
        cache.ttl().as_secs(),
        cache.max_concurrent_fetches()
    );

    let app = server::app(cache, populate_timeout);
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;
    info!("Listening on http://{}", listen);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Received shutdown signal");
    shutdown.cancel();
}
