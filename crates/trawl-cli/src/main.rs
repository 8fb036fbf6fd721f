use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use trawl_client::{JsonLinesStore, MarkdownPageParser, ReqwestFetcher};
use trawl_core::{
    Bound, CrawlConfig, CrawlJobSpec, CrawlReport, Crawler, Credentials, DispatchConfig,
    FetchFailurePolicy, NormalizedUrl, RobotsChecker, StopReason, TracingCrawlReporter,
};

#[derive(Parser)]
#[command(name = "trawl", version, about = "Bounded, robots-aware web crawler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from a seed URL and print extracted records as JSON lines
    Crawl {
        #[command(flatten)]
        job: JobArgs,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Run a crawl described by a JSON job file
    Job {
        /// Path to the job file
        path: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Check whether robots.txt allows fetching a URL
    Robots {
        /// URL to check
        url: String,

        /// Token that introduces a disallowed path
        #[arg(long, env = "TRAWL_DISALLOW_MARKER", default_value = "Disallow:")]
        marker: String,
    },
}

/// Job parameters given on the command line.
#[derive(Args)]
struct JobArgs {
    /// Seed URL
    #[arg(short, long)]
    url: String,

    /// Keywords that mark a page as relevant (repeatable or comma-separated)
    #[arg(short, long = "keyword", value_delimiter = ',')]
    keywords: Vec<String>,

    /// URLs never to fetch (repeatable or comma-separated)
    #[arg(long = "block", value_delimiter = ',')]
    blocked: Vec<String>,

    /// Page budget: a count, -1 or "unlimited"
    #[arg(long, env = "TRAWL_MAX_PAGES", default_value = "100", allow_hyphen_values = true)]
    max_pages: Bound,

    /// Link-depth budget: a count, -1 or "unlimited"
    #[arg(long, env = "TRAWL_MAX_DEPTH", default_value = "5", allow_hyphen_values = true)]
    max_depth: Bound,

    /// Only follow links on the seed's host
    #[arg(long)]
    stay_on_domain: bool,

    /// Only follow links under the seed's path
    #[arg(long)]
    stay_below_path: bool,

    /// Only follow links from pages that match a keyword
    #[arg(long)]
    only_relevant: bool,

    /// Log blocked links at warn level
    #[arg(long)]
    warn_on_rejected: bool,

    /// Tenant tag copied onto every record
    #[arg(long, env = "TRAWL_TENANT", default_value = "")]
    tenant: String,

    /// Scope tag copied onto every record
    #[arg(long, env = "TRAWL_SCOPE", default_value = "")]
    scope: String,
}

impl JobArgs {
    fn into_spec(self) -> CrawlJobSpec {
        CrawlJobSpec::new(self.url)
            .with_keywords(self.keywords)
            .with_blocked_urls(self.blocked)
            .with_max_pages(self.max_pages)
            .with_max_depth(self.max_depth)
            .with_stay_on_domain(self.stay_on_domain)
            .with_stay_below_given_path(self.stay_below_path)
            .with_only_relevant_pages(self.only_relevant)
            .with_warn_on_rejected(self.warn_on_rejected)
            .with_tags(self.tenant, self.scope)
    }
}

/// Engine settings shared by `crawl` and `job`.
#[derive(Args)]
struct RunArgs {
    /// Byte cap for each page body
    #[arg(long, env = "TRAWL_MAX_BYTES", default_value_t = 1024 * 1024)]
    max_bytes: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "TRAWL_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Fetch pages even when robots.txt disallows them
    #[arg(long)]
    ignore_robots: bool,

    /// Skip pages that fail to fetch instead of stopping the crawl
    #[arg(long)]
    skip_failed: bool,

    /// Parse and store pages on this many background tasks (0 = inline)
    #[arg(long, env = "TRAWL_WORKERS", default_value_t = 0)]
    workers: usize,

    /// Also emit graph records
    #[arg(long)]
    graph: bool,

    /// HTTP basic auth user
    #[arg(long, env = "TRAWL_USER")]
    user: Option<String>,

    /// HTTP basic auth password
    #[arg(long, env = "TRAWL_PASSWORD", hide_env_values = true, requires = "user")]
    password: Option<String>,
}

impl RunArgs {
    fn config(&self) -> CrawlConfig {
        let dispatch = if self.workers == 0 {
            DispatchConfig::default()
        } else {
            DispatchConfig::pooled(self.workers)
        };
        let policy = if self.skip_failed {
            FetchFailurePolicy::Skip
        } else {
            FetchFailurePolicy::Abort
        };

        CrawlConfig::default()
            .with_max_content_bytes(self.max_bytes)
            .with_respect_robots(!self.ignore_robots)
            .with_fetch_failure_policy(policy)
            .with_dispatch(dispatch.with_graph(self.graph))
    }

    fn credentials(&self) -> Option<Credentials> {
        self.user
            .as_ref()
            .map(|user| Credentials::new(user, self.password.clone().unwrap_or_default()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Records go to stdout; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trawl=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl { job, run } => {
            cmd_crawl(job.into_spec(), &run).await?;
        }
        Commands::Job { path, run } => {
            let spec = load_job(&path)?;
            cmd_crawl(spec, &run).await?;
        }
        Commands::Robots { url, marker } => {
            cmd_robots(&url, &marker).await?;
        }
    }

    Ok(())
}

/// Read a [`CrawlJobSpec`] from a JSON file.
fn load_job(path: &Path) -> Result<CrawlJobSpec> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid job file: {}", path.display()))
}

/// Run one crawl. How the run ended is part of the report, not an error.
async fn cmd_crawl(mut spec: CrawlJobSpec, run: &RunArgs) -> Result<CrawlReport> {
    if let Some(credentials) = run.credentials() {
        spec = spec.with_credentials(credentials);
    }

    let fetcher = ReqwestFetcher::with_timeout(Duration::from_secs(run.timeout))
        .context("Failed to create HTTP client")?
        .with_credentials(spec.credentials.clone());

    let crawler = Crawler::new(
        spec,
        run.config(),
        fetcher,
        MarkdownPageParser::new(),
        JsonLinesStore::stdout(),
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing in-flight pages");
            on_interrupt.cancel();
        }
    });

    let report = crawler
        .run(cancel, &TracingCrawlReporter)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    print_report(&report)?;

    if let StopReason::FetchFailed { url, error } = &report.stop_reason {
        tracing::warn!(%url, %error, "Crawl stopped early on a failed fetch");
    }

    Ok(report)
}

fn print_report(report: &CrawlReport) -> Result<()> {
    eprintln!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

async fn cmd_robots(url: &str, marker: &str) -> Result<()> {
    let url = NormalizedUrl::parse(url).map_err(|e| anyhow::anyhow!(e))?;
    let config = CrawlConfig::default().with_disallow_marker(marker);
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let fetcher = ReqwestFetcher::new().context("Failed to create HTTP client")?;
    let checker = RobotsChecker::new(fetcher, &config);

    let verdict = if checker.is_allowed(&url).await {
        "allowed"
    } else {
        "disallowed"
    };
    println!("{url}: {verdict}");

    Ok(())
}
