//! News Trend Analyzer: binary entrypoint.
//!
//! ```text
//! news-trend-analyzer ingest <articles.json>
//! news-trend-analyzer run [--method heuristic|generative] [--period daily|weekly|monthly] [--days N]
//! news-trend-analyzer summary [--method M]
//! news-trend-analyzer serve [--addr host:port] [--method M]
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use news_trend_analyzer::{
    api, build_annotator,
    config::EngineConfig,
    logging,
    metrics::Metrics,
    model::{AnalysisMethod, Article, PeriodType},
    report, ArticleStore, BatchRunner, SqliteStore, TrendAggregator, TrendRequest, TrendSettings,
};

/// News sentiment annotation and trend aggregation
#[derive(Parser, Debug)]
#[command(name = "news-trend-analyzer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Annotate news articles and roll them up into sentiment trends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store articles from a JSON array file
    Ingest {
        /// Path to the articles file
        file: PathBuf,
    },

    /// Annotate pending articles, then rebuild recent trends
    Run {
        #[arg(long, default_value = "heuristic", value_parser = parse_method)]
        method: AnalysisMethod,

        /// Defaults to the configured period
        #[arg(long, value_parser = parse_period)]
        period: Option<PeriodType>,

        /// Trailing days to recompute
        #[arg(long, default_value = "30")]
        days: u64,
    },

    /// Print the trend digest
    Summary {
        #[arg(long, default_value = "heuristic", value_parser = parse_method)]
        method: AnalysisMethod,
    },

    /// Serve the read-only HTTP API and /metrics
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Method used when a request does not name one
        #[arg(long, default_value = "heuristic", value_parser = parse_method)]
        method: AnalysisMethod,
    },
}

fn parse_method(s: &str) -> Result<AnalysisMethod, String> {
    AnalysisMethod::parse(s).ok_or_else(|| format!("unknown method '{s}' (heuristic, generative)"))
}

fn parse_period(s: &str) -> Result<PeriodType, String> {
    PeriodType::parse(s).ok_or_else(|| format!("unknown period '{s}' (daily, weekly, monthly)"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = EngineConfig::load()?;
    let store: Arc<dyn ArticleStore> = Arc::new(
        SqliteStore::open(&cfg.db_path).with_context(|| format!("opening {}", cfg.db_path.display()))?,
    );

    match cli.command {
        Commands::Ingest { file } => {
            let n = ingest_file(store.as_ref(), &file)?;
            println!("ingested {n} articles");
        }
        Commands::Run { method, period, days } => {
            let period = period.unwrap_or(cfg.default_period);
            let runner = BatchRunner::new(Arc::clone(&store), build_annotator(method, &cfg)?, &cfg);
            let req = TrendRequest::last_days(method, period, Utc::now().date_naive(), days);
            let rep = runner.run(&[req]).await?;
            println!("{}", serde_json::to_string_pretty(&rep)?);
        }
        Commands::Summary { method } => {
            let trends = TrendAggregator::new(Arc::clone(&store), TrendSettings::from_config(&cfg));
            let s = report::summary(&trends, method, Utc::now().date_naive())?;
            print!("{}", report::render_summary(&s));
        }
        Commands::Serve { addr, method } => {
            let metrics = Metrics::init()?;
            let trends = TrendAggregator::new(Arc::clone(&store), TrendSettings::from_config(&cfg));
            let state = api::AppState::new(Arc::clone(&store), trends, cfg.default_period).with_method(method);
            let app = api::router(state).merge(metrics.router());

            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(target: "api", %addr, "listening");
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}

/// JSON array of articles.
fn ingest_file(store: &dyn ArticleStore, path: &Path) -> Result<usize> {
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let articles: Vec<Article> = serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    for a in &articles {
        store.upsert_article(a)?;
    }
    info!(target: "pipeline", count = articles.len(), "articles ingested");
    Ok(articles.len())
}
