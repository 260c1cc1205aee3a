//! Batch run: annotate every article still missing an annotation for the
//! configured method, persist associations, then recompute trends.
//!
//! Runs are sequential. A single article never aborts the batch; transient
//! annotator failures are skipped and left for the next run.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotate::{prepare_input, DynAnnotator};
use crate::config::EngineConfig;
use crate::error::{AnnotateError, StoreError, StoreResult};
use crate::logging::anon_id;
use crate::model::{Analysis, AnalysisMethod, Annotation, Article, ArticleKey, PendingFailure};
use crate::store::ArticleStore;
use crate::trend::{TrendAggregator, TrendRequest, TrendSettings};
use crate::vocab::Categorizer;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("annotations_succeeded_total", "Articles annotated and stored.");
        describe_counter!(
            "annotations_skipped_total",
            "Articles skipped on transient annotator failure."
        );
        describe_counter!("annotations_failed_total", "Articles that could not be annotated.");
        describe_counter!("quality_clamps_total", "Out-of-range analyzer fields clamped.");
        describe_counter!("trend_records_written_total", "Trend records written by recompute.");
    });
}

/// What happened to one article.
#[derive(Debug)]
pub enum Outcome {
    Annotated(Annotation),
    /// Transient; retried next run.
    Skipped(AnnotateError),
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub trend_records_written: usize,
    /// Recompute errors, kept apart from per-article outcomes.
    pub trend_errors: Vec<String>,
}

pub struct BatchRunner {
    store: Arc<dyn ArticleStore>,
    annotator: DynAnnotator,
    categorizer: Categorizer,
    trends: TrendAggregator,
    max_input_chars: usize,
    timeout: Duration,
}

impl BatchRunner {
    pub fn new(store: Arc<dyn ArticleStore>, annotator: DynAnnotator, cfg: &EngineConfig) -> Self {
        Self {
            trends: TrendAggregator::new(Arc::clone(&store), TrendSettings::from_config(cfg)),
            store,
            annotator,
            categorizer: Categorizer::from_config(cfg),
            max_input_chars: cfg.max_input_chars,
            timeout: cfg.annotator_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn method(&self) -> AnalysisMethod {
        self.annotator.method()
    }

    pub fn trends(&self) -> &TrendAggregator {
        &self.trends
    }

    /// Insert new articles; already stored keys are left as they are. Returns every key.
    pub fn ingest(&self, articles: &[Article]) -> StoreResult<Vec<ArticleKey>> {
        articles.iter().map(|a| self.store.upsert_article(a)).collect()
    }

    /// Annotate, categorize and persist one article.
    pub async fn annotate_one(&self, article: &Article) -> Outcome {
        let key = article.key();
        let method = self.method();

        let analysis = match prepare_input(&article.text(), self.max_input_chars) {
            Ok(text) => match tokio::time::timeout(self.timeout, self.annotator.analyze(&text)).await {
                Ok(res) => res,
                Err(_) => Err(AnnotateError::unavailable(format!(
                    "annotator timed out after {}s",
                    self.timeout.as_secs_f32()
                ))),
            },
            Err(e) => Err(e),
        };

        let analysis = match analysis {
            Ok(a) => a,
            Err(e) => return self.fail(&key, method, e),
        };

        match self.persist(&key, method, &analysis) {
            Ok(ann) => Outcome::Annotated(ann),
            Err(e) => {
                warn!(target: "pipeline", article = %anon_id(key.as_str()), error = %e, "store write failed");
                self.note_failure(&key, method, "store", &e.to_string());
                Outcome::Failed(e.to_string())
            }
        }
    }

    fn persist(
        &self,
        key: &ArticleKey,
        method: AnalysisMethod,
        analysis: &Analysis,
    ) -> Result<Annotation, StoreError> {
        let ann = self.store.upsert_annotation(key, method, analysis, Utc::now())?;
        let assoc = self.categorizer.categorize(&analysis.suggestions);
        self.store.replace_associations(ann.id, &assoc)?;
        self.store.clear_failure(key, method)?;
        debug!(
            target: "pipeline",
            article = %anon_id(key.as_str()),
            category = ?assoc.primary_category(),
            keywords = assoc.keywords.len(),
            "annotation stored"
        );
        Ok(ann)
    }

    fn fail(&self, key: &ArticleKey, method: AnalysisMethod, e: AnnotateError) -> Outcome {
        self.note_failure(key, method, e.kind(), &e.to_string());
        if e.is_transient() {
            warn!(target: "pipeline", article = %anon_id(key.as_str()), error = %e, "article skipped");
            Outcome::Skipped(e)
        } else {
            warn!(target: "pipeline", article = %anon_id(key.as_str()), error = %e, "article failed");
            Outcome::Failed(e.to_string())
        }
    }

    fn note_failure(&self, key: &ArticleKey, method: AnalysisMethod, kind: &str, detail: &str) {
        let row = PendingFailure {
            article: key.clone(),
            method,
            kind: kind.to_string(),
            detail: detail.to_string(),
            failed_at: Utc::now(),
        };
        if let Err(e) = self.store.record_failure(&row) {
            warn!(target: "pipeline", error = %e, "could not record pending failure");
        }
    }

    /// Annotate everything still unanalyzed for this runner's method.
    /// Only a failure to list pending articles is an error.
    pub async fn annotate_pending(&self) -> StoreResult<RunReport> {
        ensure_metrics_described();
        let method = self.method();
        let pending = self.store.unanalyzed_articles(method)?;
        info!(target: "pipeline", %method, pending = pending.len(), "batch started");

        let mut report = RunReport::default();
        for article in &pending {
            match self.annotate_one(article).await {
                Outcome::Annotated(_) => report.succeeded += 1,
                Outcome::Skipped(_) => report.skipped += 1,
                Outcome::Failed(_) => report.failed += 1,
            }
        }

        counter!("annotations_succeeded_total", "method" => method.as_str()).increment(report.succeeded as u64);
        counter!("annotations_skipped_total", "method" => method.as_str()).increment(report.skipped as u64);
        counter!("annotations_failed_total", "method" => method.as_str()).increment(report.failed as u64);
        info!(
            target: "pipeline",
            %method,
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            "batch annotated"
        );
        Ok(report)
    }

    /// Full run: annotations first, then each trend request in order.
    pub async fn run(&self, requests: &[TrendRequest]) -> StoreResult<RunReport> {
        let mut report = self.annotate_pending().await?;
        for req in requests {
            match self.trends.recompute(req) {
                Ok(r) => report.trend_records_written += r.written,
                Err(e) => {
                    warn!(target: "pipeline", period = %req.period_type, error = %e, "trend recompute failed");
                    report.trend_errors.push(e.to_string());
                }
            }
        }
        Ok(report)
    }
}
