//! Trend aggregation over annotated articles.
//!
//! A request is validated before anything is read. Records are produced
//! bucket by bucket through [`TrendStream`]; [`TrendAggregator::recompute`]
//! collects them and swaps the stored set for the covered window.

pub mod aggregate;
pub mod momentum;
pub mod period;
pub mod summary;

use std::sync::Arc;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{EngineConfig, SentimentThresholds};
use crate::error::TrendError;
use crate::model::{AnalysisMethod, Dimension, PeriodType, TrendRecord};
use crate::store::{ArticleStore, TrendQuery, TrendScope};
use crate::taxonomy::{Category, Topic};
use crate::vocab::normalize_keyword;

pub use aggregate::{aggregate_bucket, BucketRules, TrendStream};
pub use momentum::{momentum, trending, Direction, Momentum, MomentumMetric, TrendingEntry};
pub use period::{Period, PeriodIter};
pub use summary::TrendSummary;

/// Restricts a request to a single dimension, by name as a caller types it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum DimensionFilter {
    Category(String),
    Topic(String),
    Keyword(String),
}

impl DimensionFilter {
    pub fn parse(kind: &str, value: &str) -> Option<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "category" => Some(DimensionFilter::Category(value.to_string())),
            "topic" => Some(DimensionFilter::Topic(value.to_string())),
            "keyword" => Some(DimensionFilter::Keyword(value.to_string())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendRequest {
    pub period_type: PeriodType,
    pub since: NaiveDate,
    /// Inclusive.
    pub until: NaiveDate,
    pub method: AnalysisMethod,
    pub filter: Option<DimensionFilter>,
}

impl TrendRequest {
    pub fn new(method: AnalysisMethod, period_type: PeriodType, since: NaiveDate, until: NaiveDate) -> Self {
        Self {
            period_type,
            since,
            until,
            method,
            filter: None,
        }
    }

    /// The `days` calendar days ending with `today`.
    pub fn last_days(method: AnalysisMethod, period_type: PeriodType, today: NaiveDate, days: u64) -> Self {
        let since = today
            .checked_sub_days(Days::new(days.saturating_sub(1)))
            .unwrap_or(NaiveDate::MIN);
        Self::new(method, period_type, since, today)
    }

    pub fn with_filter(mut self, filter: DimensionFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSettings {
    pub thresholds: SentimentThresholds,
    pub keyword_min_articles: u64,
    pub momentum_polarity_tolerance: f64,
}

impl Default for TrendSettings {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl TrendSettings {
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self {
            thresholds: cfg.thresholds,
            keyword_min_articles: cfg.keyword_min_articles,
            momentum_polarity_tolerance: cfg.momentum_polarity_tolerance,
        }
    }
}

/// Outcome of one recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecomputeReport {
    pub window: Period,
    pub written: usize,
}

pub struct TrendAggregator {
    store: Arc<dyn ArticleStore>,
    settings: TrendSettings,
}

impl TrendAggregator {
    pub fn new(store: Arc<dyn ArticleStore>, settings: TrendSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &TrendSettings {
        &self.settings
    }

    /// Range and dimension checks. Resolves the filter to a stored dimension.
    pub fn validate(&self, req: &TrendRequest) -> Result<Option<Dimension>, TrendError> {
        if req.since > req.until {
            return Err(TrendError::InvalidRange {
                since: req.since,
                until: req.until,
            });
        }
        let Some(filter) = &req.filter else {
            return Ok(None);
        };
        let dim = match filter {
            DimensionFilter::Category(name) => Category::from_name(name)
                .map(Dimension::Category)
                .ok_or_else(|| TrendError::UnknownDimension {
                    kind: "category",
                    value: name.clone(),
                })?,
            DimensionFilter::Topic(name) => Topic::from_name(name)
                .map(Dimension::Topic)
                .ok_or_else(|| TrendError::UnknownDimension {
                    kind: "topic",
                    value: name.clone(),
                })?,
            DimensionFilter::Keyword(raw) => {
                let k = normalize_keyword(raw);
                if k.is_empty() || self.store.keyword(&k)?.is_none() {
                    return Err(TrendError::UnknownDimension {
                        kind: "keyword",
                        value: raw.clone(),
                    });
                }
                Dimension::Keyword(k)
            }
        };
        Ok(Some(dim))
    }

    fn rules(&self, req: &TrendRequest) -> BucketRules {
        BucketRules {
            method: req.method,
            period_type: req.period_type,
            thresholds: self.settings.thresholds,
            keyword_min_articles: self.settings.keyword_min_articles,
        }
    }

    /// Validated lazy record sequence for `req`. Nothing is written.
    pub fn stream(&self, req: &TrendRequest) -> Result<TrendStream, TrendError> {
        let dim = self.validate(req)?;
        Ok(TrendStream::new(
            Arc::clone(&self.store),
            PeriodIter::new(req.period_type, req.since, req.until),
            dim,
            self.rules(req),
        ))
    }

    /// Rebuild stored records for the request window. In-scope records that
    /// no longer have data disappear.
    pub fn recompute(&self, req: &TrendRequest) -> Result<RecomputeReport, TrendError> {
        let dim = self.validate(req)?;
        let window = period::window(req.period_type, req.since, req.until);
        let stream = TrendStream::new(
            Arc::clone(&self.store),
            PeriodIter::new(req.period_type, req.since, req.until),
            dim.clone(),
            self.rules(req),
        );
        let records = stream.collect::<Result<Vec<TrendRecord>, _>>()?;

        let scope = TrendScope {
            method: req.method,
            period_type: req.period_type,
            window_start: window.start,
            window_end: window.end,
            dimension: dim,
        };
        let written = self.store.replace_trends(&scope, &records)?;
        metrics::counter!("trend_records_written_total", "period" => req.period_type.as_str())
            .increment(written as u64);
        info!(
            target: "trend",
            method = %req.method,
            period = %req.period_type,
            start = %window.start,
            end = %window.end,
            written,
            "trend records recomputed"
        );
        Ok(RecomputeReport { window, written })
    }

    /// Stored records of one dimension, chronological.
    fn series(
        &self,
        method: AnalysisMethod,
        period_type: PeriodType,
        dimension: &Dimension,
    ) -> Result<Vec<TrendRecord>, TrendError> {
        let q = TrendQuery {
            method: Some(method),
            period_type: Some(period_type),
            dimension: Some(dimension.clone()),
            ..Default::default()
        };
        Ok(self.store.trends(&q)?)
    }

    /// Momentum of a validated dimension over stored records.
    ///
    /// Unfiltered sweeps skip keyword buckets below `keyword_min_articles`,
    /// so a keyword can have a stored latest record and no stored
    /// predecessor. In that case the predecessor bucket is aggregated on the
    /// fly with a keyword filter, which has no minimum.
    pub fn momentum(
        &self,
        method: AnalysisMethod,
        period_type: PeriodType,
        filter: Option<&DimensionFilter>,
        metric: MomentumMetric,
    ) -> Result<Momentum, TrendError> {
        let dim = match filter {
            Some(f) => {
                let check = TrendRequest {
                    period_type,
                    since: NaiveDate::MIN,
                    until: NaiveDate::MIN,
                    method,
                    filter: Some(f.clone()),
                };
                self.validate(&check)?.unwrap_or(Dimension::Overall)
            }
            None => Dimension::Overall,
        };
        let mut records = self.series(method, period_type, &dim)?;
        if let Dimension::Keyword(k) = &dim {
            if let Some(prev) = self.missing_predecessor(method, period_type, k, &records)? {
                records.push(prev);
            }
        }
        let m = momentum::momentum(
            &records,
            metric,
            metric.tolerance(self.settings.momentum_polarity_tolerance),
        );
        debug!(target: "trend", dimension = %dim, ?m, "momentum");
        Ok(m)
    }

    /// Bucket just before the latest stored keyword record, when it was not
    /// stored and holds at least one article.
    fn missing_predecessor(
        &self,
        method: AnalysisMethod,
        period_type: PeriodType,
        keyword: &str,
        records: &[TrendRecord],
    ) -> Result<Option<TrendRecord>, TrendError> {
        let Some(latest) = records.iter().map(|r| r.period_start).max() else {
            return Ok(None);
        };
        if records.iter().any(|r| r.period_end == latest) {
            return Ok(None);
        }
        let Some(day_before) = latest.pred_opt() else {
            return Ok(None);
        };
        let req = TrendRequest {
            period_type,
            since: day_before,
            until: day_before,
            method,
            filter: Some(DimensionFilter::Keyword(keyword.to_string())),
        };
        let mut stream = self.stream(&req)?;
        Ok(stream.next().transpose()?)
    }

    /// Rising categories, topics or keywords over stored records.
    pub fn trending(
        &self,
        method: AnalysisMethod,
        period_type: PeriodType,
        kind: &str,
        metric: MomentumMetric,
        limit: usize,
    ) -> Result<Vec<TrendingEntry>, TrendError> {
        let q = TrendQuery {
            method: Some(method),
            period_type: Some(period_type),
            kind: Some(kind.to_string()),
            ..Default::default()
        };
        let records = self.store.trends(&q)?;
        Ok(momentum::trending(
            &records,
            kind,
            metric,
            metric.tolerance(self.settings.momentum_polarity_tolerance),
            limit,
        ))
    }

    pub fn summary(&self, method: AnalysisMethod, today: NaiveDate) -> Result<TrendSummary, TrendError> {
        let q = TrendQuery {
            method: Some(method),
            ..Default::default()
        };
        let records = self.store.trends(&q)?;
        Ok(TrendSummary::from_records(&records, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn aggregator() -> TrendAggregator {
        TrendAggregator::new(Arc::new(MemoryStore::new()), TrendSettings::default())
    }

    #[test]
    fn inverted_range_is_rejected() {
        let req = TrendRequest::new(AnalysisMethod::Heuristic, PeriodType::Daily, d(2024, 3, 2), d(2024, 3, 1));
        assert!(matches!(aggregator().validate(&req), Err(TrendError::InvalidRange { .. })));
    }

    #[test]
    fn unknown_dimensions_are_rejected() {
        let agg = aggregator();
        let base = TrendRequest::new(AnalysisMethod::Heuristic, PeriodType::Daily, d(2024, 3, 1), d(2024, 3, 1));

        let err = agg
            .validate(&base.clone().with_filter(DimensionFilter::Category("Cooking".into())))
            .unwrap_err();
        assert!(matches!(err, TrendError::UnknownDimension { kind: "category", .. }));

        let err = agg
            .validate(&base.clone().with_filter(DimensionFilter::Keyword("never seen".into())))
            .unwrap_err();
        assert!(matches!(err, TrendError::UnknownDimension { kind: "keyword", .. }));

        let ok = agg
            .validate(&base.with_filter(DimensionFilter::Category("health".into())))
            .unwrap();
        assert_eq!(ok, Some(Dimension::Category(Category::Health)));
    }

    #[test]
    fn last_days_is_inclusive_of_today() {
        let r = TrendRequest::last_days(AnalysisMethod::Heuristic, PeriodType::Daily, d(2024, 3, 10), 7);
        assert_eq!(r.since, d(2024, 3, 4));
        assert_eq!(r.until, d(2024, 3, 10));
    }
}
