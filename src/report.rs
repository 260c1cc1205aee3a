//! Read-only views for CLI output and the HTTP surface.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::{StoreResult, TrendError};
use crate::model::{AnalysisMethod, Emotion, KeywordLink, TrendRecord};
use crate::store::{ArticleStore, TrendQuery};
use crate::trend::{TrendAggregator, TrendSummary};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Labelled {
    pub name: &'static str,
    pub confidence: f64,
    pub primary: bool,
}

/// One annotated article with its resolved associations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleReport {
    pub key: String,
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub method: AnalysisMethod,
    pub polarity: f64,
    pub subjectivity: f64,
    pub emotion: Emotion,
    pub confidence: f64,
    pub summary: Option<String>,
    pub reasoning: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    pub categories: Vec<Labelled>,
    pub topics: Vec<Labelled>,
    pub keywords: Vec<KeywordLink>,
}

/// Newest analysis first, at most `limit` rows.
pub fn article_reports(
    store: &dyn ArticleStore,
    method: AnalysisMethod,
    limit: usize,
) -> StoreResult<Vec<ArticleReport>> {
    let mut out = Vec::new();
    for (article, ann) in store.annotations(method)?.into_iter().take(limit) {
        let assoc = store.associations(ann.id)?;
        out.push(ArticleReport {
            key: ann.article.to_string(),
            title: article.title,
            link: article.link,
            published_at: article.published_at,
            method: ann.method,
            polarity: ann.polarity,
            subjectivity: ann.subjectivity,
            emotion: ann.emotion,
            confidence: ann.confidence,
            summary: ann.summary,
            reasoning: ann.reasoning,
            analyzed_at: ann.analysis_time,
            categories: assoc
                .categories
                .iter()
                .map(|c| Labelled {
                    name: c.value.name(),
                    confidence: c.confidence,
                    primary: c.primary,
                })
                .collect(),
            topics: assoc
                .topics
                .iter()
                .map(|t| Labelled {
                    name: t.value.name(),
                    confidence: t.confidence,
                    primary: t.primary,
                })
                .collect(),
            keywords: assoc.keywords,
        });
    }
    Ok(out)
}

/// Flat trend row, one column per field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub method: AnalysisMethod,
    pub period_type: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub dimension: &'static str,
    pub value: String,
    pub article_count: u64,
    pub avg_polarity: f64,
    pub avg_subjectivity: f64,
    pub positive: u64,
    pub negative: u64,
    pub neutral: u64,
    pub dominant_emotion: Emotion,
}

impl From<&TrendRecord> for TrendRow {
    fn from(r: &TrendRecord) -> Self {
        Self {
            method: r.method,
            period_type: r.period_type.to_string(),
            period_start: r.period_start,
            period_end: r.period_end,
            dimension: r.dimension.kind(),
            value: r.dimension.value(),
            article_count: r.article_count,
            avg_polarity: r.avg_polarity,
            avg_subjectivity: r.avg_subjectivity,
            positive: r.positive_count,
            negative: r.negative_count,
            neutral: r.neutral_count,
            dominant_emotion: r.dominant_emotion,
        }
    }
}

pub fn trend_table(store: &dyn ArticleStore, query: &TrendQuery) -> StoreResult<Vec<TrendRow>> {
    Ok(store.trends(query)?.iter().map(TrendRow::from).collect())
}

pub fn summary(
    trends: &TrendAggregator,
    method: AnalysisMethod,
    today: NaiveDate,
) -> Result<TrendSummary, TrendError> {
    trends.summary(method, today)
}

/// Plain-text rendering of a summary for the terminal.
pub fn render_summary(s: &TrendSummary) -> String {
    use std::fmt::Write as _;
    let mut out = String::new();
    let _ = writeln!(out, "Trend summary as of {}", s.as_of);

    let _ = writeln!(out, "\nMost active categories (7 days):");
    if s.most_active_categories.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for a in &s.most_active_categories {
        let _ = writeln!(out, "  {:<16} {:>5} articles", a.category.name(), a.articles);
    }

    let _ = writeln!(out, "\nSentiment by category (30 days):");
    if s.sentiment_by_category.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for c in &s.sentiment_by_category {
        let _ = writeln!(
            out,
            "  {:<16} {:>+.3} over {} days",
            c.category.name(),
            c.avg_polarity,
            c.periods
        );
    }

    let _ = writeln!(out, "\nMost discussed keywords (30 days):");
    if s.trending_keywords.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for k in &s.trending_keywords {
        let _ = writeln!(out, "  {:<24} {:>5}", k.keyword, k.mentions);
    }
    out
}
