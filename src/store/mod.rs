//! Article store contract and its two backends.
//!
//! The store owns every persisted row. Annotators never touch it; the
//! pipeline writes annotations and associations; the trend aggregator reads
//! annotated articles and writes trend records only.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::StoreResult;
use crate::model::{
    AnalysisMethod, Analysis, AnnotatedArticle, Annotation, AnnotationId, Article, ArticleKey,
    Associations, Dimension, KeywordEntry, PendingFailure, PeriodType, TrendRecord,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Which stored trend records a recompute replaces.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendScope {
    pub method: AnalysisMethod,
    pub period_type: PeriodType,
    /// Records with `window_start <= period_start < window_end` are in scope.
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    /// `None` means every dimension.
    pub dimension: Option<Dimension>,
}

impl TrendScope {
    pub fn covers(&self, r: &TrendRecord) -> bool {
        r.method == self.method
            && r.period_type == self.period_type
            && r.period_start >= self.window_start
            && r.period_start < self.window_end
            && self.dimension.as_ref().map_or(true, |d| *d == r.dimension)
    }
}

/// Read filter for stored trend records. Empty filter returns everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrendQuery {
    pub method: Option<AnalysisMethod>,
    pub period_type: Option<PeriodType>,
    pub dimension: Option<Dimension>,
    /// "overall" | "category" | "topic" | "keyword"
    pub kind: Option<String>,
    pub since: Option<NaiveDate>,
    /// Inclusive bound on `period_start`.
    pub until: Option<NaiveDate>,
}

impl TrendQuery {
    pub fn matches(&self, r: &TrendRecord) -> bool {
        self.method.map_or(true, |m| m == r.method)
            && self.period_type.map_or(true, |p| p == r.period_type)
            && self.dimension.as_ref().map_or(true, |d| *d == r.dimension)
            && self.kind.as_deref().map_or(true, |k| k == r.dimension.kind())
            && self.since.map_or(true, |s| r.period_start >= s)
            && self.until.map_or(true, |u| r.period_start <= u)
    }
}

/// Canonical output order: chronological, then dimension order.
pub fn sort_trends(records: &mut [TrendRecord]) {
    records.sort_by(|a, b| {
        a.period_start
            .cmp(&b.period_start)
            .then_with(|| a.dimension.cmp(&b.dimension))
            .then_with(|| a.method.cmp(&b.method))
            .then_with(|| a.period_type.cmp(&b.period_type))
    });
}

pub trait ArticleStore: Send + Sync {
    /// Insert an article if its [`Article::key`] is new. Stored articles are
    /// never rewritten; the key is returned either way.
    fn upsert_article(&self, article: &Article) -> StoreResult<ArticleKey>;

    fn article(&self, key: &ArticleKey) -> StoreResult<Option<Article>>;

    /// Articles with no annotation for `method`, in key order.
    fn unanalyzed_articles(&self, method: AnalysisMethod) -> StoreResult<Vec<Article>>;

    /// Upsert keyed on (article, method). The id survives re-annotation.
    fn upsert_annotation(
        &self,
        article: &ArticleKey,
        method: AnalysisMethod,
        analysis: &Analysis,
        at: DateTime<Utc>,
    ) -> StoreResult<Annotation>;

    fn annotation(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<Option<Annotation>>;

    /// All annotations of one method with their articles, newest analysis first.
    fn annotations(&self, method: AnalysisMethod) -> StoreResult<Vec<(Article, Annotation)>>;

    /// Atomically swap the association set of one annotation. A keyword's
    /// corpus frequency goes up by one the first time any annotation of the
    /// article links it; it never goes down.
    fn replace_associations(&self, annotation: AnnotationId, assoc: &Associations) -> StoreResult<()>;

    fn associations(&self, annotation: AnnotationId) -> StoreResult<Associations>;

    /// Annotated articles whose reference date lies in `[from, to)`.
    fn annotated_between(
        &self,
        method: AnalysisMethod,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AnnotatedArticle>>;

    /// Lookup by canonical (already normalized) keyword text.
    fn keyword(&self, keyword: &str) -> StoreResult<Option<KeywordEntry>>;

    /// Highest frequency first, ties alphabetical.
    fn top_keywords(&self, limit: usize) -> StoreResult<Vec<KeywordEntry>>;

    /// Delete everything `scope` covers, then insert `records`, in one step.
    fn replace_trends(&self, scope: &TrendScope, records: &[TrendRecord]) -> StoreResult<usize>;

    /// Sorted with [`sort_trends`].
    fn trends(&self, query: &TrendQuery) -> StoreResult<Vec<TrendRecord>>;

    fn record_failure(&self, failure: &PendingFailure) -> StoreResult<()>;

    fn clear_failure(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<()>;

    fn failures(&self, method: Option<AnalysisMethod>) -> StoreResult<Vec<PendingFailure>>;
}
