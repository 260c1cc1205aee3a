//! Per-bucket statistics and the lazy record stream.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::trace;

use super::period::{Period, PeriodIter};
use crate::config::SentimentThresholds;
use crate::error::StoreError;
use crate::model::{
    AnalysisMethod, AnnotatedArticle, ArticleKey, Dimension, Emotion, PeriodType, TrendRecord,
};
use crate::store::ArticleStore;

#[derive(Debug, Default)]
struct Acc {
    articles: BTreeSet<ArticleKey>,
    sum_polarity: f64,
    sum_subjectivity: f64,
    positive: u64,
    negative: u64,
    neutral: u64,
    emotions: [u64; 7],
}

impl Acc {
    fn add(&mut self, row: &AnnotatedArticle, th: &SentimentThresholds) {
        if !self.articles.insert(row.article.clone()) {
            return;
        }
        let p = row.annotation.polarity;
        self.sum_polarity += p;
        self.sum_subjectivity += row.annotation.subjectivity;
        if p > th.positive {
            self.positive += 1;
        } else if p < th.negative {
            self.negative += 1;
        } else {
            self.neutral += 1;
        }
        self.emotions[row.annotation.emotion.index()] += 1;
    }

    fn count(&self) -> u64 {
        self.articles.len() as u64
    }

    fn dominant(&self) -> Emotion {
        let mut best = Emotion::Neutral;
        let mut best_n = 0;
        for e in Emotion::ALL {
            if self.emotions[e.index()] > best_n {
                best = e;
                best_n = self.emotions[e.index()];
            }
        }
        best
    }

    fn finish(self, dimension: Dimension, method: AnalysisMethod, pt: PeriodType, period: Period) -> TrendRecord {
        let n = self.count() as f64;
        TrendRecord {
            dominant_emotion: self.dominant(),
            dimension,
            method,
            period_type: pt,
            period_start: period.start,
            period_end: period.end,
            avg_polarity: self.sum_polarity / n,
            avg_subjectivity: self.sum_subjectivity / n,
            article_count: self.count(),
            positive_count: self.positive,
            negative_count: self.negative,
            neutral_count: self.neutral,
        }
    }
}

/// Knobs shared by every bucket of one run.
#[derive(Debug, Clone, Copy)]
pub struct BucketRules {
    pub method: AnalysisMethod,
    pub period_type: PeriodType,
    pub thresholds: SentimentThresholds,
    /// Applies only when no dimension filter is set.
    pub keyword_min_articles: u64,
}

/// Records for one bucket, in dimension order. Empty dimensions yield nothing.
///
/// With `filter = None` the bucket gets overall, every primary category and
/// topic present, and keywords reaching `keyword_min_articles`.
pub fn aggregate_bucket(
    rows: &[AnnotatedArticle],
    period: Period,
    filter: Option<&Dimension>,
    rules: &BucketRules,
) -> Vec<TrendRecord> {
    let mut accs: BTreeMap<Dimension, Acc> = BTreeMap::new();
    let th = &rules.thresholds;

    for row in rows.iter().filter(|r| period.contains(r.reference_date())) {
        let mut dims: Vec<Dimension> = Vec::with_capacity(4 + row.keywords.len());
        match filter {
            None => {
                dims.push(Dimension::Overall);
                dims.extend(row.primary_category.map(Dimension::Category));
                dims.extend(row.primary_topic.map(Dimension::Topic));
                dims.extend(row.keywords.iter().cloned().map(Dimension::Keyword));
            }
            Some(Dimension::Overall) => dims.push(Dimension::Overall),
            Some(Dimension::Category(c)) => {
                if row.primary_category == Some(*c) {
                    dims.push(Dimension::Category(*c));
                }
            }
            Some(Dimension::Topic(t)) => {
                if row.primary_topic == Some(*t) {
                    dims.push(Dimension::Topic(*t));
                }
            }
            Some(Dimension::Keyword(k)) => {
                if row.keywords.contains(k) {
                    dims.push(Dimension::Keyword(k.clone()));
                }
            }
        }
        for d in dims {
            accs.entry(d).or_default().add(row, th);
        }
    }

    accs.into_iter()
        .filter(|(d, acc)| {
            acc.count() > 0
                && !(filter.is_none()
                    && matches!(d, Dimension::Keyword(_))
                    && acc.count() < rules.keyword_min_articles)
        })
        .map(|(d, acc)| acc.finish(d, rules.method, rules.period_type, period))
        .collect()
}

/// Lazy, bucket-at-a-time record sequence. Each bucket is read from the
/// store only when the iterator reaches it; building a new stream for the
/// same request yields the same records.
pub struct TrendStream {
    store: Arc<dyn ArticleStore>,
    periods: PeriodIter,
    filter: Option<Dimension>,
    rules: BucketRules,
    pending: VecDeque<TrendRecord>,
    done: bool,
}

impl TrendStream {
    pub(crate) fn new(
        store: Arc<dyn ArticleStore>,
        periods: PeriodIter,
        filter: Option<Dimension>,
        rules: BucketRules,
    ) -> Self {
        Self {
            store,
            periods,
            filter,
            rules,
            pending: VecDeque::new(),
            done: false,
        }
    }
}

impl Iterator for TrendStream {
    type Item = Result<TrendRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.pending.pop_front() {
                return Some(Ok(r));
            }
            if self.done {
                return None;
            }
            let Some(period) = self.periods.next() else {
                self.done = true;
                return None;
            };
            match self
                .store
                .annotated_between(self.rules.method, period.start, period.end)
            {
                Ok(rows) => {
                    let recs = aggregate_bucket(&rows, period, self.filter.as_ref(), &self.rules);
                    trace!(target: "trend", start = %period.start, rows = rows.len(), records = recs.len(), "bucket");
                    self.pending.extend(recs);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
