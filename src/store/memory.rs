//! memory.rs — in-process store for tests and one-off runs.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;

use super::{sort_trends, ArticleStore, TrendQuery, TrendScope};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    AnalysisMethod, Analysis, AnnotatedArticle, Annotation, AnnotationId, Article, ArticleKey,
    Associations, KeywordEntry, PendingFailure, TrendRecord,
};

#[derive(Debug, Default)]
struct Inner {
    articles: BTreeMap<ArticleKey, Article>,
    annotations: BTreeMap<(ArticleKey, AnalysisMethod), Annotation>,
    by_id: HashMap<AnnotationId, (ArticleKey, AnalysisMethod)>,
    associations: HashMap<AnnotationId, Associations>,
    keywords: BTreeMap<String, u64>,
    keyword_articles: BTreeSet<(String, ArticleKey)>,
    trends: Vec<TrendRecord>,
    failures: BTreeMap<(ArticleKey, AnalysisMethod), PendingFailure>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArticleStore for MemoryStore {
    fn upsert_article(&self, article: &Article) -> StoreResult<ArticleKey> {
        let key = article.key();
        self.inner
            .lock()
            .articles
            .entry(key.clone())
            .or_insert_with(|| article.clone());
        Ok(key)
    }

    fn article(&self, key: &ArticleKey) -> StoreResult<Option<Article>> {
        Ok(self.inner.lock().articles.get(key).cloned())
    }

    fn unanalyzed_articles(&self, method: AnalysisMethod) -> StoreResult<Vec<Article>> {
        let g = self.inner.lock();
        Ok(g.articles
            .iter()
            .filter(|(k, _)| !g.annotations.contains_key(&((*k).clone(), method)))
            .map(|(_, a)| a.clone())
            .collect())
    }

    fn upsert_annotation(
        &self,
        article: &ArticleKey,
        method: AnalysisMethod,
        analysis: &Analysis,
        at: DateTime<Utc>,
    ) -> StoreResult<Annotation> {
        let mut g = self.inner.lock();
        if !g.articles.contains_key(article) {
            return Err(StoreError::NotFound(format!("article {article}")));
        }
        let slot = (article.clone(), method);
        let existing = g.annotations.get(&slot).map(|a| a.id);
        let id = match existing {
            Some(id) => id,
            None => {
                g.next_id += 1;
                AnnotationId(g.next_id)
            }
        };
        let ann = Annotation {
            id,
            article: article.clone(),
            method,
            polarity: analysis.polarity,
            subjectivity: analysis.subjectivity,
            emotion: analysis.emotion,
            confidence: analysis.confidence,
            reasoning: analysis.reasoning.clone(),
            summary: analysis.summary.clone(),
            analysis_time: at,
        };
        g.by_id.insert(id, slot.clone());
        g.annotations.insert(slot, ann.clone());
        Ok(ann)
    }

    fn annotation(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<Option<Annotation>> {
        Ok(self
            .inner
            .lock()
            .annotations
            .get(&(article.clone(), method))
            .cloned())
    }

    fn annotations(&self, method: AnalysisMethod) -> StoreResult<Vec<(Article, Annotation)>> {
        let g = self.inner.lock();
        let mut out: Vec<(Article, Annotation)> = g
            .annotations
            .values()
            .filter(|a| a.method == method)
            .filter_map(|a| g.articles.get(&a.article).map(|art| (art.clone(), a.clone())))
            .collect();
        out.sort_by(|a, b| {
            b.1.analysis_time
                .cmp(&a.1.analysis_time)
                .then_with(|| a.1.article.cmp(&b.1.article))
        });
        Ok(out)
    }

    fn replace_associations(&self, annotation: AnnotationId, assoc: &Associations) -> StoreResult<()> {
        let mut g = self.inner.lock();
        let Some((article, _)) = g.by_id.get(&annotation).cloned() else {
            return Err(StoreError::NotFound(format!("annotation {}", annotation.0)));
        };
        for k in &assoc.keywords {
            // counted once per article, whichever method linked it first
            if g.keyword_articles.insert((k.keyword.clone(), article.clone())) {
                *g.keywords.entry(k.keyword.clone()).or_insert(0) += 1;
            }
        }
        g.associations.insert(annotation, assoc.clone());
        Ok(())
    }

    fn associations(&self, annotation: AnnotationId) -> StoreResult<Associations> {
        Ok(self
            .inner
            .lock()
            .associations
            .get(&annotation)
            .cloned()
            .unwrap_or_default())
    }

    fn annotated_between(
        &self,
        method: AnalysisMethod,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AnnotatedArticle>> {
        let g = self.inner.lock();
        let mut out = Vec::new();
        for ann in g.annotations.values().filter(|a| a.method == method) {
            let Some(article) = g.articles.get(&ann.article) else {
                continue;
            };
            let assoc = g.associations.get(&ann.id);
            let row = AnnotatedArticle {
                article: ann.article.clone(),
                published_at: article.published_at,
                annotation: ann.clone(),
                primary_category: assoc.and_then(Associations::primary_category),
                primary_topic: assoc.and_then(Associations::primary_topic),
                keywords: assoc
                    .map(|a| a.keywords.iter().map(|k| k.keyword.clone()).collect())
                    .unwrap_or_default(),
            };
            let d = row.reference_date();
            if d >= from && d < to {
                out.push(row);
            }
        }
        out.sort_by(|a, b| {
            a.reference_date()
                .cmp(&b.reference_date())
                .then_with(|| a.article.cmp(&b.article))
        });
        Ok(out)
    }

    fn keyword(&self, keyword: &str) -> StoreResult<Option<KeywordEntry>> {
        Ok(self.inner.lock().keywords.get(keyword).map(|&frequency| KeywordEntry {
            keyword: keyword.to_string(),
            frequency,
        }))
    }

    fn top_keywords(&self, limit: usize) -> StoreResult<Vec<KeywordEntry>> {
        let g = self.inner.lock();
        let mut all: Vec<KeywordEntry> = g
            .keywords
            .iter()
            .map(|(k, &f)| KeywordEntry {
                keyword: k.clone(),
                frequency: f,
            })
            .collect();
        all.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.keyword.cmp(&b.keyword)));
        all.truncate(limit);
        Ok(all)
    }

    fn replace_trends(&self, scope: &TrendScope, records: &[TrendRecord]) -> StoreResult<usize> {
        let mut g = self.inner.lock();
        g.trends.retain(|r| !scope.covers(r));
        // same bucket key written twice keeps the later one
        for r in records {
            g.trends.retain(|old| {
                !(old.method == r.method
                    && old.dimension == r.dimension
                    && old.period_type == r.period_type
                    && old.period_start == r.period_start
                    && old.period_end == r.period_end)
            });
            g.trends.push(r.clone());
        }
        Ok(records.len())
    }

    fn trends(&self, query: &TrendQuery) -> StoreResult<Vec<TrendRecord>> {
        let mut out: Vec<TrendRecord> = self
            .inner
            .lock()
            .trends
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        sort_trends(&mut out);
        Ok(out)
    }

    fn record_failure(&self, failure: &PendingFailure) -> StoreResult<()> {
        self.inner
            .lock()
            .failures
            .insert((failure.article.clone(), failure.method), failure.clone());
        Ok(())
    }

    fn clear_failure(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<()> {
        self.inner.lock().failures.remove(&(article.clone(), method));
        Ok(())
    }

    fn failures(&self, method: Option<AnalysisMethod>) -> StoreResult<Vec<PendingFailure>> {
        Ok(self
            .inner
            .lock()
            .failures
            .values()
            .filter(|f| method.map_or(true, |m| m == f.method))
            .cloned()
            .collect())
    }
}
