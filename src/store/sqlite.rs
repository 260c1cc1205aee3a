//! SQLite backend (rusqlite, bundled).
//!
//! Dates are stored as `YYYY-MM-DD` text so range filters compare
//! lexicographically; timestamps as microseconds since the epoch.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction};
use tracing::{debug, info, instrument};

use super::{sort_trends, ArticleStore, TrendQuery, TrendScope};
use crate::error::{StoreError, StoreResult};
use crate::logging::anon_id;
use crate::model::{
    AnalysisMethod, Analysis, AnnotatedArticle, Annotation, AnnotationId, Article, ArticleKey,
    Assigned, Associations, Dimension, Emotion, KeywordEntry, KeywordLink, PendingFailure,
    PeriodType, TrendRecord,
};
use crate::taxonomy::{Category, Topic};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS articles (
    key            TEXT PRIMARY KEY,
    link           TEXT,
    title          TEXT NOT NULL,
    content        TEXT,
    published_at   INTEGER,
    published_date TEXT
);

CREATE TABLE IF NOT EXISTS annotations (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    article_key    TEXT NOT NULL REFERENCES articles(key) ON DELETE CASCADE,
    method         TEXT NOT NULL,
    polarity       REAL NOT NULL,
    subjectivity   REAL NOT NULL,
    emotion        TEXT NOT NULL,
    confidence     REAL NOT NULL,
    reasoning      TEXT,
    summary        TEXT,
    analysis_time  INTEGER NOT NULL,
    analysis_date  TEXT NOT NULL,
    UNIQUE(article_key, method)
);

CREATE TABLE IF NOT EXISTS annotation_categories (
    annotation_id  INTEGER NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
    category       TEXT NOT NULL,
    confidence     REAL NOT NULL,
    is_primary     INTEGER NOT NULL,
    position       INTEGER NOT NULL,
    PRIMARY KEY (annotation_id, category)
);

CREATE TABLE IF NOT EXISTS annotation_topics (
    annotation_id  INTEGER NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
    topic          TEXT NOT NULL,
    confidence     REAL NOT NULL,
    is_primary     INTEGER NOT NULL,
    position       INTEGER NOT NULL,
    PRIMARY KEY (annotation_id, topic)
);

CREATE TABLE IF NOT EXISTS keywords (
    keyword        TEXT PRIMARY KEY,
    frequency      INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS keyword_articles (
    keyword        TEXT NOT NULL REFERENCES keywords(keyword),
    article_key    TEXT NOT NULL,
    PRIMARY KEY (keyword, article_key)
);

CREATE TABLE IF NOT EXISTS annotation_keywords (
    annotation_id  INTEGER NOT NULL REFERENCES annotations(id) ON DELETE CASCADE,
    keyword        TEXT NOT NULL REFERENCES keywords(keyword),
    relevance      REAL NOT NULL,
    position       INTEGER NOT NULL,
    PRIMARY KEY (annotation_id, keyword)
);

CREATE TABLE IF NOT EXISTS trend_records (
    method           TEXT NOT NULL,
    dim_kind         TEXT NOT NULL,
    dim_value        TEXT NOT NULL,
    period_type      TEXT NOT NULL,
    period_start     TEXT NOT NULL,
    period_end       TEXT NOT NULL,
    avg_polarity     REAL NOT NULL,
    avg_subjectivity REAL NOT NULL,
    article_count    INTEGER NOT NULL,
    positive_count   INTEGER NOT NULL,
    negative_count   INTEGER NOT NULL,
    neutral_count    INTEGER NOT NULL,
    dominant_emotion TEXT NOT NULL,
    PRIMARY KEY (method, dim_kind, dim_value, period_type, period_start, period_end)
);

CREATE TABLE IF NOT EXISTS pending_failures (
    article_key    TEXT NOT NULL,
    method         TEXT NOT NULL,
    kind           TEXT NOT NULL,
    detail         TEXT NOT NULL,
    failed_at      INTEGER NOT NULL,
    PRIMARY KEY (article_key, method)
);

CREATE INDEX IF NOT EXISTS idx_annotations_method ON annotations(method);
CREATE INDEX IF NOT EXISTS idx_articles_published ON articles(published_date);
CREATE INDEX IF NOT EXISTS idx_trends_period ON trend_records(method, period_type, period_start);
";

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    #[instrument(target = "store", skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_tables()?;
        info!(target: "store", "sqlite store ready");
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}

// ------------------------------------------------------------
// Row helpers
// ------------------------------------------------------------

fn to_micros(t: DateTime<Utc>) -> i64 {
    t.timestamp_micros()
}

fn from_micros(v: i64) -> StoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_micros(v).ok_or_else(|| StoreError::Corrupt(format!("timestamp {v}")))
}

fn date_str(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn parse_date(s: &str) -> StoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StoreError::Corrupt(format!("date {s:?}")))
}

fn parse_method(s: &str) -> StoreResult<AnalysisMethod> {
    AnalysisMethod::parse(s).ok_or_else(|| StoreError::Corrupt(format!("method {s:?}")))
}

fn parse_emotion(s: &str) -> StoreResult<Emotion> {
    Emotion::parse_label(s).ok_or_else(|| StoreError::Corrupt(format!("emotion {s:?}")))
}

fn count(v: i64) -> u64 {
    v.max(0) as u64
}

const ANNOTATION_COLS: &str = "n.id, n.article_key, n.method, n.polarity, n.subjectivity, n.emotion, \
     n.confidence, n.reasoning, n.summary, n.analysis_time";

/// Raw annotation columns; converted outside the rusqlite closure so
/// parse failures surface as `StoreError::Corrupt`.
struct AnnotationRow {
    id: i64,
    article_key: String,
    method: String,
    polarity: f64,
    subjectivity: f64,
    emotion: String,
    confidence: f64,
    reasoning: Option<String>,
    summary: Option<String>,
    analysis_time: i64,
}

impl AnnotationRow {
    /// Reads [`ANNOTATION_COLS`] starting at column `base`.
    fn read(row: &Row<'_>, base: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(base)?,
            article_key: row.get(base + 1)?,
            method: row.get(base + 2)?,
            polarity: row.get(base + 3)?,
            subjectivity: row.get(base + 4)?,
            emotion: row.get(base + 5)?,
            confidence: row.get(base + 6)?,
            reasoning: row.get(base + 7)?,
            summary: row.get(base + 8)?,
            analysis_time: row.get(base + 9)?,
        })
    }

    fn into_annotation(self) -> StoreResult<Annotation> {
        Ok(Annotation {
            id: AnnotationId(self.id),
            article: ArticleKey::from_raw(self.article_key),
            method: parse_method(&self.method)?,
            polarity: self.polarity,
            subjectivity: self.subjectivity,
            emotion: parse_emotion(&self.emotion)?,
            confidence: self.confidence,
            reasoning: self.reasoning,
            summary: self.summary,
            analysis_time: from_micros(self.analysis_time)?,
        })
    }
}

const ARTICLE_COLS: &str = "a.link, a.title, a.content, a.published_at";

fn read_article(row: &Row<'_>, base: usize) -> rusqlite::Result<(Option<String>, String, Option<String>, Option<i64>)> {
    Ok((
        row.get(base)?,
        row.get(base + 1)?,
        row.get(base + 2)?,
        row.get(base + 3)?,
    ))
}

fn into_article(raw: (Option<String>, String, Option<String>, Option<i64>)) -> StoreResult<Article> {
    let (link, title, content, published) = raw;
    Ok(Article {
        link,
        title,
        content,
        published_at: published.map(from_micros).transpose()?,
    })
}

fn load_associations(conn: &Connection, id: i64) -> StoreResult<Associations> {
    let mut assoc = Associations::default();

    let mut stmt = conn.prepare_cached(
        "SELECT category, confidence, is_primary FROM annotation_categories
         WHERE annotation_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?, r.get::<_, i64>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (name, confidence, primary) in rows {
        let value = Category::from_name(&name).ok_or_else(|| StoreError::Corrupt(format!("category {name:?}")))?;
        assoc.categories.push(Assigned {
            value,
            confidence,
            primary: primary != 0,
        });
    }

    let mut stmt = conn.prepare_cached(
        "SELECT topic, confidence, is_primary FROM annotation_topics
         WHERE annotation_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map(params![id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?, r.get::<_, i64>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    for (name, confidence, primary) in rows {
        let value = Topic::from_name(&name).ok_or_else(|| StoreError::Corrupt(format!("topic {name:?}")))?;
        assoc.topics.push(Assigned {
            value,
            confidence,
            primary: primary != 0,
        });
    }

    let mut stmt = conn.prepare_cached(
        "SELECT keyword, relevance FROM annotation_keywords
         WHERE annotation_id = ?1 ORDER BY position",
    )?;
    assoc.keywords = stmt
        .query_map(params![id], |r| {
            Ok(KeywordLink {
                keyword: r.get(0)?,
                relevance: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(assoc)
}

fn write_associations(tx: &Transaction<'_>, id: i64, assoc: &Associations) -> StoreResult<()> {
    let article: String = tx.query_row(
        "SELECT article_key FROM annotations WHERE id = ?1",
        params![id],
        |r| r.get(0),
    )?;

    tx.execute("DELETE FROM annotation_categories WHERE annotation_id = ?1", params![id])?;
    tx.execute("DELETE FROM annotation_topics WHERE annotation_id = ?1", params![id])?;
    tx.execute("DELETE FROM annotation_keywords WHERE annotation_id = ?1", params![id])?;

    for (pos, c) in assoc.categories.iter().enumerate() {
        tx.execute(
            "INSERT INTO annotation_categories (annotation_id, category, confidence, is_primary, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, c.value.name(), c.confidence, c.primary as i64, pos as i64],
        )?;
    }
    for (pos, t) in assoc.topics.iter().enumerate() {
        tx.execute(
            "INSERT INTO annotation_topics (annotation_id, topic, confidence, is_primary, position)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, t.value.name(), t.confidence, t.primary as i64, pos as i64],
        )?;
    }
    for (pos, k) in assoc.keywords.iter().enumerate() {
        tx.execute(
            "INSERT INTO keywords (keyword, frequency) VALUES (?1, 0) ON CONFLICT(keyword) DO NOTHING",
            params![k.keyword],
        )?;
        // first sighting of this keyword on this article, under any method
        let first = tx.execute(
            "INSERT OR IGNORE INTO keyword_articles (keyword, article_key) VALUES (?1, ?2)",
            params![k.keyword, article],
        )? == 1;
        if first {
            tx.execute(
                "UPDATE keywords SET frequency = frequency + 1 WHERE keyword = ?1",
                params![k.keyword],
            )?;
        }
        tx.execute(
            "INSERT INTO annotation_keywords (annotation_id, keyword, relevance, position)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, k.keyword, k.relevance, pos as i64],
        )?;
    }
    Ok(())
}

fn read_trend(row: &Row<'_>) -> rusqlite::Result<[String; 7]> {
    Ok([
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(12)?,
    ])
}

const TREND_COLS: &str = "method, dim_kind, dim_value, period_type, period_start, period_end, \
     avg_polarity, avg_subjectivity, article_count, positive_count, negative_count, neutral_count, \
     dominant_emotion";

// ------------------------------------------------------------
// ArticleStore
// ------------------------------------------------------------

impl ArticleStore for SqliteStore {
    #[instrument(target = "store", skip_all, fields(article = %anon_id(article.key().as_str())))]
    fn upsert_article(&self, article: &Article) -> StoreResult<ArticleKey> {
        let key = article.key();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO articles (key, link, title, content, published_at, published_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(key) DO NOTHING",
            params![
                key.as_str(),
                article.link,
                article.title,
                article.content,
                article.published_at.map(to_micros),
                article.published_at.map(|t| date_str(t.date_naive())),
            ],
        )?;
        Ok(key)
    }

    fn article(&self, key: &ArticleKey) -> StoreResult<Option<Article>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ARTICLE_COLS} FROM articles a WHERE a.key = ?1"),
                params![key.as_str()],
                |r| read_article(r, 0),
            )
            .optional()?;
        raw.map(into_article).transpose()
    }

    fn unanalyzed_articles(&self, method: AnalysisMethod) -> StoreResult<Vec<Article>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ARTICLE_COLS} FROM articles a
             WHERE NOT EXISTS (
                SELECT 1 FROM annotations n WHERE n.article_key = a.key AND n.method = ?1
             )
             ORDER BY a.key"
        ))?;
        let raw = stmt
            .query_map(params![method.as_str()], |r| read_article(r, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(into_article).collect()
    }

    #[instrument(target = "store", skip_all, fields(article = %anon_id(article.as_str()), method = %method))]
    fn upsert_annotation(
        &self,
        article: &ArticleKey,
        method: AnalysisMethod,
        analysis: &Analysis,
        at: DateTime<Utc>,
    ) -> StoreResult<Annotation> {
        // stored precision is microseconds; hand back what a re-read would give
        let at = from_micros(to_micros(at))?;
        let conn = self.conn.lock();

        let exists = conn
            .query_row("SELECT 1 FROM articles WHERE key = ?1", params![article.as_str()], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(format!("article {article}")));
        }

        conn.execute(
            "INSERT INTO annotations
             (article_key, method, polarity, subjectivity, emotion, confidence, reasoning, summary,
              analysis_time, analysis_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(article_key, method) DO UPDATE SET
                polarity = excluded.polarity,
                subjectivity = excluded.subjectivity,
                emotion = excluded.emotion,
                confidence = excluded.confidence,
                reasoning = excluded.reasoning,
                summary = excluded.summary,
                analysis_time = excluded.analysis_time,
                analysis_date = excluded.analysis_date",
            params![
                article.as_str(),
                method.as_str(),
                analysis.polarity,
                analysis.subjectivity,
                analysis.emotion.as_str(),
                analysis.confidence,
                analysis.reasoning,
                analysis.summary,
                to_micros(at),
                date_str(at.date_naive()),
            ],
        )?;
        let id: i64 = conn.query_row(
            "SELECT id FROM annotations WHERE article_key = ?1 AND method = ?2",
            params![article.as_str(), method.as_str()],
            |r| r.get(0),
        )?;
        debug!(target: "store", id, "annotation upserted");

        Ok(Annotation {
            id: AnnotationId(id),
            article: article.clone(),
            method,
            polarity: analysis.polarity,
            subjectivity: analysis.subjectivity,
            emotion: analysis.emotion,
            confidence: analysis.confidence,
            reasoning: analysis.reasoning.clone(),
            summary: analysis.summary.clone(),
            analysis_time: at,
        })
    }

    fn annotation(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<Option<Annotation>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {ANNOTATION_COLS} FROM annotations n WHERE n.article_key = ?1 AND n.method = ?2"),
                params![article.as_str(), method.as_str()],
                |r| AnnotationRow::read(r, 0),
            )
            .optional()?;
        raw.map(AnnotationRow::into_annotation).transpose()
    }

    fn annotations(&self, method: AnalysisMethod) -> StoreResult<Vec<(Article, Annotation)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANNOTATION_COLS}, {ARTICLE_COLS}
             FROM annotations n JOIN articles a ON a.key = n.article_key
             WHERE n.method = ?1
             ORDER BY n.analysis_time DESC, n.article_key"
        ))?;
        let raw = stmt
            .query_map(params![method.as_str()], |r| Ok((AnnotationRow::read(r, 0)?, read_article(r, 10)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(n, a)| Ok((into_article(a)?, n.into_annotation()?)))
            .collect()
    }

    #[instrument(target = "store", skip_all, fields(annotation = annotation.0))]
    fn replace_associations(&self, annotation: AnnotationId, assoc: &Associations) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM annotations WHERE id = ?1", params![annotation.0], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Err(StoreError::NotFound(format!("annotation {}", annotation.0)));
        }
        write_associations(&tx, annotation.0, assoc)?;
        tx.commit()?;
        Ok(())
    }

    fn associations(&self, annotation: AnnotationId) -> StoreResult<Associations> {
        let conn = self.conn.lock();
        load_associations(&conn, annotation.0)
    }

    fn annotated_between(
        &self,
        method: AnalysisMethod,
        from: NaiveDate,
        to: NaiveDate,
    ) -> StoreResult<Vec<AnnotatedArticle>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANNOTATION_COLS}, a.published_at
             FROM annotations n JOIN articles a ON a.key = n.article_key
             WHERE n.method = ?1
               AND COALESCE(a.published_date, n.analysis_date) >= ?2
               AND COALESCE(a.published_date, n.analysis_date) < ?3
             ORDER BY COALESCE(a.published_date, n.analysis_date), n.article_key"
        ))?;
        let raw = stmt
            .query_map(params![method.as_str(), date_str(from), date_str(to)], |r| {
                Ok((AnnotationRow::read(r, 0)?, r.get::<_, Option<i64>>(10)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let mut out = Vec::with_capacity(raw.len());
        for (row, published) in raw {
            let annotation = row.into_annotation()?;
            let assoc = load_associations(&conn, annotation.id.0)?;
            out.push(AnnotatedArticle {
                article: annotation.article.clone(),
                published_at: published.map(from_micros).transpose()?,
                primary_category: assoc.primary_category(),
                primary_topic: assoc.primary_topic(),
                keywords: assoc.keywords.into_iter().map(|k| k.keyword).collect(),
                annotation,
            });
        }
        Ok(out)
    }

    fn keyword(&self, keyword: &str) -> StoreResult<Option<KeywordEntry>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT keyword, frequency FROM keywords WHERE keyword = ?1",
                params![keyword],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(keyword, f)| KeywordEntry {
            keyword,
            frequency: count(f),
        }))
    }

    fn top_keywords(&self, limit: usize) -> StoreResult<Vec<KeywordEntry>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT keyword, frequency FROM keywords ORDER BY frequency DESC, keyword LIMIT ?1")?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |r| {
                Ok(KeywordEntry {
                    keyword: r.get(0)?,
                    frequency: count(r.get(1)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    #[instrument(target = "store", skip_all, fields(method = %scope.method, period = %scope.period_type, n = records.len()))]
    fn replace_trends(&self, scope: &TrendScope, records: &[TrendRecord]) -> StoreResult<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let deleted = match &scope.dimension {
            None => tx.execute(
                "DELETE FROM trend_records
                 WHERE method = ?1 AND period_type = ?2 AND period_start >= ?3 AND period_start < ?4",
                params![
                    scope.method.as_str(),
                    scope.period_type.as_str(),
                    date_str(scope.window_start),
                    date_str(scope.window_end),
                ],
            )?,
            Some(d) => tx.execute(
                "DELETE FROM trend_records
                 WHERE method = ?1 AND period_type = ?2 AND period_start >= ?3 AND period_start < ?4
                   AND dim_kind = ?5 AND dim_value = ?6",
                params![
                    scope.method.as_str(),
                    scope.period_type.as_str(),
                    date_str(scope.window_start),
                    date_str(scope.window_end),
                    d.kind(),
                    d.value(),
                ],
            )?,
        };

        {
            let mut ins = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO trend_records ({TREND_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ))?;
            for r in records {
                ins.execute(params![
                    r.method.as_str(),
                    r.dimension.kind(),
                    r.dimension.value(),
                    r.period_type.as_str(),
                    date_str(r.period_start),
                    date_str(r.period_end),
                    r.avg_polarity,
                    r.avg_subjectivity,
                    r.article_count as i64,
                    r.positive_count as i64,
                    r.negative_count as i64,
                    r.neutral_count as i64,
                    r.dominant_emotion.as_str(),
                ])?;
            }
        }
        tx.commit()?;
        debug!(target: "store", deleted, written = records.len(), "trend records replaced");
        Ok(records.len())
    }

    fn trends(&self, query: &TrendQuery) -> StoreResult<Vec<TrendRecord>> {
        let mut sql = format!("SELECT {TREND_COLS} FROM trend_records WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();
        let mut push = |clause: &str, value: String, sql: &mut String| {
            args.push(value);
            sql.push_str(&format!(" AND {clause} ?{}", args.len()));
        };
        if let Some(m) = query.method {
            push("method =", m.as_str().to_string(), &mut sql);
        }
        if let Some(p) = query.period_type {
            push("period_type =", p.as_str().to_string(), &mut sql);
        }
        if let Some(d) = &query.dimension {
            push("dim_kind =", d.kind().to_string(), &mut sql);
            push("dim_value =", d.value(), &mut sql);
        }
        if let Some(k) = &query.kind {
            push("dim_kind =", k.clone(), &mut sql);
        }
        if let Some(s) = query.since {
            push("period_start >=", date_str(s), &mut sql);
        }
        if let Some(u) = query.until {
            push("period_start <=", date_str(u), &mut sql);
        }

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let raw = stmt
            .query_map(params_from_iter(args.iter()), |r| {
                Ok((
                    read_trend(r)?,
                    r.get::<_, f64>(6)?,
                    r.get::<_, f64>(7)?,
                    [r.get::<_, i64>(8)?, r.get(9)?, r.get(10)?, r.get(11)?],
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(raw.len());
        for (text, avg_polarity, avg_subjectivity, counts) in raw {
            let [method, kind, value, period, start, end, emotion] = text;
            let dimension = Dimension::from_parts(&kind, &value)
                .ok_or_else(|| StoreError::Corrupt(format!("dimension {kind}:{value}")))?;
            out.push(TrendRecord {
                dimension,
                method: parse_method(&method)?,
                period_type: PeriodType::parse(&period)
                    .ok_or_else(|| StoreError::Corrupt(format!("period type {period:?}")))?,
                period_start: parse_date(&start)?,
                period_end: parse_date(&end)?,
                avg_polarity,
                avg_subjectivity,
                article_count: count(counts[0]),
                positive_count: count(counts[1]),
                negative_count: count(counts[2]),
                neutral_count: count(counts[3]),
                dominant_emotion: parse_emotion(&emotion)?,
            });
        }
        sort_trends(&mut out);
        Ok(out)
    }

    fn record_failure(&self, f: &PendingFailure) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO pending_failures (article_key, method, kind, detail, failed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(article_key, method) DO UPDATE SET
                kind = excluded.kind,
                detail = excluded.detail,
                failed_at = excluded.failed_at",
            params![
                f.article.as_str(),
                f.method.as_str(),
                f.kind,
                f.detail,
                to_micros(f.failed_at),
            ],
        )?;
        Ok(())
    }

    fn clear_failure(&self, article: &ArticleKey, method: AnalysisMethod) -> StoreResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM pending_failures WHERE article_key = ?1 AND method = ?2",
            params![article.as_str(), method.as_str()],
        )?;
        Ok(())
    }

    fn failures(&self, method: Option<AnalysisMethod>) -> StoreResult<Vec<PendingFailure>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT article_key, method, kind, detail, failed_at FROM pending_failures
             WHERE ?1 IS NULL OR method = ?1
             ORDER BY article_key, method",
        )?;
        let raw = stmt
            .query_map(params![method.map(AnalysisMethod::as_str)], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, i64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(key, m, kind, detail, at)| {
                Ok(PendingFailure {
                    article: ArticleKey::from_raw(key),
                    method: parse_method(&m)?,
                    kind,
                    detail,
                    failed_at: from_micros(at)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Suggestions;
    use chrono::TimeZone;

    fn analysis(p: f64) -> Analysis {
        Analysis {
            polarity: p,
            subjectivity: 0.4,
            emotion: Emotion::Joy,
            confidence: 0.8,
            reasoning: Some("r".into()),
            summary: None,
            suggestions: Suggestions::default(),
            quality: vec![],
        }
    }

    #[test]
    fn annotation_upsert_keeps_id() {
        let s = SqliteStore::open_in_memory().unwrap();
        let key = s.upsert_article(&Article::new("Title").with_link("https://a.test/1")).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let first = s.upsert_annotation(&key, AnalysisMethod::Heuristic, &analysis(0.2), at).unwrap();
        let second = s.upsert_annotation(&key, AnalysisMethod::Heuristic, &analysis(-0.3), at).unwrap();
        assert_eq!(first.id, second.id);

        let stored = s.annotation(&key, AnalysisMethod::Heuristic).unwrap().unwrap();
        assert_eq!(stored, second);
        assert!(s.unanalyzed_articles(AnalysisMethod::Heuristic).unwrap().is_empty());
        assert_eq!(s.unanalyzed_articles(AnalysisMethod::Generative).unwrap().len(), 1);
    }

    #[test]
    fn annotation_for_unknown_article_is_not_found() {
        let s = SqliteStore::open_in_memory().unwrap();
        let err = s
            .upsert_annotation(&ArticleKey::from_raw("link:nope"), AnalysisMethod::Heuristic, &analysis(0.0), Utc::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn failures_round_trip_and_clear() {
        let s = SqliteStore::open_in_memory().unwrap();
        let f = PendingFailure {
            article: ArticleKey::from_raw("title:x"),
            method: AnalysisMethod::Generative,
            kind: "unavailable".into(),
            detail: "timeout".into(),
            failed_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        s.record_failure(&f).unwrap();
        assert_eq!(s.failures(None).unwrap(), vec![f.clone()]);
        assert!(s.failures(Some(AnalysisMethod::Heuristic)).unwrap().is_empty());
        s.clear_failure(&f.article, f.method).unwrap();
        assert!(s.failures(None).unwrap().is_empty());
    }
}
