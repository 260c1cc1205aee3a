//! model.rs — articles, annotations, associations and trend records.
//!
//! Annotations are owned by the store; the trend aggregator only reads them and
//! writes [`TrendRecord`]s.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::taxonomy::{Category, Topic};

/// Stable article identity: the link when present, else the normalized title.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleKey(String);

impl ArticleKey {
    pub fn new(link: Option<&str>, title: &str) -> Self {
        match link.map(str::trim).filter(|l| !l.is_empty()) {
            Some(l) => Self(format!("link:{l}")),
            None => Self(format!("title:{}", normalize_title(title))),
        }
    }

    /// Rebuild from a stored key string.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub link: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            link: None,
            title: title.into(),
            content: None,
            published_at: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }

    pub fn key(&self) -> ArticleKey {
        ArticleKey::new(self.link.as_deref(), &self.title)
    }

    /// Title plus body, the text handed to annotators.
    pub fn text(&self) -> String {
        match self.content.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(body) => format!("{}\n\n{}", self.title.trim(), body),
            None => self.title.trim().to_string(),
        }
    }
}

/// Fixed emotion set. Declaration order breaks ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
        Emotion::Disgust,
        Emotion::Neutral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
            Emotion::Disgust => "disgust",
            Emotion::Neutral => "neutral",
        }
    }

    /// Lenient label parsing; `None` for anything outside the set.
    pub fn parse_label(label: &str) -> Option<Emotion> {
        match label.trim().to_ascii_lowercase().as_str() {
            "joy" | "happy" | "happiness" | "optimism" => Some(Emotion::Joy),
            "sadness" | "sad" | "grief" => Some(Emotion::Sadness),
            "anger" | "angry" | "outrage" => Some(Emotion::Anger),
            "fear" | "fearful" | "anxiety" | "worry" => Some(Emotion::Fear),
            "surprise" | "surprised" => Some(Emotion::Surprise),
            "disgust" | "disgusted" => Some(Emotion::Disgust),
            "neutral" | "none" => Some(Emotion::Neutral),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Heuristic,
    Generative,
}

impl AnalysisMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisMethod::Heuristic => "heuristic",
            AnalysisMethod::Generative => "generative",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" | "lexicon" | "rules" => Some(AnalysisMethod::Heuristic),
            "generative" | "llm" | "ollama" => Some(AnalysisMethod::Generative),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric field that arrived out of bounds and was clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityEvent {
    pub field: String,
    pub raw: f64,
    pub clamped: f64,
}

/// Free-form name suggested by an annotator, with an optional score.
/// For keywords the score is the relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(default)]
    pub score: Option<f64>,
}

impl Suggestion {
    pub fn new(name: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            name: name.into(),
            score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub categories: Vec<Suggestion>,
    pub topics: Vec<Suggestion>,
    pub keywords: Vec<Suggestion>,
}

/// What an annotator returns. Bounds already enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub polarity: f64,
    pub subjectivity: f64,
    pub emotion: Emotion,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub summary: Option<String>,
    pub suggestions: Suggestions,
    /// Clamping applied while building this analysis.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quality: Vec<QualityEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub i64);

/// Persisted annotation for one (article, method) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: AnnotationId,
    pub article: ArticleKey,
    pub method: AnalysisMethod,
    pub polarity: f64,
    pub subjectivity: f64,
    pub emotion: Emotion,
    pub confidence: f64,
    pub reasoning: Option<String>,
    pub summary: Option<String>,
    pub analysis_time: DateTime<Utc>,
}

/// Vocabulary value with its confidence and primary flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assigned<T> {
    pub value: T,
    pub confidence: f64,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordLink {
    pub keyword: String,
    pub relevance: f64,
}

/// Resolved associations of one annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Associations {
    pub categories: Vec<Assigned<Category>>,
    pub topics: Vec<Assigned<Topic>>,
    pub keywords: Vec<KeywordLink>,
}

impl Associations {
    pub fn primary_category(&self) -> Option<Category> {
        self.categories.iter().find(|c| c.primary).map(|c| c.value)
    }

    pub fn primary_topic(&self) -> Option<Topic> {
        self.topics.iter().find(|t| t.primary).map(|t| t.value)
    }
}

/// Keyword table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordEntry {
    pub keyword: String,
    pub frequency: u64,
}

/// Input row for trend aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedArticle {
    pub article: ArticleKey,
    pub published_at: Option<DateTime<Utc>>,
    pub annotation: Annotation,
    pub primary_category: Option<Category>,
    pub primary_topic: Option<Topic>,
    pub keywords: Vec<String>,
}

impl AnnotatedArticle {
    /// Published date, falling back to analysis time.
    pub fn reference_date(&self) -> NaiveDate {
        self.published_at
            .unwrap_or(self.annotation.analysis_time)
            .date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
}

impl PeriodType {
    pub fn as_str(self) -> &'static str {
        match self {
            PeriodType::Daily => "daily",
            PeriodType::Weekly => "weekly",
            PeriodType::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(PeriodType::Daily),
            "weekly" | "week" => Some(PeriodType::Weekly),
            "monthly" | "month" => Some(PeriodType::Monthly),
            _ => None,
        }
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregation axis.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Dimension {
    Overall,
    Category(Category),
    Topic(Topic),
    Keyword(String),
}

impl Dimension {
    pub fn kind(&self) -> &'static str {
        match self {
            Dimension::Overall => "overall",
            Dimension::Category(_) => "category",
            Dimension::Topic(_) => "topic",
            Dimension::Keyword(_) => "keyword",
        }
    }

    /// Storage value; empty for `Overall`.
    pub fn value(&self) -> String {
        match self {
            Dimension::Overall => String::new(),
            Dimension::Category(c) => c.name().to_string(),
            Dimension::Topic(t) => t.name().to_string(),
            Dimension::Keyword(k) => k.clone(),
        }
    }

    pub fn from_parts(kind: &str, value: &str) -> Option<Dimension> {
        match kind {
            "overall" => Some(Dimension::Overall),
            "category" => Category::from_name(value).map(Dimension::Category),
            "topic" => Topic::from_name(value).map(Dimension::Topic),
            "keyword" => Some(Dimension::Keyword(value.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Overall => f.write_str("overall"),
            other => write!(f, "{}:{}", other.kind(), other.value()),
        }
    }
}

/// Aggregate over one `(dimension, period)` bucket. Derived data only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub dimension: Dimension,
    pub method: AnalysisMethod,
    pub period_type: PeriodType,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub avg_polarity: f64,
    pub avg_subjectivity: f64,
    pub article_count: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub neutral_count: u64,
    pub dominant_emotion: Emotion,
}

/// Article that could not be annotated in a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFailure {
    pub article: ArticleKey,
    pub method: AnalysisMethod,
    pub kind: String,
    pub detail: String,
    pub failed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_prefers_link_then_normalized_title() {
        let a = Article::new("Fed Holds Rates").with_link(" https://x.test/a ");
        assert_eq!(a.key().as_str(), "link:https://x.test/a");

        let b = Article::new("  Fed   Holds\tRates ");
        let c = Article::new("fed holds rates").with_link("   ");
        assert_eq!(b.key(), c.key());
        assert_eq!(b.key().as_str(), "title:fed holds rates");
    }

    #[test]
    fn emotion_labels_are_lenient_but_closed() {
        assert_eq!(Emotion::parse_label(" Joy "), Some(Emotion::Joy));
        assert_eq!(Emotion::parse_label("angry"), Some(Emotion::Anger));
        assert_eq!(Emotion::parse_label("melancholy"), None);
    }

    #[test]
    fn dimension_parts_round_trip() {
        for d in [
            Dimension::Overall,
            Dimension::Category(Category::Health),
            Dimension::Topic(Topic::ClimateChange),
            Dimension::Keyword("rate cut".into()),
        ] {
            assert_eq!(Dimension::from_parts(d.kind(), &d.value()), Some(d.clone()));
        }
    }

    #[test]
    fn article_text_joins_title_and_body() {
        let a = Article::new("Title").with_content("  Body text ");
        assert_eq!(a.text(), "Title\n\nBody text");
        assert_eq!(Article::new(" Only title ").text(), "Only title");
    }
}
