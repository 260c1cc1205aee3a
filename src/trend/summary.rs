//! Digest over stored trend records: busiest categories, category mood,
//! most discussed keywords.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::{Dimension, PeriodType, TrendRecord};
use crate::taxonomy::Category;

const ACTIVE_WINDOW_DAYS: u64 = 7;
const SENTIMENT_WINDOW_DAYS: u64 = 30;
const KEYWORD_WINDOW_DAYS: u64 = 30;
const MIN_SENTIMENT_PERIODS: usize = 5;
const TOP_CATEGORIES: usize = 5;
const TOP_KEYWORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryActivity {
    pub category: Category,
    pub articles: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySentiment {
    pub category: Category,
    pub avg_polarity: f64,
    pub periods: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMentions {
    pub keyword: String,
    pub mentions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub as_of: NaiveDate,
    /// Weekly records starting in the last 7 days, top 5 by articles.
    pub most_active_categories: Vec<CategoryActivity>,
    /// Daily records of the last 30 days; categories with at least 5 periods,
    /// most positive first.
    pub sentiment_by_category: Vec<CategorySentiment>,
    /// Weekly records of the last 30 days, top 10 by mentions.
    pub trending_keywords: Vec<KeywordMentions>,
}

impl TrendSummary {
    /// `records` should come from a single analysis method.
    pub fn from_records(records: &[TrendRecord], today: NaiveDate) -> Self {
        let since = |days: u64| today.checked_sub_days(Days::new(days)).unwrap_or(NaiveDate::MIN);

        let active_since = since(ACTIVE_WINDOW_DAYS);
        let mut active: BTreeMap<Category, u64> = BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.period_type == PeriodType::Weekly && r.period_start >= active_since)
        {
            if let Dimension::Category(c) = r.dimension {
                *active.entry(c).or_default() += r.article_count;
            }
        }
        let mut most_active_categories: Vec<_> = active
            .into_iter()
            .map(|(category, articles)| CategoryActivity { category, articles })
            .collect();
        // stable sort keeps enum order among equals
        most_active_categories.sort_by(|a, b| b.articles.cmp(&a.articles));
        most_active_categories.truncate(TOP_CATEGORIES);

        let mood_since = since(SENTIMENT_WINDOW_DAYS);
        let mut mood: BTreeMap<Category, (f64, usize)> = BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.period_type == PeriodType::Daily && r.period_start >= mood_since)
        {
            if let Dimension::Category(c) = r.dimension {
                let e = mood.entry(c).or_default();
                e.0 += r.avg_polarity;
                e.1 += 1;
            }
        }
        let mut sentiment_by_category: Vec<_> = mood
            .into_iter()
            .filter(|(_, (_, n))| *n >= MIN_SENTIMENT_PERIODS)
            .map(|(category, (sum, n))| CategorySentiment {
                category,
                avg_polarity: sum / n as f64,
                periods: n,
            })
            .collect();
        sentiment_by_category.sort_by(|a, b| {
            b.avg_polarity
                .partial_cmp(&a.avg_polarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let kw_since = since(KEYWORD_WINDOW_DAYS);
        let mut mentions: BTreeMap<&str, u64> = BTreeMap::new();
        for r in records
            .iter()
            .filter(|r| r.period_type == PeriodType::Weekly && r.period_start >= kw_since)
        {
            if let Dimension::Keyword(k) = &r.dimension {
                *mentions.entry(k.as_str()).or_default() += r.article_count;
            }
        }
        let mut trending_keywords: Vec<_> = mentions
            .into_iter()
            .map(|(k, mentions)| KeywordMentions {
                keyword: k.to_string(),
                mentions,
            })
            .collect();
        trending_keywords.sort_by(|a, b| b.mentions.cmp(&a.mentions));
        trending_keywords.truncate(TOP_KEYWORDS);

        Self {
            as_of: today,
            most_active_categories,
            sentiment_by_category,
            trending_keywords,
        }
    }
}
