//! Period-over-period momentum and "what is trending" rankings.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{Dimension, TrendRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumMetric {
    ArticleCount,
    AvgPolarity,
}

impl MomentumMetric {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "count" | "article_count" | "articles" => Some(MomentumMetric::ArticleCount),
            "polarity" | "avg_polarity" | "sentiment" => Some(MomentumMetric::AvgPolarity),
            _ => None,
        }
    }

    fn value(self, r: &TrendRecord) -> f64 {
        match self {
            MomentumMetric::ArticleCount => r.article_count as f64,
            MomentumMetric::AvgPolarity => r.avg_polarity,
        }
    }

    /// Counts are exact; polarity uses the configured tolerance.
    pub fn tolerance(self, polarity_tolerance: f64) -> f64 {
        match self {
            MomentumMetric::ArticleCount => 0.0,
            MomentumMetric::AvgPolarity => polarity_tolerance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Momentum {
    /// No pair of consecutive non-empty periods.
    InsufficientData,
    Change {
        direction: Direction,
        delta: f64,
        current: f64,
        previous: f64,
        period_start: NaiveDate,
    },
}

impl Momentum {
    pub fn delta(&self) -> Option<f64> {
        match self {
            Momentum::Change { delta, .. } => Some(*delta),
            Momentum::InsufficientData => None,
        }
    }
}

/// Momentum of one dimension's series: latest record against the record
/// whose `period_end` equals the latest `period_start`. A gap is not a
/// predecessor.
pub fn momentum(records: &[TrendRecord], metric: MomentumMetric, tolerance: f64) -> Momentum {
    let Some(latest) = records.iter().max_by_key(|r| r.period_start) else {
        return Momentum::InsufficientData;
    };
    let Some(prev) = records.iter().find(|r| r.period_end == latest.period_start) else {
        return Momentum::InsufficientData;
    };

    let current = metric.value(latest);
    let previous = metric.value(prev);
    let delta = current - previous;
    let direction = if delta.abs() <= tolerance {
        Direction::Flat
    } else if delta > 0.0 {
        Direction::Rising
    } else {
        Direction::Falling
    };
    Momentum::Change {
        direction,
        delta,
        current,
        previous,
        period_start: latest.period_start,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingEntry {
    pub dimension: Dimension,
    pub delta: f64,
    pub current: f64,
    pub previous: f64,
    pub period_start: NaiveDate,
}

/// Rising dimensions of one kind ("category", "topic", "keyword"), largest
/// delta first. Only dimensions present in the most recent period count.
///
/// `records` should share one method and period type.
pub fn trending(
    records: &[TrendRecord],
    kind: &str,
    metric: MomentumMetric,
    tolerance: f64,
    limit: usize,
) -> Vec<TrendingEntry> {
    let mut series: BTreeMap<&Dimension, Vec<TrendRecord>> = BTreeMap::new();
    for r in records.iter().filter(|r| r.dimension.kind() == kind) {
        series.entry(&r.dimension).or_default().push(r.clone());
    }
    let Some(latest) = series.values().flatten().map(|r| r.period_start).max() else {
        return Vec::new();
    };

    let mut out: Vec<TrendingEntry> = series
        .into_iter()
        .filter_map(|(dim, recs)| match momentum(&recs, metric, tolerance) {
            Momentum::Change {
                direction: Direction::Rising,
                delta,
                current,
                previous,
                period_start,
            } if period_start == latest => Some(TrendingEntry {
                dimension: dim.clone(),
                delta,
                current,
                previous,
                period_start,
            }),
            _ => None,
        })
        .collect();

    out.sort_by(|a, b| {
        b.delta
            .partial_cmp(&a.delta)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.dimension.cmp(&b.dimension))
    });
    out.truncate(limit);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisMethod, Emotion, PeriodType};

    fn rec(dim: Dimension, day: u32, count: u64, pol: f64) -> TrendRecord {
        let start = NaiveDate::from_ymd_opt(2024, 5, day).unwrap();
        TrendRecord {
            dimension: dim,
            method: AnalysisMethod::Heuristic,
            period_type: PeriodType::Daily,
            period_start: start,
            period_end: start.succ_opt().unwrap(),
            avg_polarity: pol,
            avg_subjectivity: 0.5,
            article_count: count,
            positive_count: 0,
            negative_count: 0,
            neutral_count: count,
            dominant_emotion: Emotion::Neutral,
        }
    }

    fn kw(k: &str) -> Dimension {
        Dimension::Keyword(k.into())
    }

    #[test]
    fn single_period_is_insufficient() {
        let r = vec![rec(kw("fed"), 3, 4, 0.1)];
        assert_eq!(momentum(&r, MomentumMetric::ArticleCount, 0.0), Momentum::InsufficientData);
        assert_eq!(momentum(&[], MomentumMetric::ArticleCount, 0.0), Momentum::InsufficientData);
    }

    #[test]
    fn gap_is_not_a_predecessor() {
        let r = vec![rec(kw("fed"), 1, 2, 0.0), rec(kw("fed"), 3, 5, 0.0)];
        assert_eq!(momentum(&r, MomentumMetric::ArticleCount, 0.0), Momentum::InsufficientData);
    }

    #[test]
    fn direction_and_delta() {
        let r = vec![rec(kw("fed"), 2, 2, 0.30), rec(kw("fed"), 3, 5, 0.305)];
        match momentum(&r, MomentumMetric::ArticleCount, 0.0) {
            Momentum::Change { direction, delta, .. } => {
                assert_eq!(direction, Direction::Rising);
                assert_eq!(delta, 3.0);
            }
            other => panic!("{other:?}"),
        }
        match momentum(&r, MomentumMetric::AvgPolarity, 0.01) {
            Momentum::Change { direction, .. } => assert_eq!(direction, Direction::Flat),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn trending_ranks_rising_in_latest_period() {
        let records = vec![
            rec(kw("fed"), 2, 2, 0.0),
            rec(kw("fed"), 3, 6, 0.0),
            rec(kw("oil"), 2, 2, 0.0),
            rec(kw("oil"), 3, 3, 0.0),
            rec(kw("gold"), 2, 5, 0.0),
            rec(kw("gold"), 3, 1, 0.0),
            // stale: rose, but not in the latest period
            rec(kw("wheat"), 1, 1, 0.0),
            rec(kw("wheat"), 2, 9, 0.0),
            rec(Dimension::Overall, 3, 10, 0.0),
        ];
        let top = trending(&records, "keyword", MomentumMetric::ArticleCount, 0.0, 10);
        let names: Vec<_> = top.iter().map(|e| e.dimension.value()).collect();
        assert_eq!(names, vec!["fed", "oil"]);
        assert_eq!(top[0].delta, 4.0);
    }
}
