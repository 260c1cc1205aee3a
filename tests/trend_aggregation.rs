// tests/trend_aggregation.rs
//
// Trend aggregation against the in-memory store:
// - the three-article daily bucket
// - dominant emotion ties
// - range and dimension validation write nothing
// - bucket partition over random data (seeded)
// - recompute replaces stale records
// - keyword minimum applies only to unfiltered sweeps
// - momentum over stored series

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use news_trend_analyzer::model::{
    Analysis, AnalysisMethod, Article, Assigned, Associations, Dimension, Emotion, KeywordLink,
    PeriodType, Suggestions,
};
use news_trend_analyzer::store::{ArticleStore, MemoryStore, TrendQuery};
use news_trend_analyzer::taxonomy::Category;
use news_trend_analyzer::trend::{
    DimensionFilter, Direction, Momentum, MomentumMetric, TrendAggregator, TrendRequest, TrendSettings,
};
use news_trend_analyzer::TrendError;

const M: AnalysisMethod = AnalysisMethod::Heuristic;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seed(
    store: &dyn ArticleStore,
    title: &str,
    day: NaiveDate,
    polarity: f64,
    category: Option<Category>,
    keywords: &[&str],
) {
    let emotion = if polarity > 0.0 { Emotion::Joy } else { Emotion::Sadness };
    seed_feeling(store, title, day, polarity, emotion, category, keywords);
}

fn seed_feeling(
    store: &dyn ArticleStore,
    title: &str,
    day: NaiveDate,
    polarity: f64,
    emotion: Emotion,
    category: Option<Category>,
    keywords: &[&str],
) {
    let article = Article::new(title)
        .with_link(format!("https://news.test/{}", title.replace(' ', "-")))
        .published(day.and_hms_opt(12, 0, 0).unwrap().and_utc());
    let key = store.upsert_article(&article).unwrap();
    let analysis = Analysis {
        polarity,
        subjectivity: 0.5,
        emotion,
        confidence: 0.7,
        reasoning: None,
        summary: None,
        suggestions: Suggestions::default(),
        quality: vec![],
    };
    let ann = store.upsert_annotation(&key, M, &analysis, Utc::now()).unwrap();
    let assoc = Associations {
        categories: category
            .map(|c| {
                vec![Assigned {
                    value: c,
                    confidence: 0.9,
                    primary: true,
                }]
            })
            .unwrap_or_default(),
        topics: vec![],
        keywords: keywords
            .iter()
            .map(|k| KeywordLink {
                keyword: k.to_string(),
                relevance: 1.0,
            })
            .collect(),
    };
    store.replace_associations(ann.id, &assoc).unwrap();
}

fn setup() -> (Arc<MemoryStore>, TrendAggregator) {
    let store = Arc::new(MemoryStore::new());
    let agg = TrendAggregator::new(store.clone(), TrendSettings::default());
    (store, agg)
}

#[test]
fn three_articles_one_day_counts_and_mean() {
    let (store, agg) = setup();
    let day = d(2024, 4, 2);
    seed(store.as_ref(), "up", day, 0.5, Some(Category::Business), &[]);
    seed(store.as_ref(), "down", day, -0.5, Some(Category::Business), &[]);
    seed(store.as_ref(), "flat", day, 0.05, Some(Category::Business), &[]);

    let req = TrendRequest::new(M, PeriodType::Daily, day, day);
    let records: Vec<_> = agg.stream(&req).unwrap().collect::<Result<_, _>>().unwrap();

    let overall = records
        .iter()
        .find(|r| r.dimension == Dimension::Overall)
        .expect("overall record");
    assert_eq!(overall.article_count, 3);
    assert_eq!(overall.positive_count, 1);
    assert_eq!(overall.negative_count, 1);
    assert_eq!(overall.neutral_count, 1);
    assert!((overall.avg_polarity - 0.05 / 3.0).abs() < 1e-9);
    assert_eq!(overall.period_start, day);
    assert_eq!(overall.period_end, d(2024, 4, 3));
    assert_eq!(overall.dominant_emotion, Emotion::Joy);

    let business = records
        .iter()
        .find(|r| r.dimension == Dimension::Category(Category::Business))
        .expect("category record");
    assert_eq!(business.article_count, 3);

    // stream alone writes nothing
    assert!(store.trends(&TrendQuery::default()).unwrap().is_empty());
}

#[test]
fn dominant_emotion_ties_follow_enum_order() {
    let (store, agg) = setup();
    let day = d(2024, 4, 9);
    // fear first so insertion order cannot explain the result
    seed_feeling(store.as_ref(), "scare", day, -0.3, Emotion::Fear, Some(Category::Health), &[]);
    seed_feeling(store.as_ref(), "cure", day, 0.6, Emotion::Joy, Some(Category::Health), &[]);
    seed_feeling(store.as_ref(), "loss", day, -0.2, Emotion::Sadness, Some(Category::Business), &[]);
    seed_feeling(store.as_ref(), "panic", day, -0.7, Emotion::Fear, Some(Category::Business), &[]);

    let req = TrendRequest::new(M, PeriodType::Daily, day, day);
    let records: Vec<_> = agg.stream(&req).unwrap().collect::<Result<_, _>>().unwrap();
    let emotion_of = |dim: Dimension| {
        records
            .iter()
            .find(|r| r.dimension == dim)
            .map(|r| r.dominant_emotion)
            .expect("record")
    };
    assert_eq!(emotion_of(Dimension::Category(Category::Health)), Emotion::Joy);
    assert_eq!(emotion_of(Dimension::Category(Category::Business)), Emotion::Sadness);
    // overall: fear 2, joy 1, sadness 1
    assert_eq!(emotion_of(Dimension::Overall), Emotion::Fear);
}

#[test]
fn invalid_range_writes_nothing() {
    let (store, agg) = setup();
    seed(store.as_ref(), "a", d(2024, 4, 1), 0.3, None, &[]);

    let req = TrendRequest::new(M, PeriodType::Daily, d(2024, 4, 5), d(2024, 4, 1));
    let err = agg.recompute(&req).unwrap_err();
    assert!(matches!(err, TrendError::InvalidRange { .. }));
    assert!(store.trends(&TrendQuery::default()).unwrap().is_empty());
}

#[test]
fn unknown_keyword_filter_writes_nothing() {
    let (store, agg) = setup();
    seed(store.as_ref(), "a", d(2024, 4, 1), 0.3, None, &["tariffs"]);

    let req = TrendRequest::new(M, PeriodType::Daily, d(2024, 4, 1), d(2024, 4, 1))
        .with_filter(DimensionFilter::Keyword("quantum".into()));
    let err = agg.recompute(&req).unwrap_err();
    assert!(matches!(err, TrendError::UnknownDimension { kind: "keyword", .. }));
    assert!(store.trends(&TrendQuery::default()).unwrap().is_empty());
}

#[test]
fn buckets_partition_the_window() {
    let (store, agg) = setup();
    let mut rng = StdRng::seed_from_u64(7);
    let start = d(2024, 1, 1);
    let cats = [Category::Business, Category::Health, Category::Politics];
    let n = 120;
    for i in 0..n {
        let offset = rng.random_range(0..90u64);
        let day = start + chrono::Days::new(offset);
        let pol: f64 = rng.random_range(-1.0..=1.0);
        let cat = cats[rng.random_range(0..cats.len())];
        seed(store.as_ref(), &format!("story {i}"), day, pol, Some(cat), &[]);
    }
    let until = start + chrono::Days::new(89);

    for pt in [PeriodType::Daily, PeriodType::Weekly, PeriodType::Monthly] {
        let req = TrendRequest::new(M, pt, start, until);
        let recs: Vec<_> = agg.stream(&req).unwrap().collect::<Result<_, _>>().unwrap();

        let overall_total: u64 = recs
            .iter()
            .filter(|r| r.dimension == Dimension::Overall)
            .map(|r| r.article_count)
            .sum();
        assert_eq!(overall_total, n as u64, "{pt}");

        let cat_total: u64 = recs
            .iter()
            .filter(|r| matches!(r.dimension, Dimension::Category(_)))
            .map(|r| r.article_count)
            .sum();
        assert_eq!(cat_total, n as u64, "{pt}");

        for r in &recs {
            assert_eq!(r.positive_count + r.negative_count + r.neutral_count, r.article_count);
            assert!(r.article_count > 0);
            assert!((-1.0..=1.0).contains(&r.avg_polarity));
        }
        // chronological, no overlapping buckets for one dimension
        let overall: Vec<_> = recs.iter().filter(|r| r.dimension == Dimension::Overall).collect();
        for w in overall.windows(2) {
            assert!(w[0].period_end <= w[1].period_start, "{pt}");
        }
    }
}

#[test]
fn recompute_replaces_stale_records() {
    let (store, agg) = setup();
    let day = d(2024, 5, 6);
    seed(store.as_ref(), "a", day, 0.4, Some(Category::Health), &[]);
    seed(store.as_ref(), "b", day, 0.2, Some(Category::Health), &[]);
    let req = TrendRequest::new(M, PeriodType::Weekly, day, day);

    let first = agg.recompute(&req).unwrap();
    assert_eq!(first.written, 2); // overall + Health
    let again = agg.recompute(&req).unwrap();
    assert_eq!(again.written, first.written);

    // re-categorize both stories; Health must vanish from the window
    for title in ["a", "b"] {
        seed(store.as_ref(), title, day, 0.4, Some(Category::Sports), &[]);
    }
    agg.recompute(&req).unwrap();
    let stored = store
        .trends(&TrendQuery {
            kind: Some("category".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].dimension, Dimension::Category(Category::Sports));
    assert_eq!(stored[0].period_start, d(2024, 5, 6));
}

#[test]
fn keyword_minimum_applies_to_unfiltered_sweeps_only() {
    let (store, agg) = setup();
    let day = d(2024, 6, 3);
    seed(store.as_ref(), "a", day, 0.1, None, &["tariffs", "steel"]);
    seed(store.as_ref(), "b", day, 0.1, None, &["tariffs"]);

    let all: Vec<_> = agg
        .stream(&TrendRequest::new(M, PeriodType::Daily, day, day))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let kws: Vec<_> = all
        .iter()
        .filter_map(|r| match &r.dimension {
            Dimension::Keyword(k) => Some(k.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(kws, vec!["tariffs"]);

    let steel: Vec<_> = agg
        .stream(&TrendRequest::new(M, PeriodType::Daily, day, day).with_filter(DimensionFilter::Keyword("Steel".into())))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(steel.len(), 1);
    assert_eq!(steel[0].article_count, 1);
}

#[test]
fn keyword_in_one_period_has_no_momentum() {
    let (store, agg) = setup();
    seed(store.as_ref(), "a", d(2024, 7, 1), 0.1, None, &["drought"]);
    seed(store.as_ref(), "b", d(2024, 7, 1), 0.1, None, &["drought"]);
    agg.recompute(&TrendRequest::new(M, PeriodType::Daily, d(2024, 7, 1), d(2024, 7, 2)))
        .unwrap();

    let m = agg
        .momentum(
            M,
            PeriodType::Daily,
            Some(&DimensionFilter::Keyword("drought".into())),
            MomentumMetric::ArticleCount,
        )
        .unwrap();
    assert_eq!(m, Momentum::InsufficientData);
    assert_eq!(m.delta(), None);
}

#[test]
fn keyword_momentum_reads_predecessor_below_sweep_minimum() {
    let (store, agg) = setup();
    seed(store.as_ref(), "w0", d(2024, 7, 8), 0.1, None, &["wildfire"]);
    for i in 0..3 {
        seed(store.as_ref(), &format!("w{}", i + 1), d(2024, 7, 9), -0.3, None, &["wildfire"]);
    }
    agg.recompute(&TrendRequest::new(M, PeriodType::Daily, d(2024, 7, 8), d(2024, 7, 9)))
        .unwrap();

    // the one-article day is below the sweep minimum and was not stored
    let stored = store
        .trends(&TrendQuery {
            kind: Some("keyword".into()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(stored.len(), 1);

    let m = agg
        .momentum(
            M,
            PeriodType::Daily,
            Some(&DimensionFilter::Keyword("wildfire".into())),
            MomentumMetric::ArticleCount,
        )
        .unwrap();
    match m {
        Momentum::Change {
            direction,
            delta,
            previous,
            ..
        } => {
            assert_eq!(direction, Direction::Rising);
            assert_eq!(previous, 1.0);
            assert_eq!(delta, 2.0);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn momentum_and_trending_over_stored_days() {
    let (store, agg) = setup();
    seed(store.as_ref(), "a1", d(2024, 8, 1), 0.1, Some(Category::Science), &[]);
    for i in 0..3 {
        seed(store.as_ref(), &format!("b{i}"), d(2024, 8, 2), 0.1, Some(Category::Science), &[]);
    }
    seed(store.as_ref(), "c1", d(2024, 8, 1), 0.1, Some(Category::Travel), &[]);
    seed(store.as_ref(), "c2", d(2024, 8, 1), 0.1, Some(Category::Travel), &[]);
    seed(store.as_ref(), "c3", d(2024, 8, 2), 0.1, Some(Category::Travel), &[]);
    agg.recompute(&TrendRequest::new(M, PeriodType::Daily, d(2024, 8, 1), d(2024, 8, 2)))
        .unwrap();

    match agg
        .momentum(
            M,
            PeriodType::Daily,
            Some(&DimensionFilter::Category("science".into())),
            MomentumMetric::ArticleCount,
        )
        .unwrap()
    {
        Momentum::Change {
            direction, delta, ..
        } => {
            assert_eq!(direction, Direction::Rising);
            assert_eq!(delta, 2.0);
        }
        other => panic!("unexpected {other:?}"),
    }

    let rising = agg
        .trending(M, PeriodType::Daily, "category", MomentumMetric::ArticleCount, 5)
        .unwrap();
    assert_eq!(rising.len(), 1);
    assert_eq!(rising[0].dimension, Dimension::Category(Category::Science));
}
