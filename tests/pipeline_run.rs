// tests/pipeline_run.rs
//
// Batch runs end to end on the in-memory store, with the lexicon annotator
// and with mock generators (slow, unavailable, garbage).

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};

use news_trend_analyzer::annotate::{
    Annotator, GenerateOptions, GenerativeAnnotator, HeuristicAnnotator, MockGenerator,
};
use news_trend_analyzer::model::{AnalysisMethod, Article, Dimension, PeriodType};
use news_trend_analyzer::store::{ArticleStore, MemoryStore, TrendQuery};
use news_trend_analyzer::taxonomy::Category;
use news_trend_analyzer::vocab::Categorizer;
use news_trend_analyzer::{BatchRunner, EngineConfig, TrendRequest};

const GOOD_REPLY: &str = r#"```json
{
  "sentiment": {"polarity": 0.6, "subjectivity": 0.4, "emotion": "joy", "confidence": 0.9},
  "categorization": {"primary_category": "Health", "category_confidence": 0.8,
                     "topics": ["Public Health"], "topic_confidence": 0.7},
  "keywords": {"primary_keywords": ["Vaccine rollout", "clinics"], "entities": ["WHO"]},
  "summary": "Vaccination expands."
}
```"#;

fn articles() -> Vec<Article> {
    let at = Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap();
    vec![
        Article::new("Markets rally as inflation cools")
            .with_link("https://news.test/rally")
            .with_content("Stocks surged to record highs and investors cheered strong earnings.")
            .published(at),
        Article::new("Flood damage leaves towns devastated")
            .with_link("https://news.test/flood")
            .with_content("Residents mourn losses after the terrible storm destroyed homes.")
            .published(at),
        Article::new("Council meets on Tuesday").published(at),
    ]
}

fn runner(store: Arc<MemoryStore>, annotator: Arc<dyn Annotator>) -> BatchRunner {
    BatchRunner::new(store, annotator, &EngineConfig::default())
}

#[tokio::test]
async fn heuristic_run_annotates_everything_and_writes_trends() {
    let store = Arc::new(MemoryStore::new());
    let r = runner(store.clone(), Arc::new(HeuristicAnnotator::default()));
    r.ingest(&articles()).unwrap();

    let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
    let report = r
        .run(&[TrendRequest::new(AnalysisMethod::Heuristic, PeriodType::Daily, day, day)])
        .await
        .unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed, 0);
    assert!(report.trend_errors.is_empty());
    assert!(report.trend_records_written >= 1);

    assert!(store.unanalyzed_articles(AnalysisMethod::Heuristic).unwrap().is_empty());
    let overall = store
        .trends(&TrendQuery {
            dimension: Some(Dimension::Overall),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(overall.len(), 1);
    assert_eq!(overall[0].article_count, 3);

    // second run has nothing left to do
    let again = r.annotate_pending().await.unwrap();
    assert_eq!(again.succeeded + again.skipped + again.failed, 0);
}

#[tokio::test]
async fn generative_reply_is_categorized_and_stored() {
    let store = Arc::new(MemoryStore::new());
    let gen = Arc::new(MockGenerator::new(GOOD_REPLY));
    let ann = GenerativeAnnotator::new(gen.clone(), GenerateOptions::default());
    let r = runner(store.clone(), Arc::new(ann));
    r.ingest(&articles()[..1]).unwrap();

    let report = r.annotate_pending().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(gen.calls(), 1);

    let key = articles()[0].key();
    let stored = store.annotation(&key, AnalysisMethod::Generative).unwrap().unwrap();
    assert!((stored.polarity - 0.6).abs() < 1e-9);
    assert_eq!(stored.summary.as_deref(), Some("Vaccination expands."));

    let assoc = store.associations(stored.id).unwrap();
    assert_eq!(assoc.primary_category(), Some(Category::Health));
    let kws: Vec<_> = assoc.keywords.iter().map(|k| k.keyword.as_str()).collect();
    assert!(kws.contains(&"vaccine rollout"));
    assert!(kws.contains(&"who"));
}

#[tokio::test]
async fn slow_generator_is_skipped_and_retried_next_run() {
    let store = Arc::new(MemoryStore::new());
    let slow = Arc::new(MockGenerator::new(GOOD_REPLY).with_delay(Duration::from_millis(300)));
    let r = runner(
        store.clone(),
        Arc::new(GenerativeAnnotator::new(slow, GenerateOptions::default())),
    )
    .with_timeout(Duration::from_millis(20));
    r.ingest(&articles()[..1]).unwrap();

    let report = r.annotate_pending().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 0);

    let pending = store.failures(Some(AnalysisMethod::Generative)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].kind, "unavailable");
    assert_eq!(store.unanalyzed_articles(AnalysisMethod::Generative).unwrap().len(), 1);

    // a healthy generator picks it up and clears the failure
    let fast = Arc::new(MockGenerator::new(GOOD_REPLY));
    let r2 = runner(
        store.clone(),
        Arc::new(GenerativeAnnotator::new(fast, GenerateOptions::default())),
    );
    let report = r2.annotate_pending().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert!(store.failures(None).unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_and_garbage_replies_do_not_abort_the_batch() {
    let store = Arc::new(MemoryStore::new());
    let r = runner(
        store.clone(),
        Arc::new(GenerativeAnnotator::new(
            Arc::new(MockGenerator::unavailable("connection refused")),
            GenerateOptions::default(),
        )),
    );
    r.ingest(&articles()).unwrap();
    let report = r.annotate_pending().await.unwrap();
    assert_eq!(report.skipped, 3);

    let r = runner(
        store.clone(),
        Arc::new(GenerativeAnnotator::new(
            Arc::new(MockGenerator::new("I cannot help with that.")),
            GenerateOptions::default(),
        )),
    );
    let report = r.annotate_pending().await.unwrap();
    assert_eq!(report.failed, 3);
    let kinds: Vec<_> = store
        .failures(Some(AnalysisMethod::Generative))
        .unwrap()
        .into_iter()
        .map(|f| f.kind)
        .collect();
    assert_eq!(kinds, vec!["malformed"; 3]);
}

#[tokio::test]
async fn blank_article_fails_as_empty_input() {
    let store = Arc::new(MemoryStore::new());
    let r = runner(store.clone(), Arc::new(HeuristicAnnotator::default()));
    r.ingest(&[Article::new("<p> &nbsp; </p>").with_link("https://news.test/blank")])
        .unwrap();
    let report = r.annotate_pending().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(store.failures(None).unwrap()[0].kind, "empty_input");
}

#[tokio::test]
async fn keyword_frequency_counts_articles_not_reruns() {
    let store = Arc::new(MemoryStore::new());
    let heuristic = HeuristicAnnotator::default();
    let categorizer = Categorizer::default();

    let n = 4;
    let mut ids = Vec::new();
    for i in 0..n {
        let a = Article::new(format!("Drought grips farms, report {i}"))
            .with_content("The drought worsens as farms struggle with drought losses.");
        let key = store.upsert_article(&a).unwrap();
        let analysis = heuristic.analyze(&a.text()).await.unwrap();
        let ann = store
            .upsert_annotation(&key, AnalysisMethod::Heuristic, &analysis, Utc::now())
            .unwrap();
        ids.push((ann.id, analysis));
    }

    // categorize each annotation several times; output must not change
    for (id, analysis) in &ids {
        let first = categorizer.categorize(&analysis.suggestions);
        for _ in 0..3 {
            let again = categorizer.categorize(&analysis.suggestions);
            assert_eq!(first, again);
            store.replace_associations(*id, &again).unwrap();
        }
        assert_eq!(store.associations(*id).unwrap(), first);
    }

    let drought = store.keyword("drought").unwrap().expect("keyword stored");
    assert_eq!(drought.frequency, n as u64);
}
