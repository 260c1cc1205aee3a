// tests/config_env.rs
//
// Engine config loading through ENGINE_CONFIG_PATH and the generator
// factory's mock switch. Env-mutating, so serialized.

use std::fs;

use serial_test::serial;

use news_trend_analyzer::annotate::build_generator;
use news_trend_analyzer::config::{ai::GenerativeConfig, EngineConfig, ENV_ENGINE_CONFIG_PATH};
use news_trend_analyzer::model::PeriodType;

#[test]
#[serial]
fn load_reads_file_then_env() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("engine.toml");
    fs::write(
        &p,
        r#"
db_path = "trends.db"
default_period = "weekly"
keyword_min_articles = 3
"#,
    )
    .unwrap();

    std::env::set_var(ENV_ENGINE_CONFIG_PATH, &p);
    std::env::set_var("DB_PATH", "/tmp/override.db");
    let cfg = EngineConfig::load();
    std::env::remove_var(ENV_ENGINE_CONFIG_PATH);
    std::env::remove_var("DB_PATH");

    let cfg = cfg.expect("config loads");
    assert_eq!(cfg.default_period, PeriodType::Weekly);
    assert_eq!(cfg.keyword_min_articles, 3);
    assert_eq!(cfg.db_path.to_str(), Some("/tmp/override.db"));
    assert!((cfg.min_category_confidence - 0.3).abs() < 1e-12);
}

#[test]
#[serial]
fn missing_config_path_is_an_error() {
    std::env::set_var(ENV_ENGINE_CONFIG_PATH, "/definitely/not/here.toml");
    let res = EngineConfig::load();
    std::env::remove_var(ENV_ENGINE_CONFIG_PATH);
    assert!(res.is_err());
}

#[test]
#[serial]
fn inverted_thresholds_from_env_fail_validation() {
    std::env::set_var("SENTIMENT_POSITIVE_THRESHOLD", "-0.5");
    let res = EngineConfig::load();
    std::env::remove_var("SENTIMENT_POSITIVE_THRESHOLD");
    let err = res.unwrap_err().to_string();
    assert!(err.contains("validation failed"), "{err}");
}

#[test]
#[serial]
fn disabled_generator_errors_unless_mock_mode() {
    let cfg = GenerativeConfig::default();
    assert!(!cfg.enabled);
    assert!(build_generator(&cfg).is_err());

    std::env::set_var("AI_TEST_MODE", "mock");
    let gen = build_generator(&GenerativeConfig {
        cache_dir: None,
        ..GenerativeConfig::default()
    });
    std::env::remove_var("AI_TEST_MODE");
    assert_eq!(gen.expect("mock generator").name(), "mock");
}
