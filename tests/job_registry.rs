//! 任务注册表集成测试

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use std::sync::Arc;

use common::{controller, CorpusFixture, StubBackend, StubMode};
use hadith_translator::translation::{JobRegistry, JobState, TranslationError};
use tokio::sync::Notify;

async fn wait_for_first_call(backend: &StubBackend) {
    while backend.calls() == 0 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_registry_runs_job_to_completion() {
    let fixture = CorpusFixture::standard();
    let registry = JobRegistry::new(Arc::new(controller(
        &fixture,
        StubBackend::uppercase(),
        fixture.file_store(),
    )));

    assert!(registry.status("turkish").unwrap().is_none(), "未启动的语言没有状态");

    let outcome = registry.start("turkish").unwrap().await.unwrap();
    assert_eq!(outcome.state, JobState::Completed);
    assert!(!registry.is_running("turkish"));

    let status = registry.status("tr").unwrap().expect("status after run");
    assert!(!status.running);
    assert_eq!(status.progress.state, JobState::Completed);
    assert_eq!(status.outcome.map(|o| o.translated_this_run), Some(5));

    let statuses = registry.statuses().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].language, "turkish");

    println!("✅ Registry completion test passed");
}

#[tokio::test]
async fn test_only_one_job_per_language() {
    let fixture = CorpusFixture::standard();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(StubBackend::new(StubMode::Uppercase).with_gate(gate.clone()));
    let registry = JobRegistry::new(Arc::new(controller(&fixture, backend.clone(), fixture.file_store())));

    let handle = registry.start("french").unwrap();
    assert!(registry.is_running("french"));

    let err = registry.start("french").unwrap_err();
    assert!(matches!(err, TranslationError::ConcurrencyError(_)), "重复启动应被拒绝");

    let err = registry.reset("french").unwrap_err();
    assert!(matches!(err, TranslationError::ConcurrencyError(_)), "运行中不能重置");

    wait_for_first_call(&backend).await;
    assert_eq!(registry.stop().unwrap(), 1);
    gate.notify_one();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.state, JobState::Stopped);
    assert_eq!(backend.calls(), 1, "进行中的章节完成后才停止");
    assert_eq!(registry.export("french").unwrap()["alpha"].len(), 3);

    // 结束后可以重置并重新启动
    registry.reset("french").unwrap();
    assert!(registry.export("french").unwrap().is_empty());
    assert!(registry.status("french").unwrap().is_none());

    println!("✅ Single job per language test passed");
}

#[tokio::test]
async fn test_stop_language_targets_one_job() {
    let fixture = CorpusFixture::standard();
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(StubBackend::new(StubMode::Uppercase).with_gate(gate.clone()));
    let registry = JobRegistry::new(Arc::new(controller(&fixture, backend.clone(), fixture.redb_store())));

    assert!(!registry.stop_language("german").unwrap(), "没有运行中的任务");

    let handle = registry.start("german").unwrap();
    wait_for_first_call(&backend).await;
    assert!(registry.stop_language("de").unwrap());
    gate.notify_one();

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.state, JobState::Stopped);
    assert_eq!(outcome.last_group.as_deref(), Some("alpha"));

    println!("✅ Stop language test passed");
}

#[tokio::test]
async fn test_unknown_language_is_rejected() {
    let fixture = CorpusFixture::standard();
    let registry = JobRegistry::new(Arc::new(controller(
        &fixture,
        StubBackend::uppercase(),
        fixture.file_store(),
    )));

    for result in [
        registry.start("klingon").map(|_| ()),
        registry.reset("klingon"),
        registry.export("klingon").map(|_| ()),
    ] {
        assert!(matches!(result, Err(TranslationError::ConfigError(_))));
    }

    println!("✅ Unknown language test passed");
}

#[tokio::test]
async fn test_languages_report_translated_counts() {
    let fixture = CorpusFixture::standard();
    let registry = JobRegistry::new(Arc::new(controller(
        &fixture,
        StubBackend::uppercase(),
        fixture.redb_store(),
    )));

    registry.start("russian").unwrap().await.unwrap();

    let languages = registry.languages().unwrap();
    assert_eq!(languages.len(), 8);
    for summary in &languages {
        let expected = if summary.id == "russian" { 5 } else { 0 };
        assert_eq!(summary.translated, expected, "{} 的译文数量", summary.id);
        assert!(!summary.running);
    }

    println!("✅ Language summary test passed");
}
