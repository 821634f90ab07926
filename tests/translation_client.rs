//! 翻译客户端集成测试
//!
//! 验证批次切分、顺序保持、部分响应对齐、重试与回退

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use std::sync::Arc;
use std::time::Duration;

use common::{fast_options, strings, StubBackend, StubMode};
use hadith_translator::translation::{
    require_language, ClientOptions, TranslationClient, TranslationError,
};

fn numbered_texts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("text {}", i)).collect()
}

#[tokio::test]
async fn test_order_preserved_across_batches() {
    let backend = Arc::new(StubBackend::new(StubMode::Prefix));
    let client = TranslationClient::new(backend.clone(), fast_options(5, 3));
    let language = require_language("turkish").unwrap();

    let texts = numbered_texts(37);
    let output = client.translate(&texts, language).await;

    assert_eq!(output.len(), texts.len(), "输出长度应与输入一致");
    for (source, translated) in texts.iter().zip(output.iter()) {
        assert_eq!(translated, &format!("T:{}", source));
    }
    assert_eq!(backend.calls(), 8, "37 条文本、批次大小 5 应发出 8 个请求");

    println!("✅ Order preservation test passed");
}

#[tokio::test(start_paused = true)]
async fn test_order_preserved_when_batches_finish_out_of_order() {
    // 先发出的批次最后完成
    let backend = Arc::new(StubBackend::new(StubMode::Prefix).with_call_delays(vec![
        Duration::from_millis(300),
        Duration::from_millis(200),
        Duration::from_millis(100),
    ]));
    let client = TranslationClient::new(backend.clone(), fast_options(2, 3));
    let language = require_language("french").unwrap();

    let texts = numbered_texts(6);
    let output = client.translate(&texts, language).await;

    let expected: Vec<String> = texts.iter().map(|t| format!("T:{}", t)).collect();
    assert_eq!(output, expected);

    println!("✅ Out-of-order completion test passed");
}

#[tokio::test]
async fn test_partial_response_is_padded_with_sources() {
    let backend = Arc::new(StubBackend::new(StubMode::Partial(1)));
    let client = TranslationClient::new(backend, fast_options(15, 3));
    let language = require_language("german").unwrap();

    let texts = strings(&["first", "second", "third"]);
    let output = client.translate_detailed(&texts, language).await;

    assert_eq!(output.texts, strings(&["FIRST", "second", "third"]));
    assert_eq!(output.fallback, vec![false, true, true]);
    assert_eq!(output.fallback_count(), 2);

    println!("✅ Partial response alignment test passed");
}

#[tokio::test(start_paused = true)]
async fn test_rate_limited_batch_is_retried() {
    let backend = Arc::new(StubBackend::new(StubMode::RateLimitedThenOk(2)));
    let client = TranslationClient::new(backend.clone(), fast_options(15, 3));
    let language = require_language("spanish").unwrap();

    let started = tokio::time::Instant::now();
    let output = client
        .translate_detailed(&strings(&["hello", "world"]), language)
        .await;

    assert_eq!(output.texts, strings(&["HELLO", "WORLD"]));
    assert_eq!(output.fallback_count(), 0);
    assert_eq!(output.api_calls, 3, "两次失败加一次成功");
    assert_eq!(backend.calls(), 3);
    assert!(
        started.elapsed() >= Duration::from_secs(60),
        "两次重试之间应各等待一个固定间隔"
    );

    println!("✅ Retry after rate limit test passed");
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fall_back_to_source() {
    let backend = Arc::new(StubBackend::new(StubMode::RateLimitedThenOk(10)));
    let client = TranslationClient::new(backend.clone(), fast_options(15, 3));
    let language = require_language("urdu").unwrap();

    let texts = strings(&["one", "two"]);
    let output = client.translate_detailed(&texts, language).await;

    assert_eq!(output.texts, texts, "重试耗尽后应回退为原文");
    assert_eq!(output.fallback, vec![true, true]);
    assert_eq!(backend.calls(), 3, "尝试次数不应超过上限");

    println!("✅ Retry exhaustion fallback test passed");
}

#[tokio::test]
async fn test_non_retryable_error_is_not_retried() {
    let backend = Arc::new(StubBackend::new(StubMode::AlwaysFails(
        TranslationError::TranslationServiceError("invalid request".to_string()),
    )));
    let client = TranslationClient::new(backend.clone(), fast_options(15, 3));
    let language = require_language("bengali").unwrap();

    let texts = strings(&["alpha"]);
    let output = client.translate_detailed(&texts, language).await;

    assert_eq!(output.texts, texts);
    assert_eq!(output.api_calls, 1);
    assert_eq!(backend.calls(), 1, "不可重试错误只应请求一次");

    println!("✅ Non-retryable error test passed");
}

#[tokio::test(start_paused = true)]
async fn test_hanging_request_times_out_and_falls_back() {
    let backend = Arc::new(StubBackend::new(StubMode::Hang));
    let client = TranslationClient::new(backend.clone(), fast_options(15, 3));
    let language = require_language("russian").unwrap();

    let texts = strings(&["slow"]);
    let output = client.translate_detailed(&texts, language).await;

    assert_eq!(output.texts, texts);
    assert_eq!(output.fallback, vec![true]);
    assert_eq!(backend.calls(), 3, "超时应按可重试错误处理");

    println!("✅ Request timeout test passed");
}

#[tokio::test]
async fn test_failed_batch_does_not_affect_other_batches() {
    let backend = Arc::new(StubBackend::new(StubMode::FailFirst(
        TranslationError::TranslationServiceError("bad batch".to_string()),
    )));
    // 单并发保证第一个请求属于第一个批次
    let client = TranslationClient::new(backend.clone(), fast_options(2, 1));
    let language = require_language("indonesian").unwrap();

    let texts = strings(&["a", "b", "c", "d"]);
    let output = client.translate_detailed(&texts, language).await;

    assert_eq!(output.texts, strings(&["a", "b", "C", "D"]));
    assert_eq!(output.fallback, vec![true, true, false, false]);
    assert_eq!(output.api_calls, 2);

    println!("✅ Batch isolation test passed");
}

#[tokio::test]
async fn test_empty_input_makes_no_requests() {
    let backend = StubBackend::uppercase();
    let client = TranslationClient::new(backend.clone(), fast_options(15, 3));
    let language = require_language("turkish").unwrap();

    let output = client.translate_detailed(&[], language).await;

    assert!(output.texts.is_empty());
    assert_eq!(output.api_calls, 0);
    assert_eq!(backend.calls(), 0);

    println!("✅ Empty input test passed");
}

#[tokio::test(start_paused = true)]
async fn test_batch_delay_only_between_batches() {
    let backend = StubBackend::uppercase();
    let options = ClientOptions {
        batch_delay: Duration::from_secs(10),
        ..fast_options(2, 1)
    };
    let client = TranslationClient::new(backend.clone(), options);
    let language = require_language("bengali").unwrap();

    // 单个批次不等待
    let started = tokio::time::Instant::now();
    client.translate(&numbered_texts(2), language).await;
    assert!(started.elapsed() < Duration::from_secs(10), "最后一个批次之后不应等待");

    // 三个批次之间等待两次
    let started = tokio::time::Instant::now();
    let output = client.translate(&numbered_texts(6), language).await;
    assert_eq!(output.len(), 6);
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert!(started.elapsed() < Duration::from_secs(30));
    assert_eq!(backend.calls(), 4);

    println!("✅ Batch delay test passed");
}
