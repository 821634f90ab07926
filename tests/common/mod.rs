// 集成测试公共模块
//
// 提供语料库夹具、桩翻译后端和控制器构建工具

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;

use hadith_translator::translation::{
    CheckpointStore, ClientOptions, EchoPolicy, FileCheckpointStore, JobController,
    RedbCheckpointStore, RetryPolicy, ServiceReply, ServiceRequest, StopSignal,
    TranslationBackend, TranslationClient, TranslationError, TranslationResult, TranslatorConfig,
    UnitExtractor,
};

/// 磁盘上的测试语料库
pub struct CorpusFixture {
    dir: TempDir,
}

impl CorpusFixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(dir.path().join("books")).expect("create books dir");
        Self { dir }
    }

    /// 两本书：alpha 有一个章节三条记录，beta 没有章节（all.json 两条记录）
    pub fn standard() -> Self {
        let fixture = Self::new();
        fixture.add_group(
            "alpha",
            1,
            &[(
                "1.json",
                vec![
                    json!({"id": 1, "english": {"narrator": "Narrated Umar:", "text": "actions are by intentions"}}),
                    json!({"id": 2, "english": {"text": "the religion is sincerity"}}),
                    json!({"id": 3, "english": {"narrator": "Narrated Aisha:", "text": "be moderate"}}),
                ],
            )],
        );
        fixture.add_flat_group(
            "beta",
            2,
            vec![
                json!({"id": 1, "english": {"text": "smile is charity"}}),
                json!({"id": 2, "english": {"text": "the strong one controls anger"}}),
            ],
        );
        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn books_dir(&self) -> PathBuf {
        self.dir.path().join("books")
    }

    pub fn add_group(&self, id: &str, numeric_id: i64, sections: &[(&str, Vec<serde_json::Value>)]) {
        let group_dir = self.books_dir().join(id);
        std::fs::create_dir_all(&group_dir).expect("create group dir");

        let chapters: Vec<_> = sections.iter().map(|(file, _)| json!({"file": file})).collect();
        write_json(
            &group_dir.join("metadata.json"),
            &json!({"id": id, "numericId": numeric_id, "english": {"title": id}, "chapters": chapters}),
        );

        for (file, hadiths) in sections {
            write_json(&group_dir.join(file), &json!({ "hadiths": hadiths }));
        }
    }

    pub fn add_flat_group(&self, id: &str, numeric_id: i64, hadiths: Vec<serde_json::Value>) {
        let group_dir = self.books_dir().join(id);
        std::fs::create_dir_all(&group_dir).expect("create group dir");
        write_json(
            &group_dir.join("metadata.json"),
            &json!({"id": id, "numericId": numeric_id}),
        );
        write_json(&group_dir.join("all.json"), &json!({ "hadiths": hadiths }));
    }

    /// 指向夹具目录、无延迟的配置
    pub fn config(&self) -> TranslatorConfig {
        TranslatorConfig {
            books_path: PathBuf::from("books"),
            batch_delay_ms: 0,
            retry_backoff_secs: 1,
            max_retries: 3,
            api_key: Some("sk-test".to_string()),
            ..TranslatorConfig::with_data_dir(self.dir.path())
        }
    }

    pub fn file_store(&self) -> Arc<dyn CheckpointStore> {
        let config = self.config();
        Arc::new(
            FileCheckpointStore::new(config.checkpoints_dir(), config.output_dir())
                .expect("open file store"),
        )
    }

    pub fn redb_store(&self) -> Arc<dyn CheckpointStore> {
        Arc::new(RedbCheckpointStore::open(self.config().database_path()).expect("open redb store"))
    }
}

pub fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_string_pretty(value).expect("serialize"))
        .expect("write json");
}

/// 桩后端的行为
#[derive(Debug, Clone)]
pub enum StubMode {
    /// 返回大写的输入
    Uppercase,
    /// 返回 "T:" + 输入
    Prefix,
    /// 原样返回输入
    Echo,
    /// 只返回前 n 行
    Partial(usize),
    /// 前 n 次调用返回速率限制，之后大写
    RateLimitedThenOk(usize),
    /// 每次都返回给定错误
    AlwaysFails(TranslationError),
    /// 第一次调用返回给定错误，之后大写
    FailFirst(TranslationError),
    /// 永远不返回
    Hang,
}

/// 可计数、可编排的桩翻译后端
pub struct StubBackend {
    mode: StubMode,
    calls: AtomicUsize,
    call_delays: Vec<Duration>,
    gate: Option<Arc<Notify>>,
    stop_after: Mutex<Option<(usize, StopSignal)>>,
    requests: Mutex<Vec<Vec<String>>>,
}

impl StubBackend {
    pub fn new(mode: StubMode) -> Self {
        Self {
            mode,
            calls: AtomicUsize::new(0),
            call_delays: Vec::new(),
            gate: None,
            stop_after: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn uppercase() -> Arc<Self> {
        Arc::new(Self::new(StubMode::Uppercase))
    }

    /// 第 n 次调用（从 0 开始）先等待 `delays[n]`
    pub fn with_call_delays(mut self, delays: Vec<Duration>) -> Self {
        self.call_delays = delays;
        self
    }

    /// 每次调用都等待闸门放行
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 第 `calls` 次调用返回前发出停止信号
    pub fn with_stop_after(self, calls: usize, stop: StopSignal) -> Self {
        *self.stop_after.lock().expect("lock") = Some((calls, stop));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requested_texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("lock")
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    fn numbered(texts: &[String], f: impl Fn(&str) -> String) -> String {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| format!("[{}] {}", i + 1, f(text)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn respond(&self, call: usize, texts: &[String]) -> TranslationResult<ServiceReply> {
        let uppercase = |t: &str| t.to_uppercase();
        match &self.mode {
            StubMode::Uppercase => Ok(ServiceReply::new(Self::numbered(texts, uppercase)).with_tokens(7)),
            StubMode::Prefix => Ok(ServiceReply::new(Self::numbered(texts, |t| format!("T:{}", t)))),
            StubMode::Echo => Ok(ServiceReply::new(Self::numbered(texts, |t| t.to_string()))),
            StubMode::Partial(n) => {
                let head: Vec<String> = texts.iter().take(*n).cloned().collect();
                Ok(ServiceReply::new(Self::numbered(&head, uppercase)))
            }
            StubMode::RateLimitedThenOk(failures) if call < *failures => {
                Err(TranslationError::RateLimitExceeded)
            }
            StubMode::RateLimitedThenOk(_) => Ok(ServiceReply::new(Self::numbered(texts, uppercase))),
            StubMode::AlwaysFails(error) => Err(error.clone()),
            StubMode::FailFirst(error) if call == 0 => Err(error.clone()),
            StubMode::FailFirst(_) => Ok(ServiceReply::new(Self::numbered(texts, uppercase))),
            StubMode::Hang => Err(TranslationError::InternalError("unreachable".to_string())),
        }
    }
}

impl TranslationBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn complete(&self, request: ServiceRequest) -> BoxFuture<'_, TranslationResult<ServiceReply>> {
        async move {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().expect("lock").push(request.texts.clone());

            if let Some(delay) = self.call_delays.get(call) {
                tokio::time::sleep(*delay).await;
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if matches!(self.mode, StubMode::Hang) {
                futures::future::pending::<()>().await;
            }

            if let Some((after, stop)) = self.stop_after.lock().expect("lock").as_ref() {
                if call + 1 >= *after {
                    stop.request_stop();
                }
            }

            self.respond(call, &request.texts)
        }
        .boxed()
    }
}

/// 测试用客户端参数：无批次间延迟
pub fn fast_options(batch_size: usize, max_parallel: usize) -> ClientOptions {
    ClientOptions {
        batch_size,
        max_parallel,
        batch_delay: Duration::ZERO,
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy::new(3, Duration::from_secs(30)),
    }
}

pub fn stub_client(backend: Arc<StubBackend>) -> TranslationClient {
    TranslationClient::new(backend, fast_options(15, 3))
}

pub fn controller(
    fixture: &CorpusFixture,
    backend: Arc<StubBackend>,
    store: Arc<dyn CheckpointStore>,
) -> JobController {
    controller_with_policy(fixture, backend, store, EchoPolicy::FallbackOnly)
}

pub fn controller_with_policy(
    fixture: &CorpusFixture,
    backend: Arc<StubBackend>,
    store: Arc<dyn CheckpointStore>,
    policy: EchoPolicy,
) -> JobController {
    JobController::new(
        UnitExtractor::new(fixture.books_dir()),
        stub_client(backend),
        store,
        policy,
    )
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
