//! 批量翻译任务控制器
//!
//! 单个语言任务的状态机：
//!
//! ```text
//! IDLE → STARTED → (TRANSLATING ⇄ CHECKPOINTING) → {COMPLETED | STOPPED | ERRORED}
//! ```
//!
//! 停止信号只在开始每本书、每个章节之前检查。进行中的请求不会被打断，
//! 已翻译的章节总是先持久化再检查停止信号。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crate::translation::config::{require_language, EchoPolicy, Language, TranslatorConfig};
use crate::translation::core::TranslationClient;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::{Corpus, Group, Section, UnitExtractor};
use crate::translation::storage::{open_store, Checkpoint, CheckpointStore};
use crate::translation::types::TranslatedRecord;

/// 协作式停止信号
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    #[default]
    Idle,
    Started,
    Translating,
    Checkpointing,
    Completed,
    Stopped,
    Errored,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Stopped | JobState::Errored)
    }
}

/// 终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    UserStop,
    Error,
}

/// 进度快照，最新值覆盖旧值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct ProgressSnapshot {
    pub language: String,
    pub state: JobState,
    pub current_group: Option<String>,
    pub current_section: Option<String>,
    pub total_translated: u64,
    pub total_units: usize,
    pub remaining: usize,
    pub api_calls: u64,
}

impl ProgressSnapshot {
    pub fn idle(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }
}

/// 任务结束时的状态记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobOutcome {
    pub language: String,
    pub state: JobState,
    pub reason: StopReason,
    /// 可读的结束说明
    pub message: String,
    pub last_group: Option<String>,
    pub last_section: Option<String>,
    /// 原始错误信息，仅用于展示
    pub error: Option<String>,
    pub total_translated: u64,
    pub api_calls: u64,
    pub tokens_used: u64,
    /// 本次运行新增的译文数
    pub translated_this_run: u64,
    pub api_calls_this_run: u64,
    pub finished_at: DateTime<Utc>,
}

/// 单次运行的可变上下文
struct RunContext<'a> {
    language: &'static Language,
    progress: &'a watch::Sender<ProgressSnapshot>,
    checkpoint: Checkpoint,
    last_group: Option<String>,
    last_section: Option<String>,
    total_units: usize,
    done_units: usize,
    translated_this_run: u64,
    api_calls_this_run: u64,
}

impl RunContext<'_> {
    fn emit(&self, state: JobState) {
        self.progress.send_replace(ProgressSnapshot {
            language: self.language.id.to_string(),
            state,
            current_group: self.last_group.clone(),
            current_section: self.last_section.clone(),
            total_translated: self.checkpoint.stats.total_translated,
            total_units: self.total_units,
            remaining: self.total_units.saturating_sub(self.done_units),
            api_calls: self.checkpoint.stats.api_calls,
        });
    }
}

/// 任务控制器
///
/// 同一个控制器可以服务多种语言，各语言的状态互不共享。
/// 同一语言同时只能有一个任务：进程内由 [`JobRegistry`](super::registry::JobRegistry)
/// 保证，跨进程由存储的语言锁保证。
pub struct JobController {
    extractor: UnitExtractor,
    client: TranslationClient,
    store: Arc<dyn CheckpointStore>,
    echo_policy: EchoPolicy,
}

impl JobController {
    pub fn new(
        extractor: UnitExtractor,
        client: TranslationClient,
        store: Arc<dyn CheckpointStore>,
        echo_policy: EchoPolicy,
    ) -> Self {
        Self {
            extractor,
            client,
            store,
            echo_policy,
        }
    }

    /// 根据配置组装控制器；缺少 API 密钥时返回配置错误
    pub fn from_config(config: &TranslatorConfig) -> TranslationResult<Self> {
        let client = TranslationClient::from_config(config)?;
        let store: Arc<dyn CheckpointStore> = Arc::from(open_store(config)?);
        Ok(Self::new(
            UnitExtractor::new(config.books_dir()),
            client,
            store,
            config.echo_policy,
        ))
    }

    pub fn store(&self) -> &Arc<dyn CheckpointStore> {
        &self.store
    }

    /// 运行一个语言任务直到结束
    ///
    /// 永远返回一个终止状态；致命错误记录在 `JobOutcome::error` 中。
    pub async fn run(
        &self,
        language: &str,
        stop: &StopSignal,
        progress: &watch::Sender<ProgressSnapshot>,
    ) -> JobOutcome {
        let language_info = match require_language(language) {
            Ok(info) => info,
            Err(e) => {
                helpers::log_error(&e);
                let outcome = Self::error_outcome(language, None, None, &Checkpoint::new(language), 0, 0, &e);
                progress.send_replace(ProgressSnapshot {
                    language: language.to_string(),
                    state: JobState::Errored,
                    ..ProgressSnapshot::default()
                });
                return outcome;
            }
        };

        tracing::info!("开始翻译任务: {} ({})", language_info.name, self.store.backend_name());

        let mut ctx = RunContext {
            language: language_info,
            progress,
            checkpoint: Checkpoint::new(language_info.id),
            last_group: None,
            last_section: None,
            total_units: 0,
            done_units: 0,
            translated_this_run: 0,
            api_calls_this_run: 0,
        };

        let result = self.execute(&mut ctx, stop).await;

        let outcome = match result {
            Ok(JobState::Stopped) => {
                tracing::info!(
                    "翻译任务已停止: {}, 最后位置 {:?}/{:?}",
                    language_info.id,
                    ctx.last_group,
                    ctx.last_section
                );
                Self::finished_outcome(&ctx, JobState::Stopped, StopReason::UserStop, "用户请求停止")
            }
            Ok(_) => {
                tracing::info!(
                    "翻译任务完成: {}, 本次新增 {} 条, API 调用 {} 次",
                    language_info.id,
                    ctx.translated_this_run,
                    ctx.api_calls_this_run
                );
                Self::finished_outcome(&ctx, JobState::Completed, StopReason::Completed, "语料库已全部处理")
            }
            Err(e) => {
                helpers::log_error(&e);
                Self::error_outcome(
                    language_info.id,
                    ctx.last_group.clone(),
                    ctx.last_section.clone(),
                    &ctx.checkpoint,
                    ctx.translated_this_run,
                    ctx.api_calls_this_run,
                    &e,
                )
            }
        };

        ctx.emit(outcome.state);
        outcome
    }

    async fn execute(&self, ctx: &mut RunContext<'_>, stop: &StopSignal) -> TranslationResult<JobState> {
        // 整个任务期间持有语言锁，其他进程的任务与重置会被拒绝
        let _lock = self.store.lock(ctx.language.id)?;
        let corpus = self.extractor.extract()?;
        ctx.checkpoint = self.store.load(ctx.language.id)?;

        ctx.total_units = corpus.unit_count();
        ctx.done_units = count_processed(&corpus, &ctx.checkpoint);
        ctx.emit(JobState::Started);

        tracing::info!(
            "{}: 共 {} 本书 {} 条记录, 剩余 {} 条",
            ctx.language.id,
            corpus.groups.len(),
            ctx.total_units,
            ctx.total_units - ctx.done_units
        );

        for group in &corpus.groups {
            if stop.is_stop_requested() {
                return Ok(JobState::Stopped);
            }
            ctx.last_group = Some(group.id.clone());
            ctx.last_section = None;
            tracing::debug!(
                "{}: 开始书 {} ({})",
                ctx.language.id,
                group.id,
                group.title.as_deref().unwrap_or("-")
            );

            for section in &group.sections {
                if stop.is_stop_requested() {
                    return Ok(JobState::Stopped);
                }
                self.process_section(ctx, group, section).await?;
            }

            self.mark_group_if_complete(ctx, group)?;
        }

        Ok(JobState::Completed)
    }

    async fn process_section(
        &self,
        ctx: &mut RunContext<'_>,
        group: &Group,
        section: &Section,
    ) -> TranslationResult<()> {
        let pending: Vec<_> = section
            .units
            .iter()
            .filter(|unit| !ctx.checkpoint.is_processed(&unit.key))
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        ctx.last_section = Some(section.file.clone());
        ctx.emit(JobState::Translating);
        tracing::debug!("{}/{}: 翻译 {} 条", group.id, section.file, pending.len());

        let texts: Vec<String> = pending.iter().map(|unit| unit.source_text.clone()).collect();
        let output = self.client.translate_detailed(&texts, ctx.language).await;

        let records: Vec<TranslatedRecord> = pending
            .iter()
            .zip(output.texts.iter().zip(output.fallback.iter()))
            .filter(|(unit, (text, fallback))| {
                !**fallback && !self.is_identical_echo(&unit.source_text, text)
            })
            .map(|(unit, (text, _))| TranslatedRecord::new(unit, text.clone()))
            .collect();

        let skipped = pending.len() - records.len();
        if skipped > 0 {
            tracing::warn!(
                "{}/{}: {} 条未获得译文，下次运行重试",
                group.id,
                section.file,
                skipped
            );
        }

        let newly = ctx.checkpoint.mark_processed(records.iter().map(|r| &r.key)) as u64;
        ctx.checkpoint.stats.total_translated += newly;
        ctx.checkpoint.stats.api_calls += output.api_calls;
        ctx.checkpoint.stats.tokens_used += output.tokens;
        ctx.translated_this_run += newly;
        ctx.api_calls_this_run += output.api_calls;
        ctx.done_units += newly as usize;

        ctx.emit(JobState::Checkpointing);
        self.persist(ctx, &records)?;
        ctx.emit(JobState::Translating);

        Ok(())
    }

    fn mark_group_if_complete(&self, ctx: &mut RunContext<'_>, group: &Group) -> TranslationResult<()> {
        if ctx.checkpoint.processed_groups.contains(&group.id) {
            return Ok(());
        }

        let complete = group
            .sections
            .iter()
            .flat_map(|s| s.units.iter())
            .all(|unit| ctx.checkpoint.is_processed(&unit.key));

        if complete {
            ctx.checkpoint.processed_groups.insert(group.id.clone());
            self.persist(ctx, &[])?;
            tracing::info!("{}: 书 {} 已全部翻译", ctx.language.id, group.id);
        }

        Ok(())
    }

    fn persist(&self, ctx: &RunContext<'_>, records: &[TranslatedRecord]) -> TranslationResult<()> {
        self.store
            .save(&ctx.checkpoint, records)
            .map(|_| ())
            .map_err(|e| match e {
                TranslationError::PersistenceError(_) => e,
                other => TranslationError::PersistenceError(other.to_string()),
            })
    }

    fn is_identical_echo(&self, source: &str, translated: &str) -> bool {
        self.echo_policy == EchoPolicy::SkipIdentical && source.trim() == translated.trim()
    }

    fn finished_outcome(ctx: &RunContext<'_>, state: JobState, reason: StopReason, message: &str) -> JobOutcome {
        JobOutcome {
            language: ctx.language.id.to_string(),
            state,
            reason,
            message: message.to_string(),
            last_group: ctx.last_group.clone(),
            last_section: ctx.last_section.clone(),
            error: None,
            total_translated: ctx.checkpoint.stats.total_translated,
            api_calls: ctx.checkpoint.stats.api_calls,
            tokens_used: ctx.checkpoint.stats.tokens_used,
            translated_this_run: ctx.translated_this_run,
            api_calls_this_run: ctx.api_calls_this_run,
            finished_at: Utc::now(),
        }
    }

    fn error_outcome(
        language: &str,
        last_group: Option<String>,
        last_section: Option<String>,
        checkpoint: &Checkpoint,
        translated_this_run: u64,
        api_calls_this_run: u64,
        error: &TranslationError,
    ) -> JobOutcome {
        JobOutcome {
            language: language.to_string(),
            state: JobState::Errored,
            reason: StopReason::Error,
            message: format!("任务因{:?}类错误中止", error.category()),
            last_group,
            last_section,
            error: Some(error.to_string()),
            total_translated: checkpoint.stats.total_translated,
            api_calls: checkpoint.stats.api_calls,
            tokens_used: checkpoint.stats.tokens_used,
            translated_this_run,
            api_calls_this_run,
            finished_at: Utc::now(),
        }
    }
}

fn count_processed(corpus: &Corpus, checkpoint: &Checkpoint) -> usize {
    corpus
        .units()
        .filter(|unit| checkpoint.is_processed(&unit.key))
        .count()
}
