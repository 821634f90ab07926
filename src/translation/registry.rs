//! 任务注册表
//!
//! 语言 → 任务句柄的映射，提供 `start / stop / status / reset / export`
//! 控制面。同一语言同时只允许一个运行中的任务，通过加锁后的检查再插入保证。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::config::{require_language, TranslatorConfig, LANGUAGES};
use super::error::{TranslationError, TranslationResult};
use super::runner::{JobController, JobOutcome, ProgressSnapshot, StopSignal};
use super::types::OutputMapping;

struct JobSlot {
    stop: StopSignal,
    progress: watch::Receiver<ProgressSnapshot>,
    outcome: Arc<Mutex<Option<JobOutcome>>>,
    running: Arc<AtomicBool>,
}

impl JobSlot {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// 任务结束时清除运行标记，包括 panic 的情况
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 单个语言的任务状态
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub language: String,
    pub running: bool,
    pub progress: ProgressSnapshot,
    /// 最近一次结束的任务
    pub outcome: Option<JobOutcome>,
}

/// 语言概览
#[derive(Debug, Clone, Serialize)]
pub struct LanguageSummary {
    pub id: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    pub code: &'static str,
    pub translated: usize,
    pub running: bool,
}

/// 任务注册表，可以廉价克隆并在多个处理器之间共享
#[derive(Clone)]
pub struct JobRegistry {
    controller: Arc<JobController>,
    jobs: Arc<Mutex<HashMap<String, JobSlot>>>,
}

impl JobRegistry {
    pub fn new(controller: Arc<JobController>) -> Self {
        Self {
            controller,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> TranslationResult<Self> {
        Ok(Self::new(Arc::new(JobController::from_config(config)?)))
    }

    fn lock_jobs(&self) -> TranslationResult<MutexGuard<'_, HashMap<String, JobSlot>>> {
        self.jobs
            .lock()
            .map_err(|_| TranslationError::InternalError("任务注册表锁已中毒".to_string()))
    }

    /// 启动一个语言任务，必须在 tokio 运行时内调用
    ///
    /// 未知语言返回配置错误，该语言已有运行中的任务时返回并发错误。
    pub fn start(&self, language: &str) -> TranslationResult<JoinHandle<JobOutcome>> {
        let lang = require_language(language)?;
        let mut jobs = self.lock_jobs()?;

        if jobs.get(lang.id).is_some_and(JobSlot::is_running) {
            return Err(TranslationError::ConcurrencyError(format!(
                "{} 的翻译任务已在运行",
                lang.id
            )));
        }

        let stop = StopSignal::new();
        let (tx, rx) = watch::channel(ProgressSnapshot::idle(lang.id));
        let running = Arc::new(AtomicBool::new(true));
        let outcome = Arc::new(Mutex::new(None));

        jobs.insert(
            lang.id.to_string(),
            JobSlot {
                stop: stop.clone(),
                progress: rx,
                outcome: Arc::clone(&outcome),
                running: Arc::clone(&running),
            },
        );
        drop(jobs);

        let controller = Arc::clone(&self.controller);
        let handle = tokio::spawn(async move {
            let _guard = RunningGuard(running);
            let result = controller.run(lang.id, &stop, &tx).await;
            if let Ok(mut slot) = outcome.lock() {
                *slot = Some(result.clone());
            }
            result
        });

        tracing::info!("已启动翻译任务: {}", lang.id);
        Ok(handle)
    }

    /// 向所有运行中的任务发送停止信号，返回收到信号的任务数
    pub fn stop(&self) -> TranslationResult<usize> {
        let jobs = self.lock_jobs()?;
        let mut stopped = 0;
        for (language, slot) in jobs.iter().filter(|(_, slot)| slot.is_running()) {
            slot.stop.request_stop();
            tracing::info!("已请求停止翻译任务: {}", language);
            stopped += 1;
        }
        Ok(stopped)
    }

    /// 停止指定语言的任务，返回是否有运行中的任务
    pub fn stop_language(&self, language: &str) -> TranslationResult<bool> {
        let lang = require_language(language)?;
        let jobs = self.lock_jobs()?;
        match jobs.get(lang.id).filter(|slot| slot.is_running()) {
            Some(slot) => {
                slot.stop.request_stop();
                tracing::info!("已请求停止翻译任务: {}", lang.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_running(&self, language: &str) -> bool {
        self.lock_jobs()
            .map(|jobs| jobs.get(language).is_some_and(JobSlot::is_running))
            .unwrap_or(false)
    }

    /// 某个语言的最新状态；从未启动过的语言返回 `None`
    pub fn status(&self, language: &str) -> TranslationResult<Option<JobStatus>> {
        let lang = require_language(language)?;
        let jobs = self.lock_jobs()?;
        Ok(jobs.get(lang.id).map(|slot| Self::slot_status(lang.id, slot)))
    }

    /// 所有启动过的任务状态，按语言排序
    pub fn statuses(&self) -> TranslationResult<Vec<JobStatus>> {
        let jobs = self.lock_jobs()?;
        let mut statuses: Vec<_> = jobs
            .iter()
            .map(|(language, slot)| Self::slot_status(language, slot))
            .collect();
        statuses.sort_by(|a, b| a.language.cmp(&b.language));
        Ok(statuses)
    }

    fn slot_status(language: &str, slot: &JobSlot) -> JobStatus {
        JobStatus {
            language: language.to_string(),
            running: slot.is_running(),
            progress: slot.progress.borrow().clone(),
            outcome: slot.outcome.lock().ok().and_then(|o| o.clone()),
        }
    }

    /// 清除某个语言的全部状态；任务运行中时拒绝
    pub fn reset(&self, language: &str) -> TranslationResult<()> {
        let lang = require_language(language)?;
        // 持有锁直到重置完成，期间无法启动同一语言的任务
        let mut jobs = self.lock_jobs()?;

        if jobs.get(lang.id).is_some_and(JobSlot::is_running) {
            return Err(TranslationError::ConcurrencyError(format!(
                "{} 的翻译任务正在运行，无法重置",
                lang.id
            )));
        }

        self.controller.store().reset(lang.id)?;
        jobs.remove(lang.id);
        Ok(())
    }

    pub fn export(&self, language: &str) -> TranslationResult<OutputMapping> {
        let lang = require_language(language)?;
        self.controller.store().export(lang.id)
    }

    /// 所有支持的语言及其已翻译数量
    pub fn languages(&self) -> TranslationResult<Vec<LanguageSummary>> {
        LANGUAGES
            .iter()
            .map(|lang| {
                Ok(LanguageSummary {
                    id: lang.id,
                    name: lang.name,
                    native_name: lang.native_name,
                    code: lang.code,
                    translated: self.controller.store().translated_count(lang.id)?,
                    running: self.is_running(lang.id),
                })
            })
            .collect()
    }
}
