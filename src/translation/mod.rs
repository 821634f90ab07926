//! 翻译模块
//!
//! 可恢复的批量翻译任务，采用清晰的模块化架构：
//! - **config**: 配置管理与目标语言表
//! - **core**: 翻译客户端与外部服务边界
//! - **pipeline**: 语料库提取、批次切分与响应解析
//! - **storage**: 检查点存储（文件 / redb）
//! - **runner**: 单语言任务控制器
//! - **registry**: 多语言任务注册表
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use hadith_translator::translation::{ConfigManager, JobRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::new()?.into_config();
//! let registry = JobRegistry::from_config(&config)?;
//!
//! let handle = registry.start("turkish")?;
//! let outcome = handle.await?;
//! println!("{:?}: 本次新增 {} 条", outcome.state, outcome.translated_this_run);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块 - 处理翻译相关的所有配置
pub mod config;

/// 翻译客户端模块 - 批次、并发、重试与回退
pub mod core;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 语料库与批次处理管道
pub mod pipeline;

/// 多语言任务注册表
pub mod registry;

/// 单语言任务控制器
pub mod runner;

/// 检查点存储
pub mod storage;

/// 核心数据类型
pub mod types;

// ============================================================================
// 公共API导出
// ============================================================================

pub use config::{
    find_language, require_language, ConfigManager, EchoPolicy, Language, StorageBackend,
    TranslatorConfig, LANGUAGES,
};
pub use self::core::{
    ClientOptions, OpenAiBackend, RetryPolicy, ServiceReply, ServiceRequest, TranslationBackend,
    TranslationClient, TranslationOutput,
};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{Corpus, Group, Section, UnitExtractor};
pub use registry::{JobRegistry, JobStatus, LanguageSummary};
pub use runner::{JobController, JobOutcome, JobState, ProgressSnapshot, StopReason, StopSignal};
pub use storage::{
    open_store, Checkpoint, CheckpointStats, CheckpointStore, FileCheckpointStore,
    LanguageLock, RedbCheckpointStore,
};
pub use types::{
    CompositeKey, Confidence, OutputEntry, OutputMapping, Quality, TranslatedRecord,
    TranslationUnit,
};
