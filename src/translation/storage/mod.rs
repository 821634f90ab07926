//! 检查点存储模块
//!
//! 每种语言一个检查点：已处理的复合键集合与计数器。两种后端实现同一
//! 契约，任务控制器只依赖 [`CheckpointStore`]。
//!
//! - **文件后端** (`file.rs`): 每种语言一个 JSON 检查点文件与一个输出文件
//! - **redb 后端** (`redb_store.rs`): 每个已处理单元一行，每种语言一行进度

pub mod file;
pub mod lock;
pub mod redb_store;

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::translation::config::{StorageBackend, TranslatorConfig};
use crate::translation::error::TranslationResult;
use crate::translation::types::{CompositeKey, OutputMapping, TranslatedRecord};

pub use file::FileCheckpointStore;
pub use lock::LanguageLock;
pub use redb_store::RedbCheckpointStore;

/// 检查点计数器，仅用于报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointStats {
    #[serde(default)]
    pub total_translated: u64,
    #[serde(default)]
    pub api_calls: u64,
    #[serde(default)]
    pub tokens_used: u64,
}

/// 单个语言的任务状态
///
/// 序列化形式即文件后端的检查点文件格式。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub language: String,
    /// 所有单元均已处理的书
    #[serde(rename = "processed_books", default)]
    pub processed_groups: BTreeSet<String>,
    #[serde(rename = "processed_hadiths", default)]
    pub processed: BTreeSet<CompositeKey>,
    #[serde(default)]
    pub stats: CheckpointStats,
}

impl Checkpoint {
    /// 空检查点
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn is_processed(&self, key: &CompositeKey) -> bool {
        self.processed.contains(key)
    }

    /// 标记为已处理，返回新增数量
    pub fn mark_processed<'a>(&mut self, keys: impl IntoIterator<Item = &'a CompositeKey>) -> usize {
        keys.into_iter()
            .filter(|key| self.processed.insert((*key).clone()))
            .count()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}

/// 检查点存储契约
///
/// - `load` 对不存在的检查点返回空检查点
/// - `save` 原子地写入计数器并追加记录；重复的复合键是空操作
/// - `reset` 清除该语言的全部状态；该语言的锁被持有时拒绝
/// - `lock` 获取跨进程的语言锁，任务运行期间一直持有
pub trait CheckpointStore: Send + Sync {
    /// 后端名称
    fn backend_name(&self) -> &'static str;

    fn load(&self, language: &str) -> TranslationResult<Checkpoint>;

    /// 保存检查点与新记录，返回实际新增的记录数
    fn save(&self, checkpoint: &Checkpoint, records: &[TranslatedRecord]) -> TranslationResult<usize>;

    fn reset(&self, language: &str) -> TranslationResult<()>;

    /// 获取该语言的独占锁
    fn lock(&self, language: &str) -> TranslationResult<LanguageLock>;

    /// 导出输出映射
    fn export(&self, language: &str) -> TranslationResult<OutputMapping>;

    /// 已持久化的译文数量
    fn translated_count(&self, language: &str) -> TranslationResult<usize>;
}

/// 根据配置打开存储后端
pub fn open_store(config: &TranslatorConfig) -> TranslationResult<Box<dyn CheckpointStore>> {
    let store: Box<dyn CheckpointStore> = match config.storage_backend {
        StorageBackend::File => Box::new(FileCheckpointStore::new(
            config.checkpoints_dir(),
            config.output_dir(),
        )?),
        StorageBackend::Redb => Box::new(RedbCheckpointStore::open(config.database_path())?),
    };

    tracing::info!("检查点存储后端: {}", store.backend_name());
    Ok(store)
}

/// 原子写入 JSON 文件：先写同目录临时文件，再重命名
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> TranslationResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(file.as_file_mut(), value)?;
    file.as_file_mut().flush()?;
    file.as_file().sync_all()?;
    file.persist(path)?;

    Ok(())
}
