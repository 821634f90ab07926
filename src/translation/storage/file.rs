//! 文件检查点后端
//!
//! 布局:
//! - `{checkpoints}/{language}_api_checkpoint.json`
//! - `{output}/{language}/all_translations.json`
//!
//! 先写输出文件再写检查点文件。两次写入之间崩溃时，记录已存在但尚未
//! 标记为已处理，下次运行会重新翻译并覆盖同一键。

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{write_json_atomic, Checkpoint, CheckpointStore, LanguageLock};
use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::{merge_records, OutputMapping, TranslatedRecord};

/// 基于 JSON 文件的检查点存储
pub struct FileCheckpointStore {
    checkpoints_dir: PathBuf,
    output_dir: PathBuf,
    /// 每种语言的输出映射缓存，避免每次保存都重新读取
    outputs: Mutex<HashMap<String, OutputMapping>>,
}

impl FileCheckpointStore {
    pub fn new(
        checkpoints_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> TranslationResult<Self> {
        let checkpoints_dir = checkpoints_dir.into();
        let output_dir = output_dir.into();

        fs::create_dir_all(&checkpoints_dir)?;
        fs::create_dir_all(&output_dir)?;

        Ok(Self {
            checkpoints_dir,
            output_dir,
            outputs: Mutex::new(HashMap::new()),
        })
    }

    pub fn checkpoint_path(&self, language: &str) -> PathBuf {
        self.checkpoints_dir
            .join(format!("{}{}", language, constants::CHECKPOINT_FILE_SUFFIX))
    }

    pub fn output_path(&self, language: &str) -> PathBuf {
        self.output_dir
            .join(language)
            .join(constants::OUTPUT_FILE_NAME)
    }

    fn lock_outputs(&self) -> TranslationResult<MutexGuard<'_, HashMap<String, OutputMapping>>> {
        self.outputs
            .lock()
            .map_err(|_| TranslationError::InternalError("输出缓存锁已中毒".to_string()))
    }

    fn read_output(path: &Path) -> TranslationResult<OutputMapping> {
        if !path.exists() {
            return Ok(OutputMapping::new());
        }

        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            TranslationError::PersistenceError(format!("输出文件损坏 {}: {}", path.display(), e))
        })
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn load(&self, language: &str) -> TranslationResult<Checkpoint> {
        let path = self.checkpoint_path(language);
        if !path.exists() {
            tracing::debug!("{} 没有检查点，从头开始", language);
            return Ok(Checkpoint::new(language));
        }

        let content = fs::read_to_string(&path)?;
        let mut checkpoint: Checkpoint = serde_json::from_str(&content).map_err(|e| {
            TranslationError::PersistenceError(format!("检查点文件损坏 {}: {}", path.display(), e))
        })?;
        checkpoint.language = language.to_string();

        tracing::info!(
            "加载检查点 {}: 已处理 {} 条",
            language,
            checkpoint.processed_count()
        );
        Ok(checkpoint)
    }

    fn save(&self, checkpoint: &Checkpoint, records: &[TranslatedRecord]) -> TranslationResult<usize> {
        let language = checkpoint.language.as_str();
        let mut outputs = self.lock_outputs()?;

        let inserted = if records.is_empty() {
            0
        } else {
            let output_path = self.output_path(language);
            if !outputs.contains_key(language) {
                let mapping = Self::read_output(&output_path)?;
                outputs.insert(language.to_string(), mapping);
            }

            let mut mapping = outputs.get(language).cloned().unwrap_or_default();
            let inserted = merge_records(&mut mapping, records);
            write_json_atomic(&output_path, &mapping)
                .map_err(|e| e.with_context(output_path.display()))?;
            outputs.insert(language.to_string(), mapping);
            inserted
        };

        let checkpoint_path = self.checkpoint_path(language);
        write_json_atomic(&checkpoint_path, checkpoint)
            .map_err(|e| e.with_context(checkpoint_path.display()))?;

        tracing::debug!(
            "检查点已保存 {}: 新增 {} 条记录, 共 {} 条已处理",
            language,
            inserted,
            checkpoint.processed_count()
        );
        Ok(inserted)
    }

    fn reset(&self, language: &str) -> TranslationResult<()> {
        let _lock = self.lock(language)?;
        let mut outputs = self.lock_outputs()?;
        outputs.remove(language);

        for path in [self.checkpoint_path(language), self.output_path(language)] {
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }

        tracing::info!("已重置 {} 的检查点与输出", language);
        Ok(())
    }

    fn lock(&self, language: &str) -> TranslationResult<LanguageLock> {
        let lock = LanguageLock::acquire(&self.checkpoints_dir, language)?;
        // 其他进程可能在锁外写过输出文件，丢弃缓存
        self.lock_outputs()?.remove(language);
        Ok(lock)
    }

    fn export(&self, language: &str) -> TranslationResult<OutputMapping> {
        let outputs = self.lock_outputs()?;
        match outputs.get(language) {
            Some(mapping) => Ok(mapping.clone()),
            None => Self::read_output(&self.output_path(language)),
        }
    }

    fn translated_count(&self, language: &str) -> TranslationResult<usize> {
        Ok(self.export(language)?.values().map(|group| group.len()).sum())
    }
}
