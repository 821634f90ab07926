//! redb 检查点后端
//!
//! 三张表：
//! - `translations`: `"{language}/{group}:{section}:{unit}"` → 译文 JSON，
//!   键本身就是 (复合键, 语言) 的唯一约束
//! - `processed`: 同样的键 → `()`，即检查点中的已处理集合
//! - `progress`: `language` → 计数器与已完成书目 JSON
//!
//! 每次保存是一个写事务。

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use super::{Checkpoint, CheckpointStats, CheckpointStore, LanguageLock};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::{CompositeKey, OutputEntry, OutputMapping, TranslatedRecord};

const TRANSLATIONS: TableDefinition<&str, &str> = TableDefinition::new("translations");
const PROCESSED: TableDefinition<&str, ()> = TableDefinition::new("processed");
const PROGRESS: TableDefinition<&str, &str> = TableDefinition::new("progress");

#[derive(Debug, Default, Serialize, Deserialize)]
struct ProgressRow {
    #[serde(default)]
    stats: CheckpointStats,
    #[serde(default)]
    processed_books: BTreeSet<String>,
}

/// 基于 redb 的检查点存储
pub struct RedbCheckpointStore {
    db: Database,
    path: PathBuf,
}

impl RedbCheckpointStore {
    /// 打开或创建数据库，并确保两张表存在
    pub fn open(path: impl Into<PathBuf>) -> TranslationResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path)?;
        let txn = db.begin_write()?;
        {
            txn.open_table(TRANSLATIONS)?;
            txn.open_table(PROCESSED)?;
            txn.open_table(PROGRESS)?;
        }
        txn.commit()?;

        tracing::info!("打开检查点数据库: {}", path.display());
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn row_key(language: &str, key: &CompositeKey) -> String {
        format!("{}/{}", language, key)
    }

    /// 该语言所有行的键范围：`"{language}/"` 到 `"{language}0"`
    fn language_range(language: &str) -> (String, String) {
        (format!("{}/", language), format!("{}0", language))
    }

    /// 读取该语言的全部行，按键排序
    fn scan(&self, language: &str) -> TranslationResult<Vec<(CompositeKey, OutputEntry)>> {
        let (start, end) = Self::language_range(language);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRANSLATIONS)?;

        let mut rows = Vec::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (key, value) = item?;
            let composite: CompositeKey = key.value()[start.len()..].parse()?;
            let entry: OutputEntry = serde_json::from_str(value.value())?;
            rows.push((composite, entry));
        }

        Ok(rows)
    }

    /// 读取该语言的已处理键
    fn scan_processed(&self, language: &str) -> TranslationResult<BTreeSet<CompositeKey>> {
        let (start, end) = Self::language_range(language);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(PROCESSED)?;

        let mut processed = BTreeSet::new();
        for item in table.range(start.as_str()..end.as_str())? {
            let (key, _) = item?;
            processed.insert(key.value()[start.len()..].parse()?);
        }

        Ok(processed)
    }
}

impl CheckpointStore for RedbCheckpointStore {
    fn backend_name(&self) -> &'static str {
        "redb"
    }

    fn load(&self, language: &str) -> TranslationResult<Checkpoint> {
        let progress: ProgressRow = {
            let txn = self.db.begin_read()?;
            let table = txn.open_table(PROGRESS)?;
            match table.get(language)? {
                Some(raw) => serde_json::from_str(raw.value())?,
                None => ProgressRow::default(),
            }
        };

        let processed = self.scan_processed(language)?;

        tracing::info!("加载检查点 {}: 已处理 {} 条", language, processed.len());

        Ok(Checkpoint {
            language: language.to_string(),
            processed_groups: progress.processed_books,
            processed,
            stats: progress.stats,
        })
    }

    fn save(&self, checkpoint: &Checkpoint, records: &[TranslatedRecord]) -> TranslationResult<usize> {
        let language = checkpoint.language.as_str();
        let progress = serde_json::to_string(&ProgressRow {
            stats: checkpoint.stats,
            processed_books: checkpoint.processed_groups.clone(),
        })?;

        let mut inserted = 0;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(TRANSLATIONS)?;
            for record in records {
                let row_key = Self::row_key(language, &record.key);
                if table.get(row_key.as_str())?.is_some() {
                    continue;
                }
                let value = serde_json::to_string(&record.to_entry())?;
                table.insert(row_key.as_str(), value.as_str())?;
                inserted += 1;
            }

            // 已处理表与检查点保持一致：删除多余的键，补齐缺失的键
            let (start, end) = Self::language_range(language);
            let mut processed_table = txn.open_table(PROCESSED)?;
            let stale = processed_table
                .range(start.as_str()..end.as_str())?
                .map(|item| item.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .filter(|row_key| {
                    row_key[start.len()..]
                        .parse::<CompositeKey>()
                        .map_or(true, |key| !checkpoint.processed.contains(&key))
                })
                .collect::<Vec<_>>();
            for row_key in &stale {
                processed_table.remove(row_key.as_str())?;
            }
            for key in &checkpoint.processed {
                processed_table.insert(Self::row_key(language, key).as_str(), ())?;
            }

            let mut progress_table = txn.open_table(PROGRESS)?;
            progress_table.insert(language, progress.as_str())?;
        }
        txn.commit()?;

        tracing::debug!(
            "检查点已保存 {}: 新增 {} 条记录, 跳过 {} 条已存在记录",
            language,
            inserted,
            records.len() - inserted
        );
        Ok(inserted)
    }

    fn reset(&self, language: &str) -> TranslationResult<()> {
        let _lock = self.lock(language)?;
        let (start, end) = Self::language_range(language);
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(TRANSLATIONS)?;
            let keys = table
                .range(start.as_str()..end.as_str())?
                .map(|item| item.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &keys {
                table.remove(key.as_str())?;
            }

            let mut processed_table = txn.open_table(PROCESSED)?;
            let processed_keys = processed_table
                .range(start.as_str()..end.as_str())?
                .map(|item| item.map(|(key, _)| key.value().to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in &processed_keys {
                processed_table.remove(key.as_str())?;
            }

            let mut progress_table = txn.open_table(PROGRESS)?;
            progress_table.remove(language)?;
            keys.len()
        };
        txn.commit()?;

        tracing::info!("已重置 {}: 删除 {} 条记录", language, removed);
        Ok(())
    }

    fn lock(&self, language: &str) -> TranslationResult<LanguageLock> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        LanguageLock::acquire(dir, language)
    }

    fn export(&self, language: &str) -> TranslationResult<OutputMapping> {
        let mut mapping = OutputMapping::new();
        for (key, entry) in self.scan(language)? {
            mapping
                .entry(key.group_id.clone())
                .or_default()
                .insert(key.local_key(), entry);
        }
        Ok(mapping)
    }

    fn translated_count(&self, language: &str) -> TranslationResult<usize> {
        let (start, end) = Self::language_range(language);
        let txn = self.db.begin_read()?;
        let table = txn.open_table(TRANSLATIONS)?;
        let mut count = 0;
        for item in table.range(start.as_str()..end.as_str())? {
            item.map_err(TranslationError::from)?;
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::types::TranslationUnit;

    fn record(group: &str, section: u64, unit: u64) -> TranslatedRecord {
        let unit = TranslationUnit {
            key: CompositeKey::new(group, section, unit),
            attribution: "Narrated Aisha".to_string(),
            source_text: "text".to_string(),
        };
        TranslatedRecord::new(&unit, format!("tr {}", unit.key))
    }

    #[test]
    fn test_languages_do_not_overlap() {
        let dir = tempfile::tempdir().unwrap();
        let store = RedbCheckpointStore::open(dir.path().join("db.redb")).unwrap();

        let mut tr = Checkpoint::new("turkish");
        let r = record("bukhari", 1, 1);
        tr.mark_processed([&r.key]);
        store.save(&tr, &[r]).unwrap();

        let mut ur = Checkpoint::new("urdu");
        let r = record("bukhari", 1, 2);
        ur.mark_processed([&r.key]);
        store.save(&ur, &[r]).unwrap();

        assert_eq!(store.translated_count("turkish").unwrap(), 1);
        assert_eq!(store.translated_count("urdu").unwrap(), 1);

        store.reset("turkish").unwrap();
        assert_eq!(store.translated_count("turkish").unwrap(), 0);
        assert_eq!(store.translated_count("urdu").unwrap(), 1);
    }

    #[test]
    fn test_load_restores_stats_and_groups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/db.redb");
        {
            let store = RedbCheckpointStore::open(&path).unwrap();
            let mut checkpoint = Checkpoint::new("bengali");
            let r = record("nawawi40", 0, 1);
            checkpoint.mark_processed([&r.key]);
            checkpoint.processed_groups.insert("nawawi40".to_string());
            checkpoint.stats.api_calls = 2;
            checkpoint.stats.tokens_used = 120;
            store.save(&checkpoint, &[r]).unwrap();
        }

        let store = RedbCheckpointStore::open(&path).unwrap();
        let checkpoint = store.load("bengali").unwrap();
        assert!(checkpoint.is_processed(&CompositeKey::new("nawawi40", 0, 1)));
        assert!(checkpoint.processed_groups.contains("nawawi40"));
        assert_eq!(checkpoint.stats.tokens_used, 120);

        let mapping = store.export("bengali").unwrap();
        assert_eq!(mapping["nawawi40"]["0:1"].narrator, "Narrated Aisha");
    }
}
