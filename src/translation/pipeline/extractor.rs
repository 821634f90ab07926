//! 语料库单元提取器
//!
//! 遍历 书 → 章 → 记录 三层结构，按确定顺序产出带稳定复合键的翻译单元。
//! 书按 `numericId` 排序，章按描述文件声明的顺序，记录按文件内顺序。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::translation::config::constants;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::{CompositeKey, TranslationUnit};

/// 整个语料库快照
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub groups: Vec<Group>,
}

impl Corpus {
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(Group::unit_count).sum()
    }

    pub fn units(&self) -> impl Iterator<Item = &TranslationUnit> {
        self.groups
            .iter()
            .flat_map(|g| g.sections.iter())
            .flat_map(|s| s.units.iter())
    }
}

/// 一本书
#[derive(Debug, Clone)]
pub struct Group {
    pub id: String,
    pub priority: i64,
    pub title: Option<String>,
    pub sections: Vec<Section>,
}

impl Group {
    pub fn unit_count(&self) -> usize {
        self.sections.iter().map(|s| s.units.len()).sum()
    }
}

/// 一个章节文件；无章节的书只有一个 `all.json` 章节
#[derive(Debug, Clone)]
pub struct Section {
    pub file: String,
    pub units: Vec<TranslationUnit>,
}

#[derive(Debug, Deserialize)]
struct GroupDescriptor {
    id: Value,
    #[serde(rename = "numericId", default)]
    numeric_id: Option<Value>,
    #[serde(default)]
    chapters: Vec<ChapterRef>,
    #[serde(default)]
    english: Option<TitleFields>,
}

#[derive(Debug, Deserialize)]
struct TitleFields {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChapterRef {
    #[serde(default)]
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SectionFile {
    #[serde(default)]
    hadiths: Vec<RawUnit>,
}

#[derive(Debug, Deserialize)]
struct RawUnit {
    #[serde(default)]
    id: Option<Value>,
    #[serde(rename = "chapterId", default)]
    chapter_id: Option<Value>,
    #[serde(default)]
    english: Option<EnglishFields>,
}

#[derive(Debug, Default, Deserialize)]
struct EnglishFields {
    #[serde(default)]
    narrator: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// 语料库提取器
#[derive(Debug, Clone)]
pub struct UnitExtractor {
    root: PathBuf,
}

impl UnitExtractor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 读取整个语料库
    ///
    /// 根目录不存在或没有任何可用的书时返回 `CorpusUnavailable`。
    /// 描述文件损坏的书会被跳过并记录警告。
    pub fn extract(&self) -> TranslationResult<Corpus> {
        if !self.root.is_dir() {
            return Err(TranslationError::CorpusUnavailable(format!(
                "语料库目录不存在: {}",
                self.root.display()
            )));
        }

        let mut descriptors: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| entry.file_name() == constants::GROUP_DESCRIPTOR)
            .map(|entry| entry.into_path())
            .collect();
        descriptors.sort();

        let mut groups = Vec::with_capacity(descriptors.len());
        let mut seen = HashSet::new();

        for path in &descriptors {
            match self.load_group(path, &mut seen) {
                Ok(group) => groups.push(group),
                Err(e) => tracing::warn!("跳过无法读取的书 {}: {}", path.display(), e),
            }
        }

        if groups.is_empty() {
            return Err(TranslationError::CorpusUnavailable(format!(
                "语料库为空: {}",
                self.root.display()
            )));
        }

        // sort_by 是稳定排序，相同优先级保持路径顺序
        groups.sort_by(|a, b| a.priority.cmp(&b.priority));

        tracing::info!(
            "语料库加载完成: {} 本书, {} 条记录",
            groups.len(),
            groups.iter().map(Group::unit_count).sum::<usize>()
        );

        Ok(Corpus { groups })
    }

    fn load_group(
        &self,
        descriptor_path: &Path,
        seen: &mut HashSet<CompositeKey>,
    ) -> TranslationResult<Group> {
        let descriptor: GroupDescriptor = read_json(descriptor_path)?;
        let group_id = value_as_id(&descriptor.id).ok_or_else(|| {
            TranslationError::InvalidInput(format!("书的 id 无效: {}", descriptor.id))
        })?;
        let priority = descriptor
            .numeric_id
            .as_ref()
            .and_then(value_as_i64)
            .unwrap_or(0);
        let group_dir = descriptor_path.parent().unwrap_or(&self.root);

        let section_files: Vec<String> = if descriptor.chapters.is_empty() {
            vec![constants::FLAT_SECTION_FILE.to_string()]
        } else {
            descriptor
                .chapters
                .iter()
                .filter_map(|chapter| chapter.file.clone())
                .collect()
        };

        let mut sections = Vec::with_capacity(section_files.len());
        for file in section_files {
            let path = group_dir.join(&file);
            if !path.is_file() {
                tracing::warn!("书 {} 缺少章节文件 {}", group_id, path.display());
                continue;
            }

            let section_file: SectionFile = match read_json(&path) {
                Ok(section) => section,
                Err(e) => {
                    tracing::warn!("跳过无法读取的章节 {}: {}", path.display(), e);
                    continue;
                }
            };

            let units = collect_units(&group_id, &file, section_file, seen);
            sections.push(Section { file, units });
        }

        Ok(Group {
            id: group_id,
            priority,
            title: descriptor.english.and_then(|e| e.title),
            sections,
        })
    }
}

fn collect_units(
    group_id: &str,
    file: &str,
    section: SectionFile,
    seen: &mut HashSet<CompositeKey>,
) -> Vec<TranslationUnit> {
    let mut units = Vec::with_capacity(section.hadiths.len());

    for raw in section.hadiths {
        let Some(unit_id) = raw.id.as_ref().and_then(value_as_u64) else {
            tracing::warn!("{}/{}: 跳过缺少数字 id 的记录", group_id, file);
            continue;
        };
        let section_id = raw.chapter_id.as_ref().and_then(value_as_u64).unwrap_or(0);
        let key = CompositeKey::new(group_id, section_id, unit_id);

        if !seen.insert(key.clone()) {
            tracing::warn!("{}/{}: 跳过重复的记录 {}", group_id, file, key);
            continue;
        }

        let english = raw.english.unwrap_or_default();
        let attribution = english.narrator.unwrap_or_default();
        let body = english.text.unwrap_or_default();
        let source_text = TranslationUnit::synthesize_text(&attribution, &body);

        units.push(TranslationUnit {
            key,
            attribution,
            source_text,
        });
    }

    units
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> TranslationResult<T> {
    let content = fs::read_to_string(path)
        .map_err(|e| TranslationError::InvalidInput(format!("读取 {} 失败: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

fn value_as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(path: &Path, value: serde_json::Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    #[test]
    fn test_missing_root_is_corpus_unavailable() {
        let extractor = UnitExtractor::new("/definitely/not/here");
        assert!(matches!(
            extractor.extract(),
            Err(TranslationError::CorpusUnavailable(_))
        ));
    }

    #[test]
    fn test_empty_root_is_corpus_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = UnitExtractor::new(dir.path());
        assert!(matches!(
            extractor.extract(),
            Err(TranslationError::CorpusUnavailable(_))
        ));
    }

    #[test]
    fn test_groups_sorted_by_priority_and_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            &root.join("the_9_books/muslim/metadata.json"),
            json!({"id": "muslim", "numericId": 2, "chapters": [{"file": "1.json"}]}),
        );
        write(
            &root.join("the_9_books/muslim/1.json"),
            json!({"hadiths": [
                {"id": 1, "chapterId": 1, "english": {"narrator": "N", "text": "T"}}
            ]}),
        );
        write(
            &root.join("forties/nawawi40/metadata.json"),
            json!({"id": "nawawi40", "numericId": 1}),
        );
        write(
            &root.join("forties/nawawi40/all.json"),
            json!({"hadiths": [
                {"id": 1, "english": {"text": "Actions are by intentions"}},
                {"id": 2, "english": {}}
            ]}),
        );

        let corpus = UnitExtractor::new(root).extract().unwrap();
        let ids: Vec<_> = corpus.groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["nawawi40", "muslim"]);
        assert_eq!(corpus.unit_count(), 3);

        let flat = &corpus.groups[0];
        assert_eq!(flat.sections.len(), 1);
        assert_eq!(flat.sections[0].file, "all.json");
        assert_eq!(flat.sections[0].units[0].key, CompositeKey::new("nawawi40", 0, 1));
        assert_eq!(flat.sections[0].units[1].source_text, "");

        let muslim = &corpus.groups[1].sections[0].units[0];
        assert_eq!(muslim.source_text, "N T");
        assert_eq!(muslim.attribution, "N");
    }

    #[test]
    fn test_corrupt_descriptor_skipped_and_duplicates_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("broken")).unwrap();
        fs::write(root.join("broken/metadata.json"), "{ not json").unwrap();

        write(
            &root.join("ok/metadata.json"),
            json!({"id": "ok", "numericId": 1, "chapters": [{"file": "1.json"}, {"file": "2.json"}, {}]}),
        );
        write(
            &root.join("ok/1.json"),
            json!({"hadiths": [
                {"id": 7, "chapterId": 1, "english": {"text": "a"}},
                {"id": 7, "chapterId": 1, "english": {"text": "dup"}},
                {"chapterId": 1, "english": {"text": "no id"}}
            ]}),
        );

        let corpus = UnitExtractor::new(root).extract().unwrap();
        assert_eq!(corpus.groups.len(), 1);
        // 2.json 不存在，被跳过
        assert_eq!(corpus.groups[0].sections.len(), 1);
        let units = &corpus.groups[0].sections[0].units;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_text, "a");
    }
}
