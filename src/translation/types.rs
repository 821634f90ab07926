//! 翻译任务的核心数据类型

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::translation::error::TranslationError;

/// 单元在整个语料库中的身份：`(group_id, section_id, unit_id)`
///
/// 字符串形式为 `group:section:unit`。group 部分可能包含冒号，
/// 解析时从右侧切分。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompositeKey {
    pub group_id: String,
    pub section_id: u64,
    pub unit_id: u64,
}

impl CompositeKey {
    pub fn new(group_id: impl Into<String>, section_id: u64, unit_id: u64) -> Self {
        Self {
            group_id: group_id.into(),
            section_id,
            unit_id,
        }
    }

    /// 输出文件中组内使用的 `section:unit` 键
    pub fn local_key(&self) -> String {
        format!("{}:{}", self.section_id, self.unit_id)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.section_id, self.unit_id)
    }
}

impl FromStr for CompositeKey {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.rsplitn(3, ':');
        let unit = parts.next();
        let section = parts.next();
        let group = parts.next();

        match (group, section, unit) {
            (Some(group), Some(section), Some(unit)) if !group.is_empty() => {
                let section_id = section.parse().map_err(|_| {
                    TranslationError::InvalidInput(format!("无效的章节编号: {}", s))
                })?;
                let unit_id = unit.parse().map_err(|_| {
                    TranslationError::InvalidInput(format!("无效的单元编号: {}", s))
                })?;
                Ok(Self::new(group, section_id, unit_id))
            }
            _ => Err(TranslationError::InvalidInput(format!(
                "复合键格式应为 group:section:unit, 实际为: {}",
                s
            ))),
        }
    }
}

impl Serialize for CompositeKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompositeKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 一条待翻译记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    pub key: CompositeKey,
    /// 原始的传述者字段，导出时原样保留
    pub attribution: String,
    pub source_text: String,
}

impl TranslationUnit {
    /// 由传述者与正文合成待翻译文本，永远不为 null
    ///
    /// 两者都存在时拼接后整体去除首尾空白；只有一个时原样返回。
    pub fn synthesize_text(attribution: &str, body: &str) -> String {
        match (attribution.is_empty(), body.is_empty()) {
            (false, false) => format!("{} {}", attribution, body).trim().to_string(),
            (true, false) => body.to_string(),
            (false, true) => attribution.to_string(),
            (true, true) => String::new(),
        }
    }
}

/// 置信度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    #[default]
    High,
    Medium,
    Low,
}

/// 译文质量标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Quality {
    pub confidence: Confidence,
    pub needs_review: bool,
}

/// 一条译文输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRecord {
    pub key: CompositeKey,
    pub narrator: String,
    pub text: String,
    pub quality: Quality,
}

impl TranslatedRecord {
    pub fn new(unit: &TranslationUnit, text: String) -> Self {
        Self {
            key: unit.key.clone(),
            narrator: unit.attribution.clone(),
            text,
            quality: Quality::default(),
        }
    }

    pub fn to_entry(&self) -> OutputEntry {
        OutputEntry {
            narrator: self.narrator.clone(),
            text: self.text.clone(),
            hadith_id: self.key.unit_id,
            chapter_id: self.key.section_id,
            quality: self.quality,
        }
    }
}

/// 输出文件中的一条记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    #[serde(default)]
    pub narrator: String,
    pub text: String,
    pub hadith_id: u64,
    pub chapter_id: u64,
    #[serde(default)]
    pub quality: Quality,
}

/// group_id → { "section:unit" → 译文 }
pub type OutputMapping = BTreeMap<String, BTreeMap<String, OutputEntry>>;

/// 将记录合并进输出映射，返回新增条目数；已有键被覆盖而不是重复
pub fn merge_records(mapping: &mut OutputMapping, records: &[TranslatedRecord]) -> usize {
    let mut inserted = 0;
    for record in records {
        let group = mapping.entry(record.key.group_id.clone()).or_default();
        if group
            .insert(record.key.local_key(), record.to_entry())
            .is_none()
        {
            inserted += 1;
        }
    }
    inserted
}
