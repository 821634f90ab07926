//! 批次切分与编号协议
//!
//! 一个批次在请求中编码为 `[1] 文本 --- [2] 文本 ...`，服务按行返回
//! `[k] 译文`。解析按位置对齐，而不是按内容匹配。

use std::sync::OnceLock;

use regex::Regex;

use crate::translation::config::constants;

/// 一个待发送的批次
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBatch {
    /// 批次序号，用于重组
    pub index: usize,
    /// 首个文本在原输入中的位置
    pub start: usize,
    pub texts: Vec<String>,
}

impl TextBatch {
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }
}

/// 解析后的批次结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBatch {
    pub texts: Vec<String>,
    /// 为 true 的位置使用了原文补齐
    pub fallback: Vec<bool>,
}

impl ParsedBatch {
    /// 整批回退为原文
    pub fn echo(sources: &[String]) -> Self {
        Self {
            texts: sources.to_vec(),
            fallback: vec![true; sources.len()],
        }
    }

    pub fn fallback_count(&self) -> usize {
        self.fallback.iter().filter(|f| **f).count()
    }
}

/// 按 `batch_size` 切分输入，保持原有顺序
pub fn partition(texts: &[String], batch_size: usize) -> Vec<TextBatch> {
    let batch_size = batch_size.max(1);
    texts
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| TextBatch {
            index,
            start: index * batch_size,
            texts: chunk.to_vec(),
        })
        .collect()
}

/// 组合文本并添加 `[k]` 编号（从 1 开始）
pub fn build_prompt(texts: &[String]) -> String {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| format!("[{}] {}", i + 1, text))
        .collect::<Vec<_>>()
        .join(constants::BATCH_SEPARATOR)
}

/// 系统提示词
pub fn system_prompt(language_name: &str) -> String {
    format!(
        "You are a professional translator specializing in Islamic religious texts. \
         Translate the following English hadith texts to {}. \
         Maintain religious terminology accurately and preserve meaning precisely. \
         Keep narrator attributions if present. \
         Return translations in the same format, numbered [1], [2], etc. \
         Each translation should be on a separate line.",
        language_name
    )
}

fn marker_regex() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"^\[\d+\]\s*").ok())
        .as_ref()
}

fn strip_marker(line: &str) -> String {
    match marker_regex() {
        Some(marker) => marker.replace(line, "").trim().to_string(),
        None => line.to_string(),
    }
}

/// 解析编号响应
///
/// 空行与 `---` 分隔行被丢弃，其余每行去掉开头的 `[k]` 标记后按顺序
/// 对应输入。行数不足时用原文补齐并标记为回退，多余的行被截断。
pub fn parse_numbered_response(response: &str, sources: &[String]) -> ParsedBatch {
    let mut texts: Vec<String> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_separator(line))
        .map(strip_marker)
        .take(sources.len())
        .collect();

    let mut fallback = vec![false; texts.len()];

    if texts.len() < sources.len() {
        tracing::debug!(
            "响应行数不足: 期望 {}，实际 {}，用原文补齐",
            sources.len(),
            texts.len()
        );
        for source in &sources[texts.len()..] {
            texts.push(source.clone());
            fallback.push(true);
        }
    }

    ParsedBatch { texts, fallback }
}

fn is_separator(line: &str) -> bool {
    line.chars().all(|c| c == '-')
}
