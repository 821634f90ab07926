//! 翻译管道模块
//!
//! 语料库提取、批次切分与编号响应解析

pub mod batch;
pub mod extractor;

// 重新导出主要类型
pub use batch::{build_prompt, parse_numbered_response, partition, ParsedBatch, TextBatch};
pub use extractor::{Corpus, Group, Section, UnitExtractor};
