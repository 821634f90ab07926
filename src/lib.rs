//! # Hadith Translator Library
//!
//! 将圣训语料库批量翻译为八种目标语言，支持检查点续传。
//!
//! ## 模块组织
//!
//! - `env` - 类型化的环境变量
//! - `translation` - 语料库提取、翻译客户端、检查点存储与任务控制
//! - `web` - JSON 控制接口（可选）

pub mod env;
pub mod translation;
#[cfg(feature = "web")]
pub mod web;
