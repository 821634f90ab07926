//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, EchoPolicy, StorageBackend, TranslatorConfig};

use crate::translation::error::{TranslationError, TranslationResult};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 15;
    pub const DEFAULT_MAX_PARALLEL: usize = 3;
    pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(500);

    // 重试策略
    pub const DEFAULT_MAX_RETRIES: usize = 5;
    pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(30);
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    // 默认API设置
    pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
    pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;
    pub const DEFAULT_MAX_TOKENS: u32 = 4000;

    // 请求内文本之间的分隔
    pub const BATCH_SEPARATOR: &str = "\n\n---\n\n";

    // 目录布局
    pub const DEFAULT_BOOKS_PATH: &str = "data/books";
    pub const OUTPUT_DIR_NAME: &str = "output";
    pub const CHECKPOINTS_DIR_NAME: &str = "checkpoints";
    pub const DATABASE_FILE_NAME: &str = "hadith_translator.redb";
    pub const CHECKPOINT_FILE_SUFFIX: &str = "_api_checkpoint.json";
    pub const OUTPUT_FILE_NAME: &str = "all_translations.json";
    pub const LOCK_FILE_SUFFIX: &str = ".lock";

    // 语料库描述文件
    pub const GROUP_DESCRIPTOR: &str = "metadata.json";
    pub const FLAT_SECTION_FILE: &str = "all.json";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "hadith-translator.toml",
        "config.toml",
        "hadith-translator.json",
        "~/.config/hadith-translator/config.toml",
    ];
}

/// 目标语言
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Language {
    /// 任务分区键，同时用作检查点文件名
    pub id: &'static str,
    pub name: &'static str,
    pub native_name: &'static str,
    pub code: &'static str,
}

/// 支持的八种目标语言
pub const LANGUAGES: &[Language] = &[
    Language { id: "turkish", name: "Turkish", native_name: "Türkçe", code: "tr" },
    Language { id: "french", name: "French", native_name: "Français", code: "fr" },
    Language { id: "indonesian", name: "Indonesian", native_name: "Bahasa Indonesia", code: "id" },
    Language { id: "urdu", name: "Urdu", native_name: "اردو", code: "ur" },
    Language { id: "bengali", name: "Bengali", native_name: "বাংলা", code: "bn" },
    Language { id: "german", name: "German", native_name: "Deutsch", code: "de" },
    Language { id: "spanish", name: "Spanish", native_name: "Español", code: "es" },
    Language { id: "russian", name: "Russian", native_name: "Русский", code: "ru" },
];

/// 按 id 或 ISO 代码查找语言
pub fn find_language(key: &str) -> Option<&'static Language> {
    let key = key.trim().to_lowercase();
    LANGUAGES.iter().find(|lang| lang.id == key || lang.code == key)
}

/// 查找语言，未知语言视为配置错误
pub fn require_language(key: &str) -> TranslationResult<&'static Language> {
    find_language(key).ok_or_else(|| {
        TranslationError::ConfigError(format!(
            "未知语言: {} (可选: {})",
            key,
            LANGUAGES.iter().map(|l| l.id).collect::<Vec<_>>().join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_language_by_id_and_code() {
        assert_eq!(find_language("turkish").map(|l| l.code), Some("tr"));
        assert_eq!(find_language("DE").map(|l| l.id), Some("german"));
        assert!(find_language("klingon").is_none());
    }

    #[test]
    fn test_require_language_error() {
        let err = require_language("latin").unwrap_err();
        assert!(matches!(err, TranslationError::ConfigError(_)));
        assert!(err.to_string().contains("latin"));
    }

    #[test]
    fn test_language_table() {
        assert_eq!(LANGUAGES.len(), 8);
        let mut codes: Vec<_> = LANGUAGES.iter().map(|l| l.code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), 8);
    }
}
