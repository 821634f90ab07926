//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 检查点后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 每种语言一个 JSON 检查点文件和一个输出文件
    #[default]
    File,
    /// 嵌入式 redb 数据库
    Redb,
}

/// 译文与原文相同时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EchoPolicy {
    /// 只跳过客户端标记为回退的输出
    #[default]
    FallbackOnly,
    /// 同时跳过任何与原文（去除首尾空白后）相同的输出
    SkipIdentical,
}

/// 翻译任务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslatorConfig {
    // 目录配置
    pub data_dir: PathBuf,
    pub books_path: PathBuf,
    pub output_dir: Option<PathBuf>,
    pub checkpoints_dir: Option<PathBuf>,

    // API 配置
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// 只从 `OPENAI_API_KEY` 读取，配置文件中的同名字段被忽略
    #[serde(skip)]
    pub api_key: Option<String>,

    // 批次配置
    pub batch_size: usize,
    pub max_parallel: usize,
    pub batch_delay_ms: u64,
    pub request_timeout_secs: u64,

    // 重试配置
    pub max_retries: usize,
    pub retry_backoff_secs: u64,

    // 存储配置
    pub storage_backend: StorageBackend,
    pub database_path: Option<PathBuf>,
    pub echo_policy: EchoPolicy,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            books_path: PathBuf::from(constants::DEFAULT_BOOKS_PATH),
            output_dir: None,
            checkpoints_dir: None,

            api_url: constants::DEFAULT_API_URL.to_string(),
            model: constants::DEFAULT_MODEL.to_string(),
            temperature: constants::DEFAULT_TEMPERATURE,
            max_tokens: constants::DEFAULT_MAX_TOKENS,
            api_key: None,

            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_parallel: constants::DEFAULT_MAX_PARALLEL,
            batch_delay_ms: constants::DEFAULT_BATCH_DELAY.as_millis() as u64,
            request_timeout_secs: constants::DEFAULT_REQUEST_TIMEOUT.as_secs(),

            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_backoff_secs: constants::DEFAULT_RETRY_BACKOFF.as_secs(),

            storage_backend: StorageBackend::File,
            database_path: None,
            echo_policy: EchoPolicy::FallbackOnly,
        }
    }
}

impl TranslatorConfig {
    /// 以指定数据目录创建默认配置
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_parallel == 0 {
            return Err(TranslationError::ConfigError("最大并发数不能为0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(TranslationError::ConfigError("最大尝试次数不能为0".to_string()));
        }

        if self.request_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时必须大于0".to_string()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(TranslationError::ConfigError(format!(
                "temperature 超出范围: {}",
                self.temperature
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{storage, translation, EnvVar};

        if let Some(data_dir) = storage::DataDir::get_if_set() {
            self.data_dir = data_dir;
        }

        if let Some(books_path) = storage::BooksPath::get_if_set() {
            self.books_path = books_path;
        }

        if let Some(backend) = storage::Backend::get_if_set() {
            self.storage_backend = if backend == "redb" {
                StorageBackend::Redb
            } else {
                StorageBackend::File
            };
        }

        if let Some(path) = storage::DatabasePath::get_if_set() {
            self.database_path = Some(path);
        }

        if let Some(api_key) = translation::ApiKey::get_if_set() {
            self.api_key = Some(api_key);
        }

        if let Some(api_url) = translation::ApiUrl::get_if_set() {
            tracing::info!("环境变量覆盖 API URL: {}", api_url);
            self.api_url = api_url;
        }

        if let Some(model) = translation::Model::get_if_set() {
            self.model = model;
        }

        if let Some(batch_size) = translation::BatchSize::get_if_set() {
            self.batch_size = batch_size;
        }

        if let Some(max_parallel) = translation::MaxParallel::get_if_set() {
            self.max_parallel = max_parallel;
        }

        if let Some(max_retries) = translation::MaxRetries::get_if_set() {
            self.max_retries = max_retries;
        }

        if let Some(backoff) = translation::RetryBackoff::get_if_set() {
            self.retry_backoff_secs = backoff.as_secs();
        }

        if let Some(delay) = translation::BatchDelay::get_if_set() {
            self.batch_delay_ms = delay.as_millis() as u64;
        }

        if let Some(timeout) = translation::RequestTimeout::get_if_set() {
            self.request_timeout_secs = timeout.as_secs();
        }
    }

    /// 语料库根目录
    pub fn books_dir(&self) -> PathBuf {
        self.data_dir.join(&self.books_path)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(constants::OUTPUT_DIR_NAME))
    }

    pub fn checkpoints_dir(&self) -> PathBuf {
        self.checkpoints_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(constants::CHECKPOINTS_DIR_NAME))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(constants::DATABASE_FILE_NAME))
    }

    /// 转换为Duration类型
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslatorConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器：.env → 配置文件 → 环境变量 → 验证
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 从指定文件创建，仍然应用环境变量覆盖
    pub fn from_file(path: &Path) -> TranslationResult<Self> {
        Self::load_dotenv();
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn into_config(self) -> TranslatorConfig {
        self.config
    }

    /// 查找并加载配置文件
    fn load_config() -> TranslationResult<TranslatorConfig> {
        Self::load_dotenv();

        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            let candidate = Path::new(expanded_path.as_ref());
            if candidate.exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(candidate);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslatorConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &Path) -> TranslationResult<TranslatorConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TranslationError::ConfigError(format!("读取配置文件失败 {}: {}", path.display(), e))
        })?;

        if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &Path) -> TranslationResult<()> {
        let config = TranslatorConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
