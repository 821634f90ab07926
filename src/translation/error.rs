//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误（缺少凭据、未知语言等），任务不会启动
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 语料库不存在或为空
    #[error("语料库不可用: {0}")]
    CorpusUnavailable(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 速率限制错误
    #[error("请求速率过快，已达到限制")]
    RateLimitExceeded,

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 服务暂时不可用（5xx）
    #[error("翻译服务暂时不可用: {0}")]
    ServiceUnavailable(String),

    /// 翻译服务错误（不可重试）
    #[error("翻译服务错误: {0}")]
    TranslationServiceError(String),

    /// 检查点或输出写入失败
    #[error("持久化错误: {0}")]
    PersistenceError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 并发错误（同一语言重复启动、运行中重置）
    #[error("并发操作错误: {0}")]
    ConcurrencyError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::RateLimitExceeded => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::NetworkError(_) => true,
            TranslationError::ServiceUnavailable(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::CorpusUnavailable(_) => false,
            TranslationError::TranslationServiceError(_) => false,
            TranslationError::PersistenceError(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::ConcurrencyError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::CorpusUnavailable(_) => ErrorSeverity::Critical,
            TranslationError::NetworkError(_) => ErrorSeverity::Warning,
            TranslationError::RateLimitExceeded => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::ServiceUnavailable(_) => ErrorSeverity::Warning,
            TranslationError::TranslationServiceError(_) => ErrorSeverity::Error,
            TranslationError::PersistenceError(_) => ErrorSeverity::Critical,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ConcurrencyError(_) => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::CorpusUnavailable(_) => ErrorCategory::Corpus,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::RateLimitExceeded => ErrorCategory::RateLimit,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ServiceUnavailable(_) => ErrorCategory::Service,
            TranslationError::TranslationServiceError(_) => ErrorCategory::Service,
            TranslationError::PersistenceError(_) => ErrorCategory::Persistence,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ConcurrencyError(_) => ErrorCategory::Concurrency,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 创建带上下文的错误
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        let new_msg = match &self {
            TranslationError::RateLimitExceeded => return TranslationError::RateLimitExceeded,
            other => format!("{} (上下文: {})", other.message(), context),
        };

        match &mut self {
            TranslationError::ConfigError(ref mut msg)
            | TranslationError::CorpusUnavailable(ref mut msg)
            | TranslationError::NetworkError(ref mut msg)
            | TranslationError::TimeoutError(ref mut msg)
            | TranslationError::ServiceUnavailable(ref mut msg)
            | TranslationError::TranslationServiceError(ref mut msg)
            | TranslationError::PersistenceError(ref mut msg)
            | TranslationError::SerializationError(ref mut msg)
            | TranslationError::ConcurrencyError(ref mut msg)
            | TranslationError::InvalidInput(ref mut msg)
            | TranslationError::InternalError(ref mut msg) => *msg = new_msg,
            TranslationError::RateLimitExceeded => {}
        }

        self
    }

    /// 错误的原始消息（不含类别前缀）
    fn message(&self) -> String {
        match self {
            TranslationError::ConfigError(msg)
            | TranslationError::CorpusUnavailable(msg)
            | TranslationError::NetworkError(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::ServiceUnavailable(msg)
            | TranslationError::TranslationServiceError(msg)
            | TranslationError::PersistenceError(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::ConcurrencyError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::InternalError(msg) => msg.clone(),
            TranslationError::RateLimitExceeded => self.to_string(),
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Corpus,
    Network,
    RateLimit,
    Timeout,
    Service,
    Persistence,
    Serialization,
    Concurrency,
    Input,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::PersistenceError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<tempfile::PersistError> for TranslationError {
    fn from(error: tempfile::PersistError) -> Self {
        TranslationError::PersistenceError(format!("原子写入失败: {}", error))
    }
}

impl From<redb::Error> for TranslationError {
    fn from(error: redb::Error) -> Self {
        TranslationError::PersistenceError(format!("数据库错误: {}", error))
    }
}

/// redb 的各阶段错误都能转换为 `redb::Error`
macro_rules! impl_from_redb {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for TranslationError {
                fn from(error: $ty) -> Self {
                    TranslationError::from(redb::Error::from(error))
                }
            }
        )*
    };
}

impl_from_redb!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
);

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if error.is_connect() || error.is_request() || error.is_body() {
            TranslationError::NetworkError(error.to_string())
        } else if error.is_decode() {
            TranslationError::TranslationServiceError(format!("响应解析失败: {}", error))
        } else {
            TranslationError::InternalError(error.to_string())
        }
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录错误
    pub fn log_error(error: &TranslationError) {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(TranslationError::RateLimitExceeded.is_retryable());
        assert!(TranslationError::TimeoutError("slow".into()).is_retryable());
        assert!(TranslationError::ServiceUnavailable("502".into()).is_retryable());

        assert!(!TranslationError::ConfigError("no key".into()).is_retryable());
        assert!(!TranslationError::TranslationServiceError("400".into()).is_retryable());
        assert!(!TranslationError::PersistenceError("disk".into()).is_retryable());
    }

    #[test]
    fn test_severity_and_category() {
        let err = TranslationError::CorpusUnavailable("missing".into());
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert_eq!(err.category(), ErrorCategory::Corpus);

        let err = TranslationError::RateLimitExceeded;
        assert_eq!(err.severity(), ErrorSeverity::Warning);
        assert_eq!(err.category(), ErrorCategory::RateLimit);
    }

    #[test]
    fn test_with_context() {
        let err = TranslationError::PersistenceError("写入失败".into()).with_context("turkish");
        let msg = err.to_string();
        assert!(msg.starts_with("持久化错误: 写入失败"));
        assert!(msg.contains("turkish"));

        // 速率限制没有消息体，保持不变
        let err = TranslationError::RateLimitExceeded.with_context("ignored");
        assert!(matches!(err, TranslationError::RateLimitExceeded));
    }
}
