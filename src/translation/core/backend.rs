//! 外部翻译服务边界
//!
//! 客户端只依赖 [`TranslationBackend`]，真实实现是 OpenAI 兼容接口，
//! 测试中可以替换为任意桩实现。

use futures::future::BoxFuture;

use crate::translation::error::TranslationResult;

/// 一次服务请求：一个批次的原文与目标语言名称
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRequest {
    pub texts: Vec<String>,
    /// 目标语言的英文名称，例如 `Turkish`
    pub language_name: String,
}

/// 服务的原始回复
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceReply {
    /// 编号行格式的文本，由客户端解析
    pub content: String,
    /// 服务报告的 token 用量
    pub tokens: u64,
}

impl ServiceReply {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tokens: 0,
        }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }
}

/// 外部翻译服务
///
/// 失败时返回的错误通过 `is_retryable()` 区分可重试与致命错误。
pub trait TranslationBackend: Send + Sync {
    /// 后端名称，用于日志
    fn name(&self) -> &str;

    /// 发送一个批次
    fn complete(&self, request: ServiceRequest) -> BoxFuture<'_, TranslationResult<ServiceReply>>;
}
