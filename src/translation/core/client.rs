//! 翻译客户端
//!
//! 将输入切分为批次，以有限并发发送给后端，按批次序号重组结果。
//! 单个批次的失败永远不会向上传播：重试耗尽或遇到不可重试错误时，
//! 该批次回退为原文。

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use super::backend::{ServiceRequest, TranslationBackend};
use super::openai::OpenAiBackend;
use crate::translation::config::{Language, TranslatorConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{parse_numbered_response, partition, ParsedBatch, TextBatch};

/// 有界重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每个批次的最大尝试次数（含首次）
    pub max_attempts: usize,
    /// 两次尝试之间的等待时间
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// 第 `attempt` 次失败后的等待时间，固定间隔
    pub fn delay_for(&self, _attempt: usize) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::translation::config::constants;
        Self::new(constants::DEFAULT_MAX_RETRIES, constants::DEFAULT_RETRY_BACKOFF)
    }
}

/// 客户端参数
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub batch_size: usize,
    pub max_parallel: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientOptions {
    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_parallel: config.max_parallel,
            batch_delay: config.batch_delay(),
            request_timeout: config.request_timeout(),
            retry: RetryPolicy::new(config.max_retries, config.retry_backoff()),
        }
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&TranslatorConfig::default())
    }
}

/// 一次 `translate` 调用的详细结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationOutput {
    /// 与输入等长、按位置对应
    pub texts: Vec<String>,
    /// 为 true 的位置是原文回退
    pub fallback: Vec<bool>,
    /// 实际发出的请求数，包括重试
    pub api_calls: u64,
    pub tokens: u64,
}

impl TranslationOutput {
    pub fn fallback_count(&self) -> usize {
        self.fallback.iter().filter(|f| **f).count()
    }
}

struct BatchResult {
    index: usize,
    parsed: ParsedBatch,
    api_calls: u64,
    tokens: u64,
}

/// 翻译客户端
#[derive(Clone)]
pub struct TranslationClient {
    backend: Arc<dyn TranslationBackend>,
    options: ClientOptions,
}

impl TranslationClient {
    pub fn new(backend: Arc<dyn TranslationBackend>, options: ClientOptions) -> Self {
        Self { backend, options }
    }

    /// 使用 OpenAI 兼容后端创建客户端，缺少密钥时返回配置错误
    pub fn from_config(config: &TranslatorConfig) -> TranslationResult<Self> {
        let backend = OpenAiBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend), ClientOptions::from_config(config)))
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// 翻译一组文本，输出与输入等长且顺序一致
    pub async fn translate(&self, texts: &[String], language: &Language) -> Vec<String> {
        self.translate_detailed(texts, language).await.texts
    }

    /// 翻译并返回回退标记与计数
    pub async fn translate_detailed(
        &self,
        texts: &[String],
        language: &Language,
    ) -> TranslationOutput {
        if texts.is_empty() {
            return TranslationOutput::default();
        }

        let batches = partition(texts, self.options.batch_size);
        let batch_count = batches.len();
        tracing::debug!(
            "[{}] 翻译 {} 条文本: {} 个批次, 并发 {}",
            self.backend.name(),
            texts.len(),
            batch_count,
            self.options.max_parallel
        );

        let semaphore = Arc::new(Semaphore::new(self.options.max_parallel.max(1)));

        let tasks: Vec<_> = batches
            .into_iter()
            .map(|batch| {
                let semaphore = Arc::clone(&semaphore);
                let backend = Arc::clone(&self.backend);
                let options = self.options.clone();
                let language_name = language.name.to_string();

                async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            tracing::error!("获取并发许可失败: {}, 批次 {} 回退为原文", e, batch.index + 1);
                            return BatchResult {
                                index: batch.index,
                                parsed: ParsedBatch::echo(&batch.texts),
                                api_calls: 0,
                                tokens: 0,
                            };
                        }
                    };

                    let is_last = batch.index + 1 == batch_count;
                    let result =
                        Self::translate_batch_with_retry(backend.as_ref(), batch, language_name, &options)
                            .await;

                    // 批次间延迟，持有许可以限制速率；最后一个批次之后不再等待
                    if !is_last && !options.batch_delay.is_zero() {
                        sleep(options.batch_delay).await;
                    }

                    result
                }
            })
            .collect();

        let mut results = join_all(tasks).await;
        results.sort_by_key(|r| r.index);

        let mut output = TranslationOutput {
            texts: Vec::with_capacity(texts.len()),
            fallback: Vec::with_capacity(texts.len()),
            ..TranslationOutput::default()
        };
        for result in results {
            output.texts.extend(result.parsed.texts);
            output.fallback.extend(result.parsed.fallback);
            output.api_calls += result.api_calls;
            output.tokens += result.tokens;
        }

        let fallbacks = output.fallback_count();
        if fallbacks > 0 {
            tracing::warn!("{}/{} 条文本回退为原文", fallbacks, texts.len());
        }

        output
    }

    /// 带重试的单批次翻译
    async fn translate_batch_with_retry(
        backend: &dyn TranslationBackend,
        batch: TextBatch,
        language_name: String,
        options: &ClientOptions,
    ) -> BatchResult {
        let batch_number = batch.index + 1;
        let request = ServiceRequest {
            texts: batch.texts.clone(),
            language_name,
        };

        let policy = options.retry;
        let mut api_calls = 0;
        let mut last_error: Option<TranslationError> = None;

        for attempt in 1..=policy.max_attempts {
            api_calls += 1;

            let error = match timeout(options.request_timeout, backend.complete(request.clone())).await
            {
                Ok(Ok(reply)) => {
                    if attempt > 1 {
                        tracing::info!("批次 {} 在第 {} 次尝试后成功", batch_number, attempt);
                    }
                    return BatchResult {
                        index: batch.index,
                        parsed: parse_numbered_response(&reply.content, &batch.texts),
                        api_calls,
                        tokens: reply.tokens,
                    };
                }
                Ok(Err(e)) => e,
                Err(_) => TranslationError::TimeoutError(format!(
                    "批次 {} 请求超时: {:.1}秒",
                    batch_number,
                    options.request_timeout.as_secs_f32()
                )),
            };

            if !error.is_retryable() {
                tracing::error!("批次 {} 出现不可重试错误: {}", batch_number, error);
                last_error = Some(error);
                break;
            }

            if attempt < policy.max_attempts {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    "批次 {} 失败，{:.1}秒后进行第 {} 次尝试: {}",
                    batch_number,
                    delay.as_secs_f32(),
                    attempt + 1,
                    error
                );
                sleep(delay).await;
            }
            last_error = Some(error);
        }

        if let Some(error) = last_error {
            tracing::warn!(
                "批次 {} 放弃翻译，{} 条文本回退为原文: {}",
                batch_number,
                batch.len(),
                error
            );
        }

        BatchResult {
            index: batch.index,
            parsed: ParsedBatch::echo(&batch.texts),
            api_calls,
            tokens: 0,
        }
    }
}
