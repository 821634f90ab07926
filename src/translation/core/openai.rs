//! OpenAI 兼容的 chat-completions 后端

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::backend::{ServiceReply, ServiceRequest, TranslationBackend};
use crate::translation::config::TranslatorConfig;
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::pipeline::batch::{build_prompt, system_prompt};

/// chat-completions 后端
pub struct OpenAiBackend {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiBackend {
    /// 根据配置创建后端；缺少 API 密钥时直接返回配置错误
    pub fn from_config(config: &TranslatorConfig) -> TranslationResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                TranslationError::ConfigError(
                    "未找到 API 密钥，请设置 OPENAI_API_KEY 环境变量".to_string(),
                )
            })?
            .to_string();

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("创建 HTTP 客户端失败: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn headers(&self) -> TranslationResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| TranslationError::ConfigError("API 密钥包含非法字符".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn send(&self, request: ServiceRequest) -> TranslationResult<ServiceReply> {
        let system = system_prompt(&request.language_name);
        let user = build_prompt(&request.texts);
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
        };

        let response = self
            .client
            .post(&self.api_url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::TranslationServiceError(format!("解析响应失败: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        let tokens = parsed.usage.map(|u| u.total_tokens).unwrap_or(0);

        Ok(ServiceReply {
            content: content.trim().to_string(),
            tokens,
        })
    }
}

impl TranslationBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    fn complete(&self, request: ServiceRequest) -> BoxFuture<'_, TranslationResult<ServiceReply>> {
        self.send(request).boxed()
    }
}

fn classify_status(status: StatusCode, body: String) -> TranslationError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        TranslationError::RateLimitExceeded
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        TranslationError::TimeoutError(format!("{}: {}", status, body))
    } else if status.is_server_error() {
        TranslationError::ServiceUnavailable(format!("{}: {}", status, body))
    } else {
        TranslationError::TranslationServiceError(format!("{}: {}", status, body))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}
