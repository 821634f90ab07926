//! Web 模块的数据类型定义

use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::translation::{JobRegistry, JobStatus, TranslationError};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub registry: JobRegistry,
}

/// 启动请求
#[derive(Debug, Deserialize)]
pub struct StartRequest {
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "turkish".to_string()
}

/// 通用成功响应
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stopped: Option<usize>,
}

impl AckResponse {
    pub fn for_language(language: impl Into<String>) -> Self {
        Self {
            ok: true,
            language: Some(language.into()),
            stopped: None,
        }
    }
}

/// 状态响应
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub running: bool,
    pub jobs: Vec<JobStatus>,
}

/// 错误响应
pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// 构造错误响应
pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(serde_json::json!({
            "error": true,
            "message": message.into()
        })),
    )
}

/// 按错误类型选择状态码；未知语言在路径参数中时使用 404
pub fn error_status(error: &TranslationError, unknown_language: StatusCode) -> StatusCode {
    match error {
        TranslationError::ConfigError(_) => unknown_language,
        TranslationError::ConcurrencyError(_) => StatusCode::CONFLICT,
        TranslationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
