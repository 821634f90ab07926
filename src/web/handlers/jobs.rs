//! 任务控制 API 处理器

use std::sync::Arc;

use axum::{
    extract::{Json as ExtractJson, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};

use crate::translation::{find_language, LanguageSummary};
use crate::web::types::{
    api_error, error_status, AckResponse, ApiError, AppState, StartRequest, StatusResponse,
};

/// 启动翻译任务
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    request: Option<ExtractJson<StartRequest>>,
) -> Result<Json<AckResponse>, ApiError> {
    let language = request
        .map(|ExtractJson(req)| req.language)
        .unwrap_or_else(|| "turkish".to_string());

    match state.registry.start(&language) {
        // 任务在后台运行，句柄不需要等待
        Ok(_handle) => {
            tracing::info!("api/start: {}", language);
            Ok(Json(AckResponse::for_language(language)))
        }
        Err(e) => {
            tracing::warn!("api/start 被拒绝: {}", e);
            Err(api_error(error_status(&e, StatusCode::BAD_REQUEST), e.to_string()))
        }
    }
}

/// 停止所有运行中的任务
pub async fn stop_jobs(State(state): State<Arc<AppState>>) -> Result<Json<AckResponse>, ApiError> {
    let stopped = state
        .registry
        .stop()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(AckResponse {
        ok: true,
        language: None,
        stopped: Some(stopped),
    }))
}

/// 获取任务状态
pub async fn job_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiError> {
    let jobs = state
        .registry
        .statuses()
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(StatusResponse {
        running: jobs.iter().any(|job| job.running),
        jobs,
    }))
}

/// 列出支持的语言与翻译数量
pub async fn list_languages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LanguageSummary>>, ApiError> {
    state
        .registry
        .languages()
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// 重置某个语言的检查点与译文
pub async fn reset_language(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
) -> Result<Json<AckResponse>, ApiError> {
    match state.registry.reset(&language) {
        Ok(()) => {
            tracing::info!("api/reset: {}", language);
            Ok(Json(AckResponse::for_language(language)))
        }
        Err(e) => Err(api_error(error_status(&e, StatusCode::NOT_FOUND), e.to_string())),
    }
}

/// 导出某个语言的译文，作为附件下载
pub async fn export_language(
    State(state): State<Arc<AppState>>,
    Path(language): Path<String>,
) -> Result<Response, ApiError> {
    let mapping = state
        .registry
        .export(&language)
        .map_err(|e| api_error(error_status(&e, StatusCode::NOT_FOUND), e.to_string()))?;

    if mapping.is_empty() {
        return Err(api_error(StatusCode::NOT_FOUND, "该语言没有任何译文"));
    }

    let body = serde_json::to_string_pretty(&mapping)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let code = find_language(&language).map(|l| l.code).unwrap_or("xx");
    let disposition = format!("attachment; filename=hadith_translations_{}.json", code);

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
