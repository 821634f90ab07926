//! Web 路由定义

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::web::{handlers::*, types::AppState};

/// 创建控制接口路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/start", post(start_job))
        .route("/api/stop", post(stop_jobs))
        .route("/api/status", get(job_status))
        .route("/api/languages", get(list_languages))
        .route("/api/reset/:language", post(reset_language))
        .route("/api/export/:language", get(export_language))
}
