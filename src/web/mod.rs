//! Web 服务器模块
//!
//! 为翻译任务提供 JSON 控制接口：启动、停止、状态、重置与导出

pub mod config;
pub mod handlers;
pub mod routes;
pub mod types;

pub use config::*;
pub use routes::*;
pub use types::*;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;

use crate::translation::{JobRegistry, TranslationError, TranslationResult};

/// Web 服务器
pub struct WebServer {
    config: WebConfig,
    registry: JobRegistry,
}

impl WebServer {
    /// 创建新的 Web 服务器
    pub fn new(config: WebConfig, registry: JobRegistry) -> Self {
        Self { config, registry }
    }

    /// 启动 Web 服务器，直到进程退出
    pub async fn start(&self) -> TranslationResult<()> {
        let app_state = Arc::new(AppState {
            registry: self.registry.clone(),
        });

        let app = create_router(app_state);

        let address = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| TranslationError::ConfigError(format!("绑定地址失败 {}: {}", address, e)))?;

        tracing::info!("控制接口已启动: http://{}", address);

        axum::serve(listener, app)
            .await
            .map_err(|e| TranslationError::InternalError(format!("服务器错误: {}", e)))?;

        Ok(())
    }
}

/// 创建路由器
pub fn create_router(app_state: Arc<AppState>) -> Router {
    create_routes()
        .with_state(app_state)
        // 添加CORS支持
        .layer(CorsLayer::permissive())
}
