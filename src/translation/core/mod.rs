//! 翻译客户端核心模块
//!
//! ## 架构设计
//!
//! - **服务边界** (`backend.rs`): `TranslationBackend` trait，请求与回复类型
//! - **OpenAI 后端** (`openai.rs`): 基于 reqwest 的 chat-completions 实现
//! - **客户端** (`client.rs`): 批次切分、有限并发、重试与原文回退
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationClient (client.rs)
//!     ├── partition / parse_numbered_response (pipeline/batch.rs)
//!     └── dyn TranslationBackend (backend.rs)
//!             └── OpenAiBackend (openai.rs)
//! ```

pub mod backend;
pub mod client;
pub mod openai;

pub use backend::{ServiceReply, ServiceRequest, TranslationBackend};
pub use client::{ClientOptions, RetryPolicy, TranslationClient, TranslationOutput};
pub use openai::OpenAiBackend;
