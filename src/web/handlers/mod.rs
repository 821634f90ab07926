//! Web 路由处理器

pub mod jobs;

pub use jobs::*;
