// 对象存储 API 模块

pub mod client;
pub mod types;

pub use client::ObjectStorageClient;
pub use types::*;
