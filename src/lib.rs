// Object Storage Bucket Uploader Library
// 对象存储上传队列核心库

// 配置管理模块
pub mod config;

// 日志系统
pub mod logging;

// Web服务器模块
pub mod server;

// 对象存储API模块
pub mod storage;

// 上传引擎模块
pub mod uploader;

// 公共模块（防抖、进度节流）
pub mod common;

#[cfg(test)]
mod test_support;

// 导出常用类型
pub use config::AppConfig;
pub use server::AppState;
pub use storage::{BucketInfo, ObjectStorageClient};
pub use uploader::{
    reduce, AdmissionError, QueueCounts, QueueState, UploadAction, UploadFile, UploadItem,
    UploadManager, UploadStatus,
};
