// 上传模块错误类型

use thiserror::Error;

/// 入队被拒绝的原因（不会产生任何队列状态）
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// 超过队列容量
    #[error("一次最多只能上传 {max} 个文件（当前 {active} 个排队或上传中，本次 {requested} 个）")]
    TooManyFiles {
        active: usize,
        requested: usize,
        max: usize,
    },
    /// 单个文件超过大小上限
    #[error("文件 {name} 超过最大上传大小 ({limit})")]
    FileTooLarge {
        name: String,
        size: u64,
        limit: String,
    },
}

/// 对象存储请求错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("网络请求失败: {0}")]
    Http(#[from] reqwest::Error),
    #[error("服务端返回错误: status={status}, body={body}")]
    Status { status: u16, body: String },
    #[error("读取本地文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("存储配置不完整: {0}")]
    Config(String),
}
