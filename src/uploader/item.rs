// 上传队列条目定义
//
// 状态枚举 + 文件句柄 + 队列条目

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 未知类型文件的默认 MIME
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// 上传条目状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    /// 排队中
    Queued,
    /// 上传中
    InProgress,
    /// 目标已存在，等待用户确认覆盖
    OverwritePending,
    /// 已完成
    Finished,
    /// 已取消（保留状态，当前没有任何转换会设置它）
    Canceled,
    /// 失败
    Error,
}

impl UploadStatus {
    /// 是否为终态（同路径再次入队时会被替换）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Finished | UploadStatus::Canceled | UploadStatus::Error
        )
    }
}

/// 待上传的本地文件句柄
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadFile {
    /// 文件名（不含目录）
    pub name: String,
    /// 拖入文件夹时的相对路径，如 "/photos/2024/a.jpg"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    /// 本地文件路径
    pub local_path: PathBuf,
    /// 文件大小（字节）
    pub size: u64,
    /// 声明的 MIME 类型
    pub mime_type: String,
}

impl UploadFile {
    /// 创建文件句柄，MIME 类型按扩展名推断
    pub fn new(local_path: PathBuf, size: u64) -> Self {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_guess::from_path(&local_path)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        Self {
            name,
            relative_path: None,
            local_path,
            size,
            mime_type,
        }
    }

    /// 附带文件夹内相对路径
    pub fn with_relative_path(mut self, relative_path: impl Into<String>) -> Self {
        self.relative_path = Some(relative_path.into());
        self
    }

    /// 队列中的身份键：有相对路径用相对路径，否则用文件名
    pub fn path_or_file_name(&self) -> &str {
        self.relative_path.as_deref().unwrap_or(&self.name)
    }
}

/// 拼接对象存储中的完整目标路径
///
/// 相对路径以 `/` 开头时（文件来自拖入的文件夹）去掉首字符再拼接前缀
pub fn destination_path(prefix: &str, path: &str) -> String {
    let path = path.strip_prefix('/').unwrap_or(path);
    format!("{}{}", prefix, path)
}

/// 规范化目标前缀：去掉开头的斜杠，非空时保证以斜杠结尾
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.trim().trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

/// 上传队列条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadItem {
    /// 身份键（队列内唯一）
    pub path: String,
    /// 入队时绑定的目标前缀
    pub prefix: String,
    /// 状态
    pub status: UploadStatus,
    /// 完成百分比 [0, 100]
    pub percent_complete: f64,
    /// 已解析的写入地址
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    /// 文件句柄
    pub file: UploadFile,
}

impl UploadItem {
    /// 创建排队中的新条目
    pub fn new(file: UploadFile, prefix: impl Into<String>) -> Self {
        Self {
            path: file.path_or_file_name().to_string(),
            prefix: prefix.into(),
            status: UploadStatus::Queued,
            percent_complete: 0.0,
            resolved_url: None,
            file,
        }
    }

    /// 对象存储中的完整目标路径
    pub fn destination(&self) -> String {
        destination_path(&self.prefix, &self.path)
    }
}
