// API处理器模块

pub mod uploads;

pub use uploads::*;

use axum::Json;
use serde::Serialize;

/// 参数错误
pub const CODE_INVALID_REQUEST: i32 = 1001;
/// 本地文件读取失败
pub const CODE_SCAN_FAILED: i32 = 1002;
/// 队列容量不足
pub const CODE_TOO_MANY_FILES: i32 = 2001;
/// 文件超过大小上限
pub const CODE_FILE_TOO_LARGE: i32 = 2002;
/// 条目不存在
pub const CODE_NOT_FOUND: i32 = 3001;
/// 条目状态不允许该操作
pub const CODE_INVALID_STATE: i32 = 3002;

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: String) -> Self {
        Self {
            code,
            message,
            data: None,
        }
    }
}

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// GET /api/v1/health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
    })
}
