// 对象存储 API 数据类型

use serde::{Deserialize, Serialize};

/// 预签名地址的 HTTP 方法
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
}

/// 申请预签名地址的请求体
#[derive(Debug, Clone, Serialize)]
pub struct ObjectUrlRequest<'a> {
    /// 对象名（桶内完整路径）
    pub name: &'a str,
    pub method: HttpMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<&'a str>,
}

/// 预签名地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectUrl {
    /// 同名对象是否已存在
    pub exists: bool,
    /// 写入地址
    pub url: String,
}

/// 桶信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketInfo {
    pub label: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default)]
    pub hostname: String,
    /// 对象数量
    #[serde(default)]
    pub objects: u64,
    /// 总大小（字节）
    #[serde(default)]
    pub size: u64,
}

/// API 错误响应
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub errors: Vec<ApiErrorReason>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorReason {
    pub reason: String,
    #[serde(default)]
    pub field: Option<String>,
}

impl ApiErrorBody {
    /// 合并所有错误原因
    pub fn reasons(&self) -> String {
        self.errors
            .iter()
            .map(|e| match &e.field {
                Some(field) => format!("{}: {}", field, e.reason),
                None => e.reason.clone(),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_request_serialization() {
        let req = ObjectUrlRequest {
            name: "dir/a.txt",
            method: HttpMethod::Put,
            content_type: Some("text/plain"),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["name"], "dir/a.txt");
        assert_eq!(json["method"], "PUT");
        assert_eq!(json["content_type"], "text/plain");
    }

    #[test]
    fn test_api_error_reasons() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"errors":[{"reason":"Not found"},{"reason":"Invalid","field":"name"}]}"#,
        )
        .unwrap();
        assert_eq!(body.reasons(), "Not found; name: Invalid");
    }
}
