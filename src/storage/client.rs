// 对象存储客户端
//
// 只覆盖上传需要的两个接口：
// - 申请预签名写入地址（同时返回同名对象是否存在）
// - 查询桶信息（上传完成后刷新用量）

use crate::config::StorageConfig;
use crate::storage::types::{ApiErrorBody, BucketInfo, HttpMethod, ObjectUrl, ObjectUrlRequest};
use crate::uploader::error::StorageError;
use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info};

/// 对象存储客户端
#[derive(Debug, Clone)]
pub struct ObjectStorageClient {
    /// HTTP 客户端
    client: Client,
    /// API 根地址，如 https://api.linode.com/v4
    api_root: String,
    /// 集群 ID
    cluster: String,
    /// 桶名
    bucket: String,
    /// 访问令牌
    token: Option<String>,
}

impl ObjectStorageClient {
    /// 从配置创建客户端
    pub fn new(config: &StorageConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        let token = config.resolve_token();
        info!(
            "初始化对象存储客户端: api_root={}, cluster={}, bucket={}, token={}",
            config.api_root,
            config.cluster,
            config.bucket,
            if token.is_some() { "已配置" } else { "未配置" }
        );

        Ok(Self {
            client,
            api_root: config.api_root.trim_end_matches('/').to_string(),
            cluster: config.cluster.clone(),
            bucket: config.bucket.clone(),
            token,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn bucket_url(&self) -> String {
        format!(
            "{}/object-storage/buckets/{}/{}",
            self.api_root,
            urlencoding::encode(&self.cluster),
            urlencoding::encode(&self.bucket)
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// 申请预签名地址
    ///
    /// # 参数
    /// * `name` - 桶内对象的完整路径
    /// * `method` - 地址用途
    /// * `content_type` - PUT 时需要与上传请求一致
    pub async fn get_object_url(
        &self,
        name: &str,
        method: HttpMethod,
        content_type: Option<&str>,
    ) -> Result<ObjectUrl, StorageError> {
        if self.cluster.is_empty() || self.bucket.is_empty() {
            return Err(StorageError::Config("cluster 或 bucket 未设置".to_string()));
        }

        let url = format!("{}/object-url", self.bucket_url());
        let body = ObjectUrlRequest {
            name,
            method,
            content_type,
        };
        debug!("申请预签名地址: name={}, method={:?}", name, method);

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = check_response(response).await?;
        let object_url: ObjectUrl = response.json().await?;

        debug!("预签名地址: name={}, exists={}", name, object_url.exists);
        Ok(object_url)
    }

    /// 查询桶信息
    pub async fn get_bucket(&self) -> Result<BucketInfo, StorageError> {
        let response = self
            .authorized(self.client.get(self.bucket_url()))
            .send()
            .await?;
        let response = check_response(response).await?;
        Ok(response.json().await?)
    }
}

/// 非 2xx 响应转为错误，尽量取出 API 给出的原因
pub(crate) async fn check_response(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ApiErrorBody>(&text) {
        Ok(parsed) if !parsed.errors.is_empty() => parsed.reasons(),
        _ => text,
    };
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}
