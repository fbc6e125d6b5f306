// 目标名称解析
//
// 询问后端目标路径是否已被占用，并取得写入地址

use crate::storage::{HttpMethod, ObjectStorageClient, ObjectUrl};
use crate::uploader::error::StorageError;
use async_trait::async_trait;

/// 申请写入地址的附加参数
#[derive(Debug, Clone, Default)]
pub struct WriteUrlOptions {
    /// 上传时使用的 Content-Type（预签名需要一致）
    pub content_type: Option<String>,
}

/// 名称解析器
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// 获取目标路径的写入地址，`exists` 表示同名对象是否已存在
    async fn get_write_url(
        &self,
        destination: &str,
        method: HttpMethod,
        options: &WriteUrlOptions,
    ) -> Result<ObjectUrl, StorageError>;
}

#[async_trait]
impl NameResolver for ObjectStorageClient {
    async fn get_write_url(
        &self,
        destination: &str,
        method: HttpMethod,
        options: &WriteUrlOptions,
    ) -> Result<ObjectUrl, StorageError> {
        self.get_object_url(destination, method, options.content_type.as_deref())
            .await
    }
}
