// 传输执行器
//
// 以 HTTP PUT 将整个文件写入预签名地址：
// - 文件按块流式读取，不整体载入内存
// - 每读一块累加已发送字节，经节流后回调进度
// - 不重试、不续传，失败由上层标记为 Error

use crate::common::ProgressThrottler;
use crate::storage::client::check_response;
use crate::uploader::error::StorageError;
use crate::uploader::item::UploadFile;
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// 进度回调：(已发送字节, 总字节)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 传输执行器
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// 上传文件到 `url`，过程中零次或多次调用 `on_progress`
    async fn put(
        &self,
        url: &str,
        file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), StorageError>;
}

/// 基于 reqwest 的传输执行器
#[derive(Debug, Clone)]
pub struct HttpTransferExecutor {
    client: Client,
    /// 进度回调最小间隔
    progress_interval: Duration,
}

impl HttpTransferExecutor {
    pub fn new(client: Client) -> Self {
        Self::with_progress_interval(
            client,
            Duration::from_millis(crate::common::DEFAULT_PROGRESS_INTERVAL_MS),
        )
    }

    pub fn with_progress_interval(client: Client, progress_interval: Duration) -> Self {
        Self {
            client,
            progress_interval,
        }
    }
}

/// 已发送字节换算为百分比
pub fn progress_percent(loaded: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (loaded as f64 / total as f64) * 100.0
}

#[async_trait]
impl TransferExecutor for HttpTransferExecutor {
    async fn put(
        &self,
        url: &str,
        file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), StorageError> {
        let handle = tokio::fs::File::open(&file.local_path).await?;
        // 以打开时的实际大小为准
        let total = handle.metadata().await?.len();

        info!(
            "开始传输: local={:?}, size={}, content_type={}",
            file.local_path, total, file.mime_type
        );

        let loaded = Arc::new(AtomicU64::new(0));
        let throttler = Arc::new(ProgressThrottler::new(self.progress_interval));
        let stream = ReaderStream::new(handle).inspect_ok({
            let loaded = loaded.clone();
            move |chunk| {
                let len = chunk.len() as u64;
                let sent = loaded.fetch_add(len, Ordering::SeqCst) + len;
                let emit = if sent >= total {
                    throttler.force_emit()
                } else {
                    throttler.should_emit()
                };
                if emit {
                    on_progress(sent, total);
                }
            }
        });

        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, file.mime_type.as_str())
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(stream))
            .send()
            .await?;
        check_response(response).await?;

        debug!(
            "传输完成: local={:?}, sent={}",
            file.local_path,
            loaded.load(Ordering::SeqCst)
        );
        Ok(())
    }
}
