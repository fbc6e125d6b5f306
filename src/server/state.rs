// 应用状态

use crate::config::AppConfig;
use crate::storage::{BucketInfo, ObjectStorageClient};
use crate::uploader::{
    AdmissionError, DestinationRefresher, HttpTransferExecutor, NameResolver, TransferExecutor,
    UploadLimits, UploadManager, UploadObserver,
};
use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// 最多保留的拒绝记录数
const MAX_REJECTIONS: usize = 50;

/// 本次会话中写入成功的对象
#[derive(Debug, Clone, Serialize)]
pub struct CommittedObject {
    /// 桶内完整路径
    pub path: String,
    /// 大小（字节）
    pub size: u64,
    /// 写入时间 (Unix timestamp)
    pub committed_at: i64,
}

/// 宿主页面回调：维护乐观更新的对象列表和最近的拒绝原因
#[derive(Debug, Default)]
pub struct SessionObserver {
    objects: DashMap<String, CommittedObject>,
    rejections: parking_lot::Mutex<VecDeque<String>>,
}

impl SessionObserver {
    /// 已写入对象，按写入时间倒序
    pub fn objects(&self) -> Vec<CommittedObject> {
        let mut objects: Vec<CommittedObject> =
            self.objects.iter().map(|e| e.value().clone()).collect();
        objects.sort_by(|a, b| {
            b.committed_at
                .cmp(&a.committed_at)
                .then_with(|| a.path.cmp(&b.path))
        });
        objects
    }

    /// 最近的拒绝原因，最新的在前
    pub fn rejections(&self) -> Vec<String> {
        self.rejections.lock().iter().cloned().collect()
    }
}

impl UploadObserver for SessionObserver {
    fn on_object_committed(&self, path: &str, size_in_bytes: u64) {
        self.objects.insert(
            path.to_string(),
            CommittedObject {
                path: path.to_string(),
                size: size_in_bytes,
                committed_at: chrono::Utc::now().timestamp(),
            },
        );
    }

    fn on_batch_rejected(&self, reason: &AdmissionError) {
        let mut rejections = self.rejections.lock();
        rejections.push_front(reason.to_string());
        rejections.truncate(MAX_REJECTIONS);
    }
}

/// 上传完成后刷新桶信息
pub struct BucketRefresher {
    client: ObjectStorageClient,
    target: Arc<RwLock<Option<BucketInfo>>>,
}

impl BucketRefresher {
    pub fn new(client: ObjectStorageClient, target: Arc<RwLock<Option<BucketInfo>>>) -> Self {
        Self { client, target }
    }
}

#[async_trait]
impl DestinationRefresher for BucketRefresher {
    async fn refresh(&self) {
        match self.client.get_bucket().await {
            Ok(info) => {
                info!(
                    "桶信息已刷新: {} ({} 个对象, {} 字节)",
                    info.label, info.objects, info.size
                );
                *self.target.write().await = Some(info);
            }
            Err(e) => warn!("刷新桶信息失败: {}", e),
        }
    }
}

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Arc<RwLock<AppConfig>>,
    /// 上传管理器
    pub upload_manager: UploadManager,
    /// 会话回调（已写入对象、拒绝记录）
    pub observer: Arc<SessionObserver>,
    /// 最近一次刷新的桶信息
    pub bucket_info: Arc<RwLock<Option<BucketInfo>>>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let client = ObjectStorageClient::new(&config.storage)?;
        // 大文件传输不设整体超时，只限制建连时间
        let transfer_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.storage.request_timeout_secs))
            .build()
            .context("Failed to create transfer HTTP client")?;
        let executor = Arc::new(HttpTransferExecutor::new(transfer_client));
        let bucket_info = Arc::new(RwLock::new(None));
        let refresher = Arc::new(BucketRefresher::new(client.clone(), bucket_info.clone()));

        Ok(Self::with_collaborators(
            config,
            Arc::new(client),
            executor,
            Some(refresher as Arc<dyn DestinationRefresher>),
            bucket_info,
        ))
    }

    /// 使用指定协作者创建应用状态
    pub fn with_collaborators(
        config: AppConfig,
        resolver: Arc<dyn NameResolver>,
        executor: Arc<dyn TransferExecutor>,
        refresher: Option<Arc<dyn DestinationRefresher>>,
        bucket_info: Arc<RwLock<Option<BucketInfo>>>,
    ) -> Self {
        let observer = Arc::new(SessionObserver::default());
        let upload_manager = UploadManager::new_with_refresher(
            resolver,
            executor,
            observer.clone(),
            refresher,
            UploadLimits::from(&config.upload),
        );

        Self {
            config: Arc::new(RwLock::new(config)),
            upload_manager,
            observer,
            bucket_info,
        }
    }
}
