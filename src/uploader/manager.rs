// 上传管理器
//
// 负责驱动上传队列：
// - 准入检查后入队
// - 每次状态变化后重新选批，空出的并发槽位立即补上
// - 逐个文件：解析目标名称 -> 已存在则等待确认覆盖，否则开始传输
// - 完成后合并刷新桶信息，并通知宿主页面新对象已写入
//
// 所有队列修改都经过同一把锁下的 reducer，锁从不跨越 await

use crate::common::Debouncer;
use crate::config::UploadConfig;
use crate::storage::HttpMethod;
use crate::uploader::admission::{
    check_batch_size, check_file_sizes, MAX_FILE_SIZE_IN_BYTES, MAX_NUM_UPLOADS,
    MAX_PARALLEL_UPLOADS,
};
use crate::uploader::engine::{progress_percent, ProgressCallback, TransferExecutor};
use crate::uploader::error::AdmissionError;
use crate::uploader::item::{UploadFile, UploadItem, UploadStatus};
use crate::uploader::queue::{reduce, FilePatch, QueueCounts, QueueState, UploadAction};
use crate::uploader::resolver::{NameResolver, WriteUrlOptions};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 宿主页面回调
pub trait UploadObserver: Send + Sync {
    /// 每个文件上传成功后调用一次
    fn on_object_committed(&self, _path: &str, _size_in_bytes: u64) {}

    /// 入队被拒绝时调用
    fn on_batch_rejected(&self, _reason: &AdmissionError) {}
}

/// 不做任何处理的回调
#[derive(Debug, Default)]
pub struct NoopObserver;

impl UploadObserver for NoopObserver {}

/// 目标元数据刷新（上传完成后合并触发）
#[async_trait]
pub trait DestinationRefresher: Send + Sync {
    async fn refresh(&self);
}

/// 队列限制
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// 最多跟踪的文件数
    pub max_num_uploads: usize,
    /// 最多同时上传的文件数
    pub max_parallel_uploads: usize,
    /// 单文件大小上限
    pub max_file_size: u64,
    /// 刷新合并窗口
    pub refresh_debounce: Duration,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_num_uploads: MAX_NUM_UPLOADS,
            max_parallel_uploads: MAX_PARALLEL_UPLOADS,
            max_file_size: MAX_FILE_SIZE_IN_BYTES,
            refresh_debounce: crate::common::DEFAULT_DEBOUNCE_WINDOW,
        }
    }
}

impl From<&UploadConfig> for UploadLimits {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_num_uploads: config.max_num_uploads,
            // 至少允许一个并发，否则队列永远不会前进
            max_parallel_uploads: config.max_parallel_uploads.max(1),
            max_file_size: config.max_file_size,
            refresh_debounce: Duration::from_millis(config.refresh_debounce_ms),
        }
    }
}

/// 入队结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnqueueOutcome {
    /// 进入本次批次的文件数
    pub accepted: usize,
    /// 因大小超限被拒绝的文件
    #[serde(serialize_with = "serialize_errors")]
    pub rejected: Vec<AdmissionError>,
}

fn serialize_errors<S: serde::Serializer>(
    errors: &[AdmissionError],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

struct ManagerInner {
    /// 队列状态（唯一所有者）
    state: Mutex<QueueState>,
    limits: UploadLimits,
    resolver: Arc<dyn NameResolver>,
    executor: Arc<dyn TransferExecutor>,
    observer: Arc<dyn UploadObserver>,
    refresher: Option<Arc<dyn DestinationRefresher>>,
    debouncer: Debouncer,
}

/// 上传管理器
///
/// 克隆开销很小，所有克隆共享同一个队列
#[derive(Clone)]
pub struct UploadManager {
    inner: Arc<ManagerInner>,
}

impl UploadManager {
    /// 创建上传管理器（无刷新回调）
    pub fn new(
        resolver: Arc<dyn NameResolver>,
        executor: Arc<dyn TransferExecutor>,
        observer: Arc<dyn UploadObserver>,
        limits: UploadLimits,
    ) -> Self {
        Self::new_with_refresher(resolver, executor, observer, None, limits)
    }

    /// 创建上传管理器（完整选项）
    pub fn new_with_refresher(
        resolver: Arc<dyn NameResolver>,
        executor: Arc<dyn TransferExecutor>,
        observer: Arc<dyn UploadObserver>,
        refresher: Option<Arc<dyn DestinationRefresher>>,
        limits: UploadLimits,
    ) -> Self {
        info!(
            "上传管理器初始化: 最大文件数={}, 最大并发={}, 单文件上限={}",
            limits.max_num_uploads,
            limits.max_parallel_uploads,
            crate::uploader::readable_bytes(limits.max_file_size)
        );

        Self {
            inner: Arc::new(ManagerInner {
                state: Mutex::new(QueueState::new()),
                limits,
                resolver,
                executor,
                observer,
                refresher,
                debouncer: Debouncer::new(limits.refresh_debounce),
            }),
        }
    }

    pub fn limits(&self) -> UploadLimits {
        self.inner.limits
    }

    /// 入队一批文件
    ///
    /// 超过大小上限的文件逐个拒绝，其余文件若使队列超过容量则整批拒绝。
    /// 必须在 tokio 运行时内调用
    pub fn enqueue(
        &self,
        files: Vec<UploadFile>,
        prefix: &str,
    ) -> Result<EnqueueOutcome, AdmissionError> {
        let size_check = check_file_sizes(files, self.inner.limits.max_file_size);
        for reason in &size_check.rejected {
            warn!("拒绝上传: {}", reason);
            self.inner.observer.on_batch_rejected(reason);
        }

        let outcome = EnqueueOutcome {
            accepted: size_check.accepted.len(),
            rejected: size_check.rejected,
        };
        if size_check.accepted.is_empty() {
            return Ok(outcome);
        }

        let admitted = {
            let mut state = self.inner.state.lock();
            match check_batch_size(
                &state.counts(),
                size_check.accepted.len(),
                self.inner.limits.max_num_uploads,
            ) {
                Ok(()) => {
                    let current = std::mem::take(&mut *state);
                    *state = reduce(
                        current,
                        UploadAction::Enqueue {
                            files: size_check.accepted,
                            prefix: prefix.to_string(),
                        },
                    );
                    Ok(state.counts())
                }
                Err(e) => Err(e),
            }
        };

        match admitted {
            Ok(counts) => {
                info!(
                    "入队 {} 个文件: prefix={:?}, 排队={}, 上传中={}",
                    outcome.accepted, prefix, counts.num_queued, counts.num_in_progress
                );
                self.pump();
                Ok(outcome)
            }
            Err(reason) => {
                warn!("整批拒绝: {}", reason);
                self.inner.observer.on_batch_rejected(&reason);
                Err(reason)
            }
        }
    }

    /// 用户确认覆盖
    ///
    /// 只对等待覆盖的条目生效，返回是否生效
    pub fn resume_upload(&self, path: &str) -> bool {
        let applied = self.dispatch_if_overwrite_pending(
            path,
            UploadAction::ResumeUpload {
                path: path.to_string(),
            },
        );
        if applied {
            info!("确认覆盖: {}", path);
        } else {
            warn!("忽略确认覆盖，条目不在等待覆盖状态: {}", path);
        }
        applied
    }

    /// 用户取消覆盖
    ///
    /// 只移除等待覆盖的条目；上传中的条目不能取消，返回是否生效
    pub fn cancel_overwrite(&self, path: &str) -> bool {
        let applied = self.dispatch_if_overwrite_pending(
            path,
            UploadAction::CancelOverwrite {
                path: path.to_string(),
            },
        );
        if applied {
            info!("取消覆盖: {}", path);
        } else {
            warn!("忽略取消覆盖，条目不在等待覆盖状态: {}", path);
        }
        applied
    }

    /// 清空上传历史
    ///
    /// 进行中的条目也会被移除，但其网络请求不会中断
    pub fn clear_history(&self) {
        let counts = self.counts();
        if counts.num_in_progress > 0 {
            warn!(
                "清空上传历史时仍有 {} 个文件在上传，其后续进度将被忽略",
                counts.num_in_progress
            );
        }
        self.dispatch(UploadAction::ClearHistory);
    }

    /// 当前队列快照
    pub fn snapshot(&self) -> QueueState {
        self.inner.state.lock().clone()
    }

    pub fn counts(&self) -> QueueCounts {
        self.inner.state.lock().counts()
    }

    pub fn find(&self, path: &str) -> Option<UploadItem> {
        self.inner.state.lock().find(path).cloned()
    }

    /// 应用动作并重新调度
    fn dispatch(&self, action: UploadAction) {
        {
            let mut state = self.inner.state.lock();
            let current = std::mem::take(&mut *state);
            *state = reduce(current, action);
        }
        self.pump();
    }

    /// 状态检查与应用动作在同一临界区内完成
    fn dispatch_if_overwrite_pending(&self, path: &str, action: UploadAction) -> bool {
        {
            let mut state = self.inner.state.lock();
            let pending = state
                .find(path)
                .is_some_and(|item| item.status == UploadStatus::OverwritePending);
            if !pending {
                return false;
            }
            let current = std::mem::take(&mut *state);
            *state = reduce(current, action);
        }
        self.pump();
        true
    }

    /// 选出下一批并在同一临界区内标记为上传中，避免重复选中
    fn pump(&self) {
        let batch = {
            let mut state = self.inner.state.lock();
            let batch = state.select_next_batch(self.inner.limits.max_parallel_uploads);
            if batch.is_empty() {
                return;
            }

            let paths = batch.iter().map(|item| item.path.clone()).collect();
            let current = std::mem::take(&mut *state);
            *state = reduce(
                current,
                UploadAction::UpdateFiles {
                    paths,
                    patch: FilePatch::status(UploadStatus::InProgress),
                },
            );
            batch
        };

        debug!("启动 {} 个上传", batch.len());
        for item in batch {
            let manager = self.clone();
            tokio::spawn(async move { manager.run_item(item).await });
        }
    }

    fn mark_error(&self, path: &str) {
        self.dispatch(UploadAction::UpdateFiles {
            paths: vec![path.to_string()],
            patch: FilePatch::status(UploadStatus::Error),
        });
    }

    /// 单个文件：解析 -> 传输 -> 完成/失败
    async fn run_item(self, item: UploadItem) {
        let destination = item.destination();

        let url = match item.resolved_url.clone() {
            // 已确认覆盖，直接上传
            Some(url) => url,
            None => {
                let options = WriteUrlOptions {
                    content_type: Some(item.file.mime_type.clone()),
                };
                match self
                    .inner
                    .resolver
                    .get_write_url(&destination, HttpMethod::Put, &options)
                    .await
                {
                    Ok(object_url) if object_url.exists => {
                        info!("目标已存在，等待确认覆盖: {}", destination);
                        self.dispatch(UploadAction::NotifyExists {
                            path: item.path.clone(),
                            url: object_url.url,
                        });
                        return;
                    }
                    Ok(object_url) => object_url.url,
                    Err(e) => {
                        warn!("解析目标地址失败: {}, 错误: {}", destination, e);
                        self.mark_error(&item.path);
                        return;
                    }
                }
            }
        };

        let on_progress: ProgressCallback = {
            let manager = self.clone();
            let path = item.path.clone();
            Arc::new(move |loaded, total| {
                manager.dispatch(UploadAction::UpdateFiles {
                    paths: vec![path.clone()],
                    patch: FilePatch::progress(progress_percent(loaded, total)),
                });
            })
        };

        match self.inner.executor.put(&url, &item.file, on_progress).await {
            Ok(()) => {
                info!("上传完成: {} ({} 字节)", destination, item.file.size);
                self.dispatch(UploadAction::UpdateFiles {
                    paths: vec![item.path.clone()],
                    patch: FilePatch::finished(),
                });
                self.schedule_refresh();
                self.inner
                    .observer
                    .on_object_committed(&destination, item.file.size);
            }
            Err(e) => {
                error!("上传失败: {}, 错误: {}", destination, e);
                self.mark_error(&item.path);
            }
        }
    }

    fn schedule_refresh(&self) {
        if let Some(refresher) = &self.inner.refresher {
            let refresher = refresher.clone();
            self.inner.debouncer.call(move || async move {
                refresher.refresh().await;
            });
        }
    }
}
