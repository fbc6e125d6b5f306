// 上传队列 API 处理器

use crate::server::{AppState, CommittedObject};
use crate::storage::BucketInfo;
use crate::uploader::{
    normalize_prefix, scan_upload_files, AdmissionError, EnqueueOutcome, QueueState, ScanOptions,
    UploadFile, UploadItem, UploadStatus,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::{
    ApiResponse, CODE_FILE_TOO_LARGE, CODE_INVALID_REQUEST, CODE_INVALID_STATE, CODE_NOT_FOUND,
    CODE_SCAN_FAILED, CODE_TOO_MANY_FILES,
};

/// 上传接口错误
#[derive(Debug)]
pub enum UploadApiError {
    /// 请求参数不合法
    InvalidRequest(String),
    /// 读取本地文件失败
    ScanFailed(String),
    /// 入队被拒绝
    Rejected(AdmissionError),
    /// 条目不存在
    NotFound(String),
    /// 条目不在等待覆盖状态
    InvalidState { path: String, status: UploadStatus },
    /// 内部错误
    Internal(String),
}

impl From<AdmissionError> for UploadApiError {
    fn from(e: AdmissionError) -> Self {
        UploadApiError::Rejected(e)
    }
}

impl IntoResponse for UploadApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            UploadApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, CODE_INVALID_REQUEST, msg)
            }
            UploadApiError::ScanFailed(msg) => (StatusCode::BAD_REQUEST, CODE_SCAN_FAILED, msg),
            UploadApiError::Rejected(e) => {
                let code = match e {
                    AdmissionError::TooManyFiles { .. } => CODE_TOO_MANY_FILES,
                    AdmissionError::FileTooLarge { .. } => CODE_FILE_TOO_LARGE,
                };
                (StatusCode::UNPROCESSABLE_ENTITY, code, e.to_string())
            }
            UploadApiError::NotFound(path) => (
                StatusCode::NOT_FOUND,
                CODE_NOT_FOUND,
                format!("队列中没有该文件: {}", path),
            ),
            UploadApiError::InvalidState { path, status } => (
                StatusCode::CONFLICT,
                CODE_INVALID_STATE,
                format!("文件不在等待覆盖状态: {} (当前状态 {:?})", path, status),
            ),
            UploadApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, -1, msg),
        };

        (status, Json(ApiResponse::<()>::error(code, message))).into_response()
    }
}

/// 创建上传请求
#[derive(Debug, Deserialize)]
pub struct CreateUploadsRequest {
    /// 本地文件或文件夹路径
    pub paths: Vec<String>,
    /// 目标前缀（桶内目录）
    #[serde(default)]
    pub prefix: String,
}

/// 针对单个条目的请求
#[derive(Debug, Deserialize)]
pub struct ItemRequest {
    /// 条目身份键
    pub path: String,
}

/// 队列快照响应
#[derive(Debug, Serialize)]
pub struct UploadsResponse {
    #[serde(flatten)]
    pub queue: QueueState,
    /// 最近的拒绝原因
    pub rejections: Vec<String>,
}

/// GET /api/v1/uploads
/// 获取上传队列
pub async fn get_uploads(State(app_state): State<AppState>) -> Json<ApiResponse<UploadsResponse>> {
    Json(ApiResponse::success(UploadsResponse {
        queue: app_state.upload_manager.snapshot(),
        rejections: app_state.observer.rejections(),
    }))
}

/// POST /api/v1/uploads
/// 扫描本地路径并入队
pub async fn create_uploads(
    State(app_state): State<AppState>,
    Json(req): Json<CreateUploadsRequest>,
) -> Result<Json<ApiResponse<EnqueueOutcome>>, UploadApiError> {
    if req.paths.is_empty() || req.paths.iter().any(|p| p.trim().is_empty()) {
        return Err(UploadApiError::InvalidRequest(
            "paths 不能为空".to_string(),
        ));
    }

    let options = ScanOptions {
        skip_hidden: app_state.config.read().await.upload.skip_hidden_files,
        follow_symlinks: false,
    };
    let paths = req.paths.clone();

    // 文件夹扫描是阻塞 IO
    let files = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<UploadFile>> {
        let mut files = Vec::new();
        for path in &paths {
            files.extend(scan_upload_files(path, &options)?);
        }
        Ok(files)
    })
    .await
    .map_err(|e| {
        error!("扫描任务异常退出: {}", e);
        UploadApiError::Internal(e.to_string())
    })?
    .map_err(|e| {
        warn!("扫描本地文件失败: {:#}", e);
        UploadApiError::ScanFailed(format!("{:#}", e))
    })?;

    if files.is_empty() {
        return Err(UploadApiError::InvalidRequest(
            "没有可上传的文件".to_string(),
        ));
    }

    let prefix = normalize_prefix(&req.prefix);
    info!("收到上传请求: {} 个文件, prefix={:?}", files.len(), prefix);

    let outcome = app_state.upload_manager.enqueue(files, &prefix)?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /api/v1/uploads/overwrite
/// 确认覆盖已存在的对象
pub async fn confirm_overwrite(
    State(app_state): State<AppState>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<ApiResponse<UploadItem>>, UploadApiError> {
    let manager = &app_state.upload_manager;
    if !manager.resume_upload(&req.path) {
        return Err(rejected_overwrite_action(&app_state, req.path));
    }

    manager
        .find(&req.path)
        .map(|item| Json(ApiResponse::success(item)))
        .ok_or(UploadApiError::NotFound(req.path))
}

/// POST /api/v1/uploads/cancel
/// 放弃覆盖，条目从队列移除（上传中的条目不能取消）
pub async fn cancel_overwrite(
    State(app_state): State<AppState>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<ApiResponse<()>>, UploadApiError> {
    if !app_state.upload_manager.cancel_overwrite(&req.path) {
        return Err(rejected_overwrite_action(&app_state, req.path));
    }
    Ok(Json(ApiResponse::success(())))
}

/// 覆盖确认/取消未生效时的错误：条目不存在或状态不对
fn rejected_overwrite_action(app_state: &AppState, path: String) -> UploadApiError {
    match app_state.upload_manager.find(&path) {
        Some(item) => UploadApiError::InvalidState {
            path,
            status: item.status,
        },
        None => UploadApiError::NotFound(path),
    }
}

/// DELETE /api/v1/uploads/history
/// 清空上传历史
pub async fn clear_history(State(app_state): State<AppState>) -> Json<ApiResponse<()>> {
    app_state.upload_manager.clear_history();
    Json(ApiResponse::success(()))
}

/// GET /api/v1/objects
/// 本次会话写入的对象
pub async fn get_committed_objects(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<Vec<CommittedObject>>> {
    Json(ApiResponse::success(app_state.observer.objects()))
}

/// GET /api/v1/bucket
/// 最近一次刷新的桶信息，尚未刷新时为 null
pub async fn get_bucket(
    State(app_state): State<AppState>,
) -> Json<ApiResponse<Option<BucketInfo>>> {
    let info = app_state.bucket_info.read().await.clone();
    Json(ApiResponse::success(info))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::server::build_router;
    use crate::storage::{HttpMethod, ObjectUrl};
    use crate::uploader::{
        NameResolver, ProgressCallback, StorageError, TransferExecutor, WriteUrlOptions,
    };
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
        Router,
    };
    use serde_json::{json, Value};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    #[derive(Default)]
    struct FakeResolver {
        existing: HashSet<String>,
    }

    #[async_trait]
    impl NameResolver for FakeResolver {
        async fn get_write_url(
            &self,
            destination: &str,
            _method: HttpMethod,
            _options: &WriteUrlOptions,
        ) -> Result<ObjectUrl, StorageError> {
            Ok(ObjectUrl {
                exists: self.existing.contains(destination),
                url: format!("mem://{}", destination),
            })
        }
    }

    struct InstantExecutor;

    #[async_trait]
    impl TransferExecutor for InstantExecutor {
        async fn put(
            &self,
            _url: &str,
            file: &UploadFile,
            on_progress: ProgressCallback,
        ) -> Result<(), StorageError> {
            on_progress(file.size, file.size);
            Ok(())
        }
    }

    struct SlowExecutor(Duration);

    #[async_trait]
    impl TransferExecutor for SlowExecutor {
        async fn put(
            &self,
            _url: &str,
            file: &UploadFile,
            on_progress: ProgressCallback,
        ) -> Result<(), StorageError> {
            tokio::time::sleep(self.0).await;
            on_progress(file.size, file.size);
            Ok(())
        }
    }

    fn app(config: AppConfig, existing: &[&str]) -> (AppState, Router) {
        app_with_executor(config, existing, Arc::new(InstantExecutor))
    }

    fn app_with_executor(
        config: AppConfig,
        existing: &[&str],
        executor: Arc<dyn TransferExecutor>,
    ) -> (AppState, Router) {
        let resolver = FakeResolver {
            existing: existing.iter().map(|s| s.to_string()).collect(),
        };
        let state = AppState::with_collaborators(
            config,
            Arc::new(resolver),
            executor,
            None,
            Arc::new(RwLock::new(None)),
        );
        let router = build_router(state.clone());
        (state, router)
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn wait_for_status(state: &AppState, path: &str, status: UploadStatus) {
        for _ in 0..200 {
            if state.upload_manager.find(path).map(|i| i.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} 未进入状态 {:?}", path, status);
    }

    async fn wait_for_idle(state: &AppState) {
        for _ in 0..200 {
            if state.upload_manager.snapshot().is_idle() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("队列未空闲");
    }

    fn write_file(dir: &std::path::Path, name: &str, len: usize) -> String {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, vec![b'x'; len]).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = app(AppConfig::default(), &[]);
        let (status, body) = send(&router, "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_upload_folder_with_prefix() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "docs/a.txt", 3);
        write_file(dir.path(), "docs/sub/b.txt", 5);
        let folder = dir.path().join("docs");

        let (state, router) = app(AppConfig::default(), &[]);
        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": [folder.to_str().unwrap()], "prefix": "/backups" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["accepted"], 2);

        wait_for_status(&state, "/docs/a.txt", UploadStatus::Finished).await;
        wait_for_status(&state, "/docs/sub/b.txt", UploadStatus::Finished).await;

        let (_, body) = send(&router, "GET", "/api/v1/uploads", None).await;
        assert_eq!(body["data"]["counts"]["num_finished"], 2);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

        let (_, body) = send(&router, "GET", "/api/v1/objects", None).await;
        let mut paths: Vec<String> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|o| o["path"].as_str().unwrap().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["backups/docs/a.txt", "backups/docs/sub/b.txt"]);
    }

    #[tokio::test]
    async fn test_overwrite_confirm_and_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", 4);
        let b = write_file(dir.path(), "b.txt", 4);

        let (state, router) = app(AppConfig::default(), &["a.txt", "b.txt"]);
        let (status, _) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": [a, b] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        wait_for_status(&state, "a.txt", UploadStatus::OverwritePending).await;
        wait_for_status(&state, "b.txt", UploadStatus::OverwritePending).await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads/overwrite",
            Some(json!({ "path": "a.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], 0);
        wait_for_status(&state, "a.txt", UploadStatus::Finished).await;

        let (status, _) = send(
            &router,
            "POST",
            "/api/v1/uploads/cancel",
            Some(json!({ "path": "b.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.upload_manager.find("b.txt").is_none());
        assert_eq!(state.upload_manager.counts().num_overwrite_pending, 0);
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let (_, router) = app(AppConfig::default(), &[]);
        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads/cancel",
            Some(json!({ "path": "missing.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], CODE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_in_progress_upload_cannot_be_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", 1);
        let b = write_file(dir.path(), "b.txt", 1);

        let mut config = AppConfig::default();
        config.upload.max_parallel_uploads = 1;
        let (state, router) = app_with_executor(
            config,
            &[],
            Arc::new(SlowExecutor(Duration::from_millis(200))),
        );

        send(&router, "POST", "/api/v1/uploads", Some(json!({ "paths": [a, b] }))).await;
        wait_for_status(&state, "a.txt", UploadStatus::InProgress).await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads/cancel",
            Some(json!({ "path": "a.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], CODE_INVALID_STATE);

        // 条目仍被跟踪，空出的槽位没有被提前占用
        assert_eq!(
            state.upload_manager.find("a.txt").map(|i| i.status),
            Some(UploadStatus::InProgress)
        );
        assert_eq!(state.upload_manager.counts().num_in_progress, 1);
        assert_eq!(
            state.upload_manager.find("b.txt").map(|i| i.status),
            Some(UploadStatus::Queued)
        );
    }

    #[tokio::test]
    async fn test_confirm_overwrite_on_finished_item() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", 1);

        let (state, router) = app(AppConfig::default(), &[]);
        send(&router, "POST", "/api/v1/uploads", Some(json!({ "paths": [a] }))).await;
        wait_for_status(&state, "a.txt", UploadStatus::Finished).await;

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads/overwrite",
            Some(json!({ "path": "a.txt" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], CODE_INVALID_STATE);
        assert_eq!(
            state.upload_manager.find("a.txt").map(|i| i.status),
            Some(UploadStatus::Finished)
        );
    }

    #[tokio::test]
    async fn test_batch_over_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", 1);
        let b = write_file(dir.path(), "b.txt", 1);

        let mut config = AppConfig::default();
        config.upload.max_num_uploads = 1;
        let (state, router) = app(config, &[]);

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": [a, b] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], CODE_TOO_MANY_FILES);
        assert_eq!(state.upload_manager.snapshot().total(), 0);
        assert_eq!(state.observer.rejections().len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_reported_in_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_file(dir.path(), "small.txt", 2);
        let big = write_file(dir.path(), "big.bin", 64);

        let mut config = AppConfig::default();
        config.upload.max_file_size = 16;
        let (state, router) = app(config, &[]);

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": [small, big] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accepted"], 1);
        assert_eq!(body["data"]["rejected"].as_array().unwrap().len(), 1);

        wait_for_idle(&state).await;
        assert!(state.upload_manager.find("big.bin").is_none());
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (_, router) = app(AppConfig::default(), &[]);

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], CODE_INVALID_REQUEST);

        let (status, body) = send(
            &router,
            "POST",
            "/api/v1/uploads",
            Some(json!({ "paths": ["/no/such/file.txt"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], CODE_SCAN_FAILED);
    }

    #[tokio::test]
    async fn test_clear_history() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", 1);

        let (state, router) = app(AppConfig::default(), &[]);
        send(&router, "POST", "/api/v1/uploads", Some(json!({ "paths": [a] }))).await;
        wait_for_status(&state, "a.txt", UploadStatus::Finished).await;

        let (status, _) = send(&router, "DELETE", "/api/v1/uploads/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(state.upload_manager.snapshot().total(), 0);
    }

    #[tokio::test]
    async fn test_bucket_before_refresh() {
        let (state, router) = app(AppConfig::default(), &[]);
        let (_, body) = send(&router, "GET", "/api/v1/bucket", None).await;
        assert!(body["data"].is_null());

        *state.bucket_info.write().await = Some(BucketInfo {
            label: "media".to_string(),
            cluster: "us-east-1".to_string(),
            hostname: "media.us-east-1.example.com".to_string(),
            objects: 3,
            size: 42,
        });
        let (_, body) = send(&router, "GET", "/api/v1/bucket", None).await;
        assert_eq!(body["data"]["label"], "media");
        assert_eq!(body["data"]["objects"], 3);
    }
}
