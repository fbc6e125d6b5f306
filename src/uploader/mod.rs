// 上传模块
//
// 有界并发的对象存储上传队列：
// - item: 文件句柄与队列条目
// - queue: 纯函数状态机（reducer）
// - admission: 入队前的大小与容量检查
// - resolver / engine: 名称解析与数据传输（外部协作者）
// - manager: 驱动队列的调度循环

pub mod admission;
pub mod engine;
pub mod error;
pub mod folder;
pub mod item;
pub mod manager;
pub mod queue;
pub mod resolver;

pub use admission::{
    check_batch_size, check_file_sizes, readable_bytes, MAX_FILE_SIZE_IN_BYTES,
    MAX_NUM_UPLOADS, MAX_PARALLEL_UPLOADS,
};
pub use engine::{progress_percent, HttpTransferExecutor, ProgressCallback, TransferExecutor};
pub use error::{AdmissionError, StorageError};
pub use folder::{scan_upload_files, ScanOptions};
pub use item::{destination_path, normalize_prefix, UploadFile, UploadItem, UploadStatus};
pub use manager::{
    DestinationRefresher, EnqueueOutcome, NoopObserver, UploadLimits, UploadManager,
    UploadObserver,
};
pub use queue::{reduce, FilePatch, QueueCounts, QueueState, UploadAction};
pub use resolver::{NameResolver, WriteUrlOptions};
