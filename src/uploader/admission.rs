// 入队准入检查
//
// 在任何队列状态产生之前执行：
// 1. 单文件大小上限（逐个拒绝）
// 2. 队列容量上限（整批拒绝）

use crate::uploader::error::AdmissionError;
use crate::uploader::item::UploadFile;
use crate::uploader::queue::QueueCounts;

/// 队列中最多跟踪的文件数
pub const MAX_NUM_UPLOADS: usize = 250;

/// 同时上传的最大文件数
pub const MAX_PARALLEL_UPLOADS: usize = 6;

/// 单文件大小上限：5 GiB
pub const MAX_FILE_SIZE_IN_BYTES: u64 = 5 * 1024 * 1024 * 1024;

/// 大小检查结果
#[derive(Debug, Default)]
pub struct SizeCheck {
    /// 通过检查的文件
    pub accepted: Vec<UploadFile>,
    /// 被拒绝的文件
    pub rejected: Vec<AdmissionError>,
}

/// 过滤超过大小上限的文件
pub fn check_file_sizes(files: Vec<UploadFile>, max_file_size: u64) -> SizeCheck {
    let mut check = SizeCheck::default();
    for file in files {
        if file.size > max_file_size {
            check.rejected.push(AdmissionError::FileTooLarge {
                name: file.name.clone(),
                size: file.size,
                limit: readable_bytes(max_file_size),
            });
        } else {
            check.accepted.push(file);
        }
    }
    check
}

/// 检查整批文件能否入队
///
/// 排队中 + 上传中 + 本批数量超过上限时整批拒绝
pub fn check_batch_size(
    counts: &QueueCounts,
    requested: usize,
    max_num_uploads: usize,
) -> Result<(), AdmissionError> {
    let active = counts.num_in_progress + counts.num_queued;
    if active + requested > max_num_uploads {
        return Err(AdmissionError::TooManyFiles {
            active,
            requested,
            max: max_num_uploads,
        });
    }
    Ok(())
}

/// 字节数转可读字符串（1024 进制，最多两位小数）
pub fn readable_bytes(num_bytes: u64) -> String {
    const UNITS: [&str; 5] = ["bytes", "KB", "MB", "GB", "TB"];

    let mut value = num_bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, UNITS[unit])
}
