// 上传队列状态机
//
// 纯函数 reducer：(QueueState, UploadAction) -> QueueState
// - 队列以路径去重
// - 计数总是从 items 重新统计，不单独增减
// - 不做任何 I/O，调度与传输由 UploadManager 负责

use crate::uploader::item::{UploadFile, UploadItem, UploadStatus};
use serde::Serialize;
use std::collections::HashSet;

/// 未完成条目的进度上限（100 只属于 Finished）
pub const MAX_UNFINISHED_PERCENT: f64 = 99.0;

/// 按状态统计的条目数
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct QueueCounts {
    pub num_queued: usize,
    pub num_in_progress: usize,
    pub num_overwrite_pending: usize,
    pub num_finished: usize,
    pub num_canceled: usize,
    pub num_errors: usize,
}

impl QueueCounts {
    /// 从条目列表统计
    pub fn tally(items: &[UploadItem]) -> Self {
        let mut counts = Self::default();
        for item in items {
            match item.status {
                UploadStatus::Queued => counts.num_queued += 1,
                UploadStatus::InProgress => counts.num_in_progress += 1,
                UploadStatus::OverwritePending => counts.num_overwrite_pending += 1,
                UploadStatus::Finished => counts.num_finished += 1,
                UploadStatus::Canceled => counts.num_canceled += 1,
                UploadStatus::Error => counts.num_errors += 1,
            }
        }
        counts
    }
}

/// 部分字段更新，未设置的字段保持原值
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilePatch {
    pub status: Option<UploadStatus>,
    pub percent_complete: Option<f64>,
    pub resolved_url: Option<String>,
}

impl FilePatch {
    /// 只更新状态
    pub fn status(status: UploadStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// 只更新进度
    pub fn progress(percent_complete: f64) -> Self {
        Self {
            percent_complete: Some(percent_complete),
            ..Default::default()
        }
    }

    /// 上传完成
    pub fn finished() -> Self {
        Self {
            status: Some(UploadStatus::Finished),
            percent_complete: Some(100.0),
            resolved_url: None,
        }
    }

    fn apply(&self, item: &mut UploadItem) {
        if let Some(status) = self.status {
            item.status = status;
        }
        if let Some(percent) = self.percent_complete {
            item.percent_complete = percent.clamp(0.0, 100.0);
        }
        if let Some(url) = &self.resolved_url {
            item.resolved_url = Some(url.clone());
        }
        if item.status != UploadStatus::Finished && item.percent_complete >= 100.0 {
            item.percent_complete = MAX_UNFINISHED_PERCENT;
        }
    }
}

/// 队列动作
#[derive(Debug, Clone)]
pub enum UploadAction {
    /// 入队一批文件
    Enqueue {
        files: Vec<UploadFile>,
        prefix: String,
    },
    /// 对指定路径的条目应用部分更新
    UpdateFiles {
        paths: Vec<String>,
        patch: FilePatch,
    },
    /// 目标对象已存在，等待确认覆盖
    NotifyExists { path: String, url: String },
    /// 用户确认覆盖，重新排队
    ResumeUpload { path: String },
    /// 用户取消覆盖，移除条目
    CancelOverwrite { path: String },
    /// 清空全部历史（包括进行中的条目）
    ClearHistory,
}

/// 上传队列状态
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QueueState {
    items: Vec<UploadItem>,
    counts: QueueCounts,
}

impl QueueState {
    /// 空队列
    pub fn new() -> Self {
        Self::default()
    }

    /// 由已有条目构建（计数重新统计）
    pub fn from_items(items: Vec<UploadItem>) -> Self {
        let counts = QueueCounts::tally(&items);
        Self { items, counts }
    }

    /// 条目列表，最新入队的在前
    pub fn items(&self) -> &[UploadItem] {
        &self.items
    }

    pub fn counts(&self) -> QueueCounts {
        self.counts
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    /// 按路径查找
    pub fn find(&self, path: &str) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.path == path)
    }

    /// 指定状态的全部条目
    pub fn items_with_status(&self, status: UploadStatus) -> Vec<&UploadItem> {
        self.items.iter().filter(|item| item.status == status).collect()
    }

    /// 没有排队或进行中的条目
    pub fn is_idle(&self) -> bool {
        self.counts.num_queued == 0 && self.counts.num_in_progress == 0
    }

    /// 选出下一批可启动的条目
    ///
    /// 只读查询，不修改状态；按数组顺序取 Queued 条目，
    /// 数量不超过 `max_parallel - num_in_progress`
    pub fn select_next_batch(&self, max_parallel: usize) -> Vec<UploadItem> {
        if self.counts.num_queued == 0 || self.counts.num_in_progress >= max_parallel {
            return Vec::new();
        }

        let free_slots = max_parallel - self.counts.num_in_progress;
        self.items
            .iter()
            .filter(|item| item.status == UploadStatus::Queued)
            .take(free_slots)
            .cloned()
            .collect()
    }

    fn recount(&mut self) {
        self.counts = QueueCounts::tally(&self.items);
    }

    fn enqueue(&mut self, files: Vec<UploadFile>, prefix: String) {
        let mut new_items: Vec<UploadItem> = Vec::with_capacity(files.len());
        let mut seen: HashSet<String> = HashSet::new();

        for file in files {
            let path = file.path_or_file_name().to_string();
            if !seen.insert(path.clone()) {
                continue;
            }

            match self.items.iter().position(|item| item.path == path) {
                // 终态条目：替换并移到最前
                Some(idx) if self.items[idx].status.is_terminal() => {
                    self.items.remove(idx);
                    new_items.push(UploadItem::new(file, prefix.clone()));
                }
                // 排队/进行中/等待覆盖：保持不动
                Some(_) => {}
                None => new_items.push(UploadItem::new(file, prefix.clone())),
            }
        }

        new_items.append(&mut self.items);
        self.items = new_items;
        self.recount();
    }

    fn update_files(&mut self, paths: &[String], patch: &FilePatch) {
        let targets: HashSet<&str> = paths.iter().map(String::as_str).collect();
        for item in self
            .items
            .iter_mut()
            .filter(|item| targets.contains(item.path.as_str()))
        {
            patch.apply(item);
        }

        // 只改进度时无需重新统计
        if patch.status.is_some() {
            self.recount();
        }
    }

    fn notify_exists(&mut self, path: &str, url: String) {
        if let Some(item) = self.items.iter_mut().find(|item| item.path == path) {
            item.status = UploadStatus::OverwritePending;
            item.resolved_url = Some(url);
            self.recount();
        }
    }

    fn resume_upload(&mut self, path: &str) {
        if let Some(item) = self
            .items
            .iter_mut()
            .find(|item| item.path == path && item.status == UploadStatus::OverwritePending)
        {
            item.status = UploadStatus::Queued;
            self.recount();
        }
    }

    fn cancel_overwrite(&mut self, path: &str) {
        self.items.retain(|item| item.path != path);
        self.recount();
    }
}

/// 队列 reducer
///
/// 消耗旧状态并返回新状态；调用方负责串行化所有调用
pub fn reduce(mut state: QueueState, action: UploadAction) -> QueueState {
    match action {
        UploadAction::Enqueue { files, prefix } => state.enqueue(files, prefix),
        UploadAction::UpdateFiles { paths, patch } => state.update_files(&paths, &patch),
        UploadAction::NotifyExists { path, url } => state.notify_exists(&path, url),
        UploadAction::ResumeUpload { path } => state.resume_upload(&path),
        UploadAction::CancelOverwrite { path } => state.cancel_overwrite(&path),
        UploadAction::ClearHistory => state = QueueState::new(),
    }
    state
}
