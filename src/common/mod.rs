// 公共模块
//
// - 合并触发器（目标桶元数据刷新）
// - 进度节流器（传输进度回调）

pub mod debounce;
pub mod throttle;

pub use debounce::{Debouncer, DEFAULT_DEBOUNCE_WINDOW};
pub use throttle::{ProgressThrottler, DEFAULT_PROGRESS_INTERVAL_MS};
