//! 进度回调节流器
//!
//! 传输层每读一个数据块都会产生进度，逐块回调会让队列频繁加锁；
//! 节流后只在间隔到达时回调，最后一次由 `force_emit` 保证送达

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// 默认节流间隔（毫秒）
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 200;

/// 进度节流器
///
/// 使用原子操作，可在多个任务之间共享
#[derive(Debug)]
pub struct ProgressThrottler {
    /// 计时起点
    start: Instant,
    /// 上次回调时间（相对起点的纳秒，0 表示尚未回调）
    last_emit_nanos: AtomicU64,
    /// 节流间隔（纳秒）
    interval_nanos: u64,
}

impl ProgressThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            start: Instant::now(),
            last_emit_nanos: AtomicU64::new(0),
            interval_nanos: interval.as_nanos() as u64,
        }
    }

    pub fn with_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// 距离上次回调超过间隔时返回 true 并记录本次时间
    pub fn should_emit(&self) -> bool {
        // +1 保证首次调用时 now 不为 0
        let now = self.start.elapsed().as_nanos() as u64 + 1;
        let last = self.last_emit_nanos.load(Ordering::Relaxed);

        if last != 0 && now.saturating_sub(last) < self.interval_nanos {
            return false;
        }

        self.last_emit_nanos
            .compare_exchange(last, now, Ordering::Relaxed, Ordering::Relaxed)
            .is_ok()
    }

    /// 强制回调（传输结束时使用）
    pub fn force_emit(&self) -> bool {
        let now = self.start.elapsed().as_nanos() as u64 + 1;
        self.last_emit_nanos.store(now, Ordering::Relaxed);
        true
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::with_millis(DEFAULT_PROGRESS_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_call_emits() {
        let throttler = ProgressThrottler::with_millis(100);
        assert!(throttler.should_emit());
        assert!(!throttler.should_emit());
    }

    #[test]
    fn test_emits_again_after_interval() {
        let throttler = ProgressThrottler::with_millis(30);
        assert!(throttler.should_emit());

        thread::sleep(Duration::from_millis(40));
        assert!(throttler.should_emit());
    }

    #[test]
    fn test_force_emit() {
        let throttler = ProgressThrottler::with_millis(1000);
        assert!(throttler.should_emit());
        assert!(throttler.force_emit());
        // force 之后重新计时
        assert!(!throttler.should_emit());
    }
}
