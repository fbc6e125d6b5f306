//! 合并触发器
//!
//! 窗口内的多次触发合并为窗口结束时的一次执行，
//! 两次执行之间至少间隔一个窗口
//! 使用 compare_exchange 保证同一时刻只有一个待执行任务

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 默认合并窗口：3 秒
pub const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Debouncer {
    /// 合并窗口
    window: Duration,
    /// 是否已有待执行任务
    pending: Arc<AtomicBool>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 触发一次
    ///
    /// 没有待执行任务时安排 `f` 在窗口结束后执行并返回 true；
    /// 已有待执行任务时本次触发被合并，返回 false
    ///
    /// 必须在 tokio 运行时内调用
    pub fn call<F, Fut>(&self, f: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if self
            .pending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let pending = self.pending.clone();
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            // 先释放，执行期间的新触发会安排下一轮
            pending.store(false, Ordering::SeqCst);
            f().await;
        });
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}
