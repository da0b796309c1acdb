//! 闭环运动句柄
//!
//! 工作线程与调用方之间共享的状态：
//! - 取消标志（每次迭代检查一次）
//! - 唤醒通道（打断控制周期的休眠）
//! - 可原地更新的绝对目标
//! - 完成通知与运行结果

use crate::error::ClientError;
use crate::state::Mode;
use crossbeam_channel::{Receiver, Sender, bounded};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// 成功到位的运行报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionReport {
    /// 执行的迭代次数
    pub iterations: u64,
    /// 最终绝对位置
    pub final_position: i64,
    /// 最终误差（步）
    pub final_error: i64,
}

pub(crate) type MotionResult = Result<MotionReport, ClientError>;

/// 工作线程与句柄共享的状态
pub(crate) struct MotionShared {
    mode: Mode,
    cancel: AtomicBool,
    target: AtomicI64,
    iterations: AtomicU64,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    done: Mutex<Option<MotionResult>>,
    finished: AtomicBool,
    finished_cv: Condvar,
}

impl MotionShared {
    pub(crate) fn new(mode: Mode, target: i64) -> Arc<Self> {
        let (wake_tx, wake_rx) = bounded(1);
        Arc::new(Self {
            mode,
            cancel: AtomicBool::new(false),
            target: AtomicI64::new(target),
            iterations: AtomicU64::new(0),
            wake_tx,
            wake_rx,
            done: Mutex::new(None),
            finished: AtomicBool::new(false),
            finished_cv: Condvar::new(),
        })
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    /// 请求取消并唤醒休眠中的工作线程（不阻塞）
    pub(crate) fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Release);
        let _ = self.wake_tx.try_send(());
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    pub(crate) fn target(&self) -> i64 {
        self.target.load(Ordering::Acquire)
    }

    pub(crate) fn set_target(&self, target: i64) {
        self.target.store(target, Ordering::Release);
    }

    pub(crate) fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub(crate) fn record_iteration(&self, iteration: u64) {
        self.iterations.store(iteration, Ordering::Relaxed);
    }

    /// 休眠一个控制周期，取消时提前返回
    pub(crate) fn sleep(&self, tick: Duration) {
        let _ = self.wake_rx.recv_timeout(tick);
    }

    /// 工作线程完成清理后调用
    pub(crate) fn finish(&self, result: MotionResult) {
        let mut done = self.done.lock();
        *done = Some(result);
        self.finished.store(true, Ordering::Release);
        self.finished_cv.notify_all();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// 阻塞直到工作线程完成
    pub(crate) fn wait_finished(&self) {
        let mut done = self.done.lock();
        while !self.is_finished() {
            self.finished_cv.wait(&mut done);
        }
    }

    fn take_result(&self) -> Option<MotionResult> {
        self.done.lock().take()
    }
}

/// 闭环运动句柄
///
/// 由 [`WheelClient::move_to_mod_position`](crate::WheelClient::move_to_mod_position) 返回。
/// 丢弃句柄不会停止运动；需要停止时调用 [`cancel`](Self::cancel)。
pub struct MotionHandle {
    shared: Arc<MotionShared>,
}

impl MotionHandle {
    pub(crate) fn new(shared: Arc<MotionShared>) -> Self {
        Self { shared }
    }

    /// 阻塞直到运动结束，返回结果
    pub fn wait(self) -> Result<MotionReport, ClientError> {
        self.shared.wait_finished();
        self.shared
            .take_result()
            .unwrap_or_else(|| {
                Err(ClientError::Cancelled {
                    iterations: self.shared.iterations(),
                })
            })
    }

    /// 取消运动
    ///
    /// 阻塞直到正在进行的迭代（包括其中的 IO）完成、清理结束。
    pub fn cancel(&self) {
        self.shared.request_cancel();
        self.shared.wait_finished();
    }

    pub fn is_finished(&self) -> bool {
        self.shared.is_finished()
    }

    /// 已完成的迭代次数
    pub fn iterations(&self) -> u64 {
        self.shared.iterations()
    }

    /// 绝对目标位置
    pub fn target(&self) -> i64 {
        self.shared.target()
    }

    pub fn mode(&self) -> Mode {
        self.shared.mode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_cancel_interrupts_sleep() {
        let shared = MotionShared::new(Mode::MovingOnce, 0);
        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                let start = Instant::now();
                shared.sleep(Duration::from_secs(10));
                start.elapsed()
            })
        };
        thread::sleep(Duration::from_millis(20));
        shared.request_cancel();
        assert!(worker.join().unwrap() < Duration::from_secs(2));
        assert!(shared.is_cancelled());
    }

    #[test]
    fn test_wait_returns_finished_result() {
        let shared = MotionShared::new(Mode::MovingOnce, 42);
        let handle = MotionHandle::new(shared.clone());
        assert!(!handle.is_finished());
        assert_eq!(handle.target(), 42);

        let report = MotionReport {
            iterations: 3,
            final_position: 42,
            final_error: 0,
        };
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            shared.finish(Ok(report));
        });
        assert_eq!(handle.wait().unwrap(), report);
    }

    #[test]
    fn test_second_waiter_sees_cancelled() {
        let shared = MotionShared::new(Mode::Locking, 0);
        shared.finish(Ok(MotionReport {
            iterations: 1,
            final_position: 0,
            final_error: 0,
        }));
        assert!(MotionHandle::new(shared.clone()).wait().is_ok());
        assert!(matches!(
            MotionHandle::new(shared).wait(),
            Err(ClientError::Cancelled { .. })
        ));
    }
}
