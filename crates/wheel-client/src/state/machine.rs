//! Motion Mode Manager - 单一活动模式状态机
//!
//! 所有转换都是 Idle 与某个非 Idle 模式之间的对称进出：
//!
//! ```text
//!            ┌──► Jogging ────┐
//!            ├──► Sweeping ───┤
//!   Idle ────┼──► Locking ────┼───► Idle
//!            └──► MovingOnce ─┘
//! ```
//!
//! 进入任何非 Idle 模式都必须从 Idle 出发，否则返回 `ModeConflict`。
//! 转换通过 CAS 完成，多个线程同时请求时只有一个成功。

use super::mode::{AtomicMode, Mode};
use crate::error::ClientError;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// 运动模式管理器
#[derive(Debug, Default)]
pub struct ModeManager {
    mode: AtomicMode,
}

impl ModeManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前模式
    pub fn current(&self) -> Mode {
        self.mode.get(Ordering::Acquire)
    }

    /// 从 Idle 进入 `requested`
    pub fn try_enter(&self, requested: Mode) -> Result<(), ClientError> {
        if requested.is_idle() {
            return Ok(());
        }
        self.mode
            .compare_exchange(Mode::Idle, requested, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|active| ClientError::mode_conflict(active, requested))?;
        info!("Mode: idle -> {}", requested);
        Ok(())
    }

    /// 从 `expected` 回到 Idle
    ///
    /// 当前模式不是 `expected` 时不做任何事并返回 `false`。
    pub fn leave(&self, expected: Mode) -> bool {
        if expected.is_idle() {
            return false;
        }
        let left = self
            .mode
            .compare_exchange(expected, Mode::Idle, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if left {
            info!("Mode: {} -> idle", expected);
        } else {
            debug!("Mode leave({}) ignored, current {}", expected, self.current());
        }
        left
    }

    /// 无条件回到 Idle，返回之前的模式
    pub fn force_idle(&self) -> Mode {
        let previous = self.mode.swap(Mode::Idle, Ordering::AcqRel);
        if !previous.is_idle() {
            info!("Mode: {} -> idle (forced)", previous);
        }
        previous
    }

    /// 要求当前为 Idle，否则以 `command` 报告忙
    pub fn require_idle(&self, command: &str) -> Result<(), ClientError> {
        match self.current() {
            Mode::Idle => Ok(()),
            active => Err(ClientError::busy(command, active)),
        }
    }
}
