//! 运动模式定义
//!
//! 控制器只有一个运动引擎，任一时刻至多一个非 Idle 模式处于活动状态。

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 运动模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Mode {
    /// 空闲（默认）
    #[default]
    Idle = 0,
    /// 连续点动
    Jogging = 1,
    /// 固件扫描程序
    Sweeping = 2,
    /// 闭环锁定（无界 PID）
    Locking = 3,
    /// 单次闭环移动（有界 PID）
    MovingOnce = 4,
}

impl Mode {
    /// 从 u8 转换，无效值视为 Idle
    pub fn from_u8(value: u8) -> Self {
        Self::try_from(value).unwrap_or(Self::Idle)
    }

    pub fn is_idle(self) -> bool {
        self == Self::Idle
    }

    /// 是否由 PID 会话驱动
    pub fn is_closed_loop(self) -> bool {
        matches!(self, Self::Locking | Self::MovingOnce)
    }

    /// 心跳是否需要快速轮询
    pub fn wants_fast_poll(self) -> bool {
        matches!(self, Self::Jogging | Self::Sweeping)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Jogging => "jogging",
            Self::Sweeping => "sweeping",
            Self::Locking => "locking",
            Self::MovingOnce => "moving",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 运动模式（原子版本，用于线程间共享）
#[derive(Debug, Default)]
pub struct AtomicMode {
    inner: AtomicU8,
}

impl AtomicMode {
    pub fn new(mode: Mode) -> Self {
        Self {
            inner: AtomicU8::new(mode.into()),
        }
    }

    pub fn get(&self, ordering: Ordering) -> Mode {
        Mode::from_u8(self.inner.load(ordering))
    }

    pub fn set(&self, mode: Mode, ordering: Ordering) {
        self.inner.store(mode.into(), ordering);
    }

    /// 设置新模式并返回旧模式
    pub fn swap(&self, mode: Mode, ordering: Ordering) -> Mode {
        Mode::from_u8(self.inner.swap(mode.into(), ordering))
    }

    /// 比较并交换
    ///
    /// 成功返回 `Ok(())`，失败返回实际的当前模式。
    pub fn compare_exchange(
        &self,
        current: Mode,
        new: Mode,
        success: Ordering,
        failure: Ordering,
    ) -> Result<(), Mode> {
        self.inner
            .compare_exchange(current.into(), new.into(), success, failure)
            .map(|_| ())
            .map_err(Mode::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_conversions() {
        assert_eq!(u8::from(Mode::Idle), 0);
        assert_eq!(u8::from(Mode::MovingOnce), 4);
        assert_eq!(Mode::from_u8(3), Mode::Locking);
        assert_eq!(Mode::from_u8(255), Mode::Idle);
    }

    #[test]
    fn test_mode_classification() {
        assert!(Mode::Locking.is_closed_loop());
        assert!(Mode::MovingOnce.is_closed_loop());
        assert!(!Mode::Jogging.is_closed_loop());
        assert!(Mode::Sweeping.wants_fast_poll());
        assert!(!Mode::Idle.wants_fast_poll());
    }

    #[test]
    fn test_atomic_mode() {
        let mode = AtomicMode::new(Mode::Idle);
        assert!(
            mode.compare_exchange(Mode::Idle, Mode::Jogging, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        );
        assert_eq!(
            mode.compare_exchange(Mode::Idle, Mode::Sweeping, Ordering::AcqRel, Ordering::Acquire),
            Err(Mode::Jogging)
        );
        assert_eq!(mode.swap(Mode::Idle, Ordering::AcqRel), Mode::Jogging);
        assert_eq!(mode.get(Ordering::Acquire), Mode::Idle);
    }
}
