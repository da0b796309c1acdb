//! 圆周位置空间
//!
//! 固件只支持相对移动，目标以圈内位置 `[0, N)` 给出。
//! 把目标展开为绝对位置时总是走最短弧：增量被折叠到 `(-N/2, N/2]`，
//! 恰好半圈时取 `+N/2`。

use crate::error::ClientError;
use wheel_protocol::STEPS_PER_REVOLUTION;

const N: i64 = STEPS_PER_REVOLUTION;
const HALF: i64 = N / 2;

/// 把任意增量折叠到 `(-N/2, N/2]`
///
/// 结果与输入相差 N 的整数倍。
///
/// ```rust
/// use wheel_client::control::wrap_delta;
///
/// assert_eq!(wrap_delta(8192 - 100), -100);
/// assert_eq!(wrap_delta(-4096), 4096);
/// ```
pub fn wrap_delta(delta: i64) -> i64 {
    let wrapped = (delta + HALF).rem_euclid(N) - HALF;
    if wrapped == -HALF { HALF } else { wrapped }
}

/// 校验圈内目标位置
pub fn check_mod_target(target_mod: i64) -> Result<i64, ClientError> {
    if (0..N).contains(&target_mod) {
        Ok(target_mod)
    } else {
        Err(ClientError::invalid_parameter(
            "target_mod",
            format!("{target_mod} outside [0, {N})"),
        ))
    }
}

/// 由当前绝对位置和圈内目标计算绝对目标（最短弧）
///
/// ```rust
/// use wheel_client::control::unwrap_target;
///
/// assert_eq!(unwrap_target(8000, 100).unwrap(), 8292);
/// assert!(unwrap_target(0, 8192).is_err());
/// ```
pub fn unwrap_target(current: i64, target_mod: i64) -> Result<i64, ClientError> {
    let target_mod = check_mod_target(target_mod)?;
    let delta = wrap_delta(target_mod - current.rem_euclid(N));
    current.checked_add(delta).ok_or_else(|| ClientError::Fault {
        command: "unwrap target".to_string(),
        detail: format!("position {current} out of range"),
    })
}
