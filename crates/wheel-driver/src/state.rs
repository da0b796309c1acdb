//! 设备状态缓存
//!
//! [`DeviceState`] 是控制器寄存器的不可变快照。字段只在显式轮询后更新，
//! 控制器不会主动推送。快照通过 `ArcSwap` 发布，读取方无锁、不阻塞 IO。

use std::time::Instant;
use wheel_protocol::{Reading, Register, STEPS_PER_REVOLUTION};

/// 设备状态快照
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceState {
    readings: [Reading; Register::COUNT],
    /// 最近一次任意字段更新的时间
    pub updated_at: Option<Instant>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            readings: [Reading::Unknown; Register::COUNT],
            updated_at: None,
        }
    }
}

impl DeviceState {
    /// 某个寄存器的读数
    #[inline]
    pub fn reading(&self, register: Register) -> Reading {
        self.readings[register.index()]
    }

    /// 某个寄存器的数值（`Unknown` 与 `NotANumber` 都返回 `None`）
    #[inline]
    pub fn value(&self, register: Register) -> Option<f64> {
        self.reading(register).value()
    }

    /// 更新一个字段
    pub fn set(&mut self, register: Register, reading: Reading) {
        self.readings[register.index()] = reading;
        self.updated_at = Some(Instant::now());
    }

    /// 按寄存器顺序遍历全部读数
    pub fn iter(&self) -> impl Iterator<Item = (Register, Reading)> + '_ {
        Register::ALL.into_iter().map(|r| (r, self.reading(r)))
    }

    // ==================== 位置 ====================

    /// 绝对位置（步）
    pub fn position(&self) -> Option<i64> {
        self.reading(Register::Position).as_i64()
    }

    /// 圈内位置，`[0, N)`，负位置同样适用
    pub fn mod_position(&self) -> Option<i64> {
        self.position().map(mod_position)
    }

    /// 圈数（浮点）
    pub fn revolutions(&self) -> Option<f64> {
        self.position()
            .map(|p| p as f64 / STEPS_PER_REVOLUTION as f64)
    }

    // ==================== 运动参数 ====================

    pub fn velocity(&self) -> Option<f64> {
        self.value(Register::Velocity)
    }

    pub fn acceleration(&self) -> Option<f64> {
        self.value(Register::Acceleration)
    }

    pub fn deceleration(&self) -> Option<f64> {
        self.value(Register::Deceleration)
    }

    pub fn max_acceleration(&self) -> Option<f64> {
        self.value(Register::MaxAcceleration)
    }

    pub fn move_distance(&self) -> Option<i64> {
        self.reading(Register::MoveDistance).as_i64()
    }

    pub fn jog_speed(&self) -> Option<f64> {
        self.value(Register::JogSpeed)
    }

    pub fn jog_acceleration(&self) -> Option<f64> {
        self.value(Register::JogAcceleration)
    }

    // ==================== 扫描 / 锁定 ====================

    pub fn sweep_mask(&self) -> Option<u16> {
        self.reading(Register::SweepMask)
            .as_i64()
            .and_then(|m| u16::try_from(m).ok())
    }

    pub fn lock_demand_position(&self) -> Option<i64> {
        self.reading(Register::LockDemandPosition).as_i64()
    }

    pub fn lock_motor_demand(&self) -> Option<i64> {
        self.reading(Register::LockMotorDemand).as_i64()
    }

    // ==================== 遥测 ====================

    pub fn temperature(&self) -> Option<f64> {
        self.value(Register::Temperature)
    }

    pub fn encoder_velocity(&self) -> Option<f64> {
        self.value(Register::EncoderVelocity)
    }

    pub fn motor_velocity(&self) -> Option<f64> {
        self.value(Register::MotorVelocity)
    }

    pub fn torque_reference(&self) -> Option<f64> {
        self.value(Register::TorqueReference)
    }
}

/// 绝对位置对一圈取欧几里得余数，结果总在 `[0, N)`
#[inline]
pub fn mod_position(position: i64) -> i64 {
    position.rem_euclid(STEPS_PER_REVOLUTION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        let state = DeviceState::default();
        assert!(state.iter().all(|(_, r)| r == Reading::Unknown));
        assert_eq!(state.position(), None);
        assert_eq!(state.updated_at, None);
    }

    #[test]
    fn test_mod_position_negative() {
        assert_eq!(mod_position(-1), 8191);
        assert_eq!(mod_position(-8192), 0);
        assert_eq!(mod_position(8292), 100);
    }

    #[test]
    fn test_derived_position_fields() {
        let mut state = DeviceState::default();
        state.set(Register::Position, Reading::Value(-4096.0));
        assert_eq!(state.position(), Some(-4096));
        assert_eq!(state.mod_position(), Some(4096));
        assert_eq!(state.revolutions(), Some(-0.5));
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn test_not_a_number_field() {
        let mut state = DeviceState::default();
        state.set(Register::Temperature, Reading::NotANumber);
        assert_eq!(state.temperature(), None);
        assert_eq!(state.reading(Register::Temperature), Reading::NotANumber);
    }

    #[test]
    fn test_sweep_mask_out_of_range() {
        let mut state = DeviceState::default();
        state.set(Register::SweepMask, Reading::Value(70000.0));
        assert_eq!(state.sweep_mask(), None);
        state.set(Register::SweepMask, Reading::Value(5.0));
        assert_eq!(state.sweep_mask(), Some(5));
    }
}
