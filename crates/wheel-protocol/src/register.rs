//! 控制器寄存器表
//!
//! 每个缓存字段对应一个 [`Register`]，寄存器携带：
//! - 读查询令牌（裸命令，如 `VE`、`RUe1`）
//! - 写前缀（可选，只读遥测没有写前缀）
//! - 写入格式的小数精度
//! - 本地可校验的取值范围
//!
//! 校验器、设备状态缓存和 CLI 都从这张表派生，保证三者一致。

use crate::ProtocolError;
use crate::constants::STEPS_PER_REVOLUTION;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;
use std::str::FromStr;

/// 控制器寄存器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Register {
    // ==================== 编码器 ====================
    /// 绝对位置（步，单调、有符号），读 `RUe1`，写 `EP`
    Position = 0,
    /// 控制模式（只读）
    CommandMode,

    // ==================== 点到点运动 ====================
    /// 速度（rev/s）
    Velocity,
    /// 加速度（rev/s²）
    Acceleration,
    /// 减速度（rev/s²）
    Deceleration,
    /// 最大加速度（rev/s²）
    MaxAcceleration,
    /// 相对移动距离（步）
    MoveDistance,

    // ==================== 点动 ====================
    /// 点动速度（rev/s）
    JogSpeed,
    /// 点动加速度（rev/s²）
    JogAcceleration,

    // ==================== 扫描程序 ====================
    /// 扫描靶位掩码（每个靶位一位）
    SweepMask,
    /// 扫描辐条宽度（步）
    SweepWidth,
    /// 扫描偏移（步）
    SweepOffset,
    /// 扫描速度（rev/s）
    SweepSpeed,
    /// 扫描截止
    SweepCutoff,

    // ==================== 锁定模式 ====================
    /// 锁定目标位置（步）
    LockDemandPosition,
    /// 锁定更新间隔（ms）
    LockUpdateInterval,
    /// 锁定快速回转速度（rev/s）
    LockSlewFast,
    /// 锁定慢速回转速度（rev/s）
    LockSlewSlow,
    /// 电机目标位置（只读）
    LockMotorDemand,

    // ==================== 遥测（只读） ====================
    /// 驱动器温度
    Temperature,
    /// 编码器速度
    EncoderVelocity,
    /// 电机速度
    MotorVelocity,
    /// 力矩参考
    TorqueReference,
}

const SPEED_RANGE: (f64, f64) = (0.0042, 80.0);
const ACCEL_RANGE: (f64, f64) = (0.167, 5461.167);
const STEP_RANGE: (f64, f64) = (i32::MIN as f64, i32::MAX as f64);
const REVOLUTION_RANGE: (f64, f64) = (0.0, STEPS_PER_REVOLUTION as f64);

impl Register {
    /// 寄存器总数
    pub const COUNT: usize = 23;

    /// 全部寄存器（按声明顺序）
    pub const ALL: [Register; Register::COUNT] = [
        Register::Position,
        Register::CommandMode,
        Register::Velocity,
        Register::Acceleration,
        Register::Deceleration,
        Register::MaxAcceleration,
        Register::MoveDistance,
        Register::JogSpeed,
        Register::JogAcceleration,
        Register::SweepMask,
        Register::SweepWidth,
        Register::SweepOffset,
        Register::SweepSpeed,
        Register::SweepCutoff,
        Register::LockDemandPosition,
        Register::LockUpdateInterval,
        Register::LockSlewFast,
        Register::LockSlewSlow,
        Register::LockMotorDemand,
        Register::Temperature,
        Register::EncoderVelocity,
        Register::MotorVelocity,
        Register::TorqueReference,
    ];

    /// 遥测寄存器（心跳与控制循环中顺带刷新）
    pub const TELEMETRY: [Register; 4] = [
        Register::Temperature,
        Register::EncoderVelocity,
        Register::MotorVelocity,
        Register::TorqueReference,
    ];

    /// 数组下标（用于状态缓存）
    #[inline]
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    /// 读查询令牌
    pub fn query(self) -> &'static str {
        match self {
            Register::Position => "RUe1",
            Register::CommandMode => "CM",
            Register::Velocity => "VE",
            Register::Acceleration => "AC",
            Register::Deceleration => "DE",
            Register::MaxAcceleration => "AM",
            Register::MoveDistance => "DI",
            Register::JogSpeed => "JS",
            Register::JogAcceleration => "JA",
            Register::SweepMask => "RLA",
            Register::SweepWidth => "RLB",
            Register::SweepOffset => "RLC",
            Register::SweepSpeed => "RLD",
            Register::SweepCutoff => "RLE",
            Register::LockDemandPosition => "RLF",
            Register::LockUpdateInterval => "RLG",
            Register::LockSlewFast => "RLH",
            Register::LockSlewSlow => "RLI",
            Register::LockMotorDemand => "RLJ",
            Register::Temperature => "RUt1",
            Register::EncoderVelocity => "RUv1",
            Register::MotorVelocity => "RUw1",
            Register::TorqueReference => "RUx1",
        }
    }

    /// 写前缀（只读寄存器返回 `None`）
    pub fn write_prefix(self) -> Option<&'static str> {
        match self {
            Register::Position => Some("EP"),
            Register::CommandMode
            | Register::LockMotorDemand
            | Register::Temperature
            | Register::EncoderVelocity
            | Register::MotorVelocity
            | Register::TorqueReference => None,
            other => Some(other.query()),
        }
    }

    /// 是否可写
    #[inline]
    pub fn is_writable(self) -> bool {
        self.write_prefix().is_some()
    }

    /// 写入格式的小数位数
    pub fn precision(self) -> usize {
        match self {
            Register::Position
            | Register::CommandMode
            | Register::MoveDistance
            | Register::SweepMask
            | Register::SweepWidth
            | Register::SweepOffset
            | Register::LockDemandPosition
            | Register::LockUpdateInterval
            | Register::LockMotorDemand => 0,
            Register::JogSpeed => 1,
            _ => 3,
        }
    }

    /// 允许的写入范围（闭区间）
    pub fn range(self) -> Option<(f64, f64)> {
        match self {
            Register::Velocity
            | Register::JogSpeed
            | Register::SweepSpeed
            | Register::LockSlewFast
            | Register::LockSlewSlow => Some(SPEED_RANGE),
            Register::Acceleration
            | Register::Deceleration
            | Register::MaxAcceleration
            | Register::JogAcceleration => Some(ACCEL_RANGE),
            Register::Position | Register::MoveDistance | Register::LockDemandPosition => {
                Some(STEP_RANGE)
            },
            Register::SweepMask => Some((0.0, u16::MAX as f64)),
            Register::SweepWidth | Register::SweepOffset => Some(REVOLUTION_RANGE),
            Register::SweepCutoff => Some((0.0, f64::MAX)),
            Register::LockUpdateInterval => Some((1.0, 60_000.0)),
            _ => None,
        }
    }

    /// 按寄存器精度量化写入值
    pub fn quantize(self, value: f64) -> f64 {
        let scale = 10f64.powi(self.precision() as i32);
        (value * scale).round() / scale
    }

    /// 本地校验写入值，返回量化后的值
    ///
    /// 校验顺序：可写 → 有限 → 整数寄存器无小数部分 → 量化后在范围内。
    pub fn check(self, value: f64) -> Result<f64, ProtocolError> {
        if !self.is_writable() {
            return Err(ProtocolError::ReadOnly(self));
        }

        let invalid = |reason: String| ProtocolError::InvalidValue {
            register: self,
            value,
            reason,
        };

        if !value.is_finite() {
            return Err(invalid("value must be finite".to_string()));
        }
        if self.precision() == 0 && value.fract() != 0.0 {
            return Err(invalid("value must be an integer".to_string()));
        }

        let quantized = self.quantize(value);
        if let Some((min, max)) = self.range() {
            if quantized < min {
                return Err(invalid(format!("below minimum {min}")));
            }
            if quantized > max {
                return Err(invalid(format!("above maximum {max}")));
            }
        }
        Ok(quantized)
    }

    /// 格式化写入值（不做校验）
    pub fn format_value(self, value: f64) -> String {
        format!("{:.*}", self.precision(), value)
    }

    /// 人类可读名称（snake_case）
    pub fn name(self) -> &'static str {
        match self {
            Register::Position => "position",
            Register::CommandMode => "command_mode",
            Register::Velocity => "velocity",
            Register::Acceleration => "acceleration",
            Register::Deceleration => "deceleration",
            Register::MaxAcceleration => "max_acceleration",
            Register::MoveDistance => "move_distance",
            Register::JogSpeed => "jog_speed",
            Register::JogAcceleration => "jog_acceleration",
            Register::SweepMask => "sweep_mask",
            Register::SweepWidth => "sweep_width",
            Register::SweepOffset => "sweep_offset",
            Register::SweepSpeed => "sweep_speed",
            Register::SweepCutoff => "sweep_cutoff",
            Register::LockDemandPosition => "lock_demand_position",
            Register::LockUpdateInterval => "lock_update_interval",
            Register::LockSlewFast => "lock_slew_fast",
            Register::LockSlewSlow => "lock_slew_slow",
            Register::LockMotorDemand => "lock_motor_demand",
            Register::Temperature => "temperature",
            Register::EncoderVelocity => "encoder_velocity",
            Register::MotorVelocity => "motor_velocity",
            Register::TorqueReference => "torque_reference",
        }
    }

    /// 根据查询令牌查找寄存器
    pub fn from_query(token: &str) -> Option<Register> {
        Register::ALL.into_iter().find(|r| r.query() == token)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Register {
    type Err = String;

    /// 接受 snake_case 名称或查询令牌（如 `jog_speed` 或 `JS`）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Register::ALL
            .into_iter()
            .find(|r| r.name() == s || r.query() == s)
            .ok_or_else(|| format!("unknown register: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_in_index_order() {
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i, "{reg} out of order");
            assert_eq!(Register::try_from(i as u8).unwrap(), *reg);
        }
    }

    #[test]
    fn test_queries_are_unique() {
        for a in Register::ALL {
            for b in Register::ALL {
                if a != b {
                    assert_ne!(a.query(), b.query(), "{a} and {b} share a query token");
                }
            }
        }
    }

    #[test]
    fn test_read_only_registers() {
        assert!(!Register::CommandMode.is_writable());
        assert!(!Register::LockMotorDemand.is_writable());
        for reg in Register::TELEMETRY {
            assert!(!reg.is_writable());
            assert!(matches!(reg.check(1.0), Err(ProtocolError::ReadOnly(_))));
        }
    }

    #[test]
    fn test_position_writes_through_ep() {
        assert_eq!(Register::Position.query(), "RUe1");
        assert_eq!(Register::Position.write_prefix(), Some("EP"));
    }

    #[test]
    fn test_check_ranges() {
        assert_eq!(Register::Velocity.check(10.0).unwrap(), 10.0);
        assert!(Register::Velocity.check(80.5).is_err());
        assert!(Register::Acceleration.check(0.1).is_err());
        assert!(Register::SweepMask.check(65536.0).is_err());
        assert!(Register::SweepWidth.check(8193.0).is_err());
        assert!(Register::LockUpdateInterval.check(0.0).is_err());
        assert!(Register::MoveDistance.check(-100.0).is_ok());
    }

    #[test]
    fn test_check_rejects_fractional_integers_and_nan() {
        assert!(Register::MoveDistance.check(1.5).is_err());
        assert!(Register::Velocity.check(f64::NAN).is_err());
        assert!(Register::Velocity.check(f64::INFINITY).is_err());
    }

    #[test]
    fn test_quantize_before_range_check() {
        // 点动速度精度为 1 位小数，0.04 会被量化为 0.0，低于下限
        assert!(Register::JogSpeed.check(0.04).is_err());
        assert_eq!(Register::JogSpeed.check(2.46).unwrap(), 2.5);
    }

    #[test]
    fn test_format_value() {
        assert_eq!(Register::JogSpeed.format_value(10.0), "10.0");
        assert_eq!(Register::JogAcceleration.format_value(1.5), "1.500");
        assert_eq!(Register::MoveDistance.format_value(-100.0), "-100");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("jog_speed".parse::<Register>().unwrap(), Register::JogSpeed);
        assert_eq!("RLA".parse::<Register>().unwrap(), Register::SweepMask);
        assert!("warp_drive".parse::<Register>().is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_uses_variant_names() {
        let json = serde_json::to_string(&Register::LockSlewFast).unwrap();
        assert_eq!(json, "\"LockSlewFast\"");
        assert_eq!(serde_json::from_str::<Register>(&json).unwrap(), Register::LockSlewFast);
    }
}
