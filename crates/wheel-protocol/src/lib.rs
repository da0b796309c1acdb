//! # Wheel Protocol
//!
//! 靶轮控制器 ASCII 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `frame`: 帧封装/解封（`0x00 0x07` 帧头 + ASCII 命令 + `0x0D` 结束符）
//! - `register`: 控制器寄存器表（查询令牌、写前缀、精度、取值范围）
//! - `command`: 类型安全的命令构建
//! - `validate`: 命令白名单校验（唯一的安全边界）
//! - `reply`: 应答解析（`<key>=<number>`、ACK/NACK）
//! - `constants`: 协议常量
//!
//! ## 安全边界
//!
//! 任何到达线路的命令都必须先通过 [`validate`]。类型化构建的 [`Command`]
//! 在构造时已经满足白名单；原始字符串（诊断用）则在发送前显式校验。

pub mod command;
pub mod constants;
pub mod frame;
pub mod register;
pub mod reply;
pub mod validate;

pub use command::{Action, Command};
pub use constants::*;
pub use frame::{decode, encode};
pub use register::Register;
pub use reply::{Reading, ReplyKind, parse_reading};
pub use validate::{is_number_literal, validate};

use thiserror::Error;

/// 协议层错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// 命令未通过白名单校验，永远不会到达线路
    #[error("Command rejected by validator: {command:?}")]
    Rejected { command: String },

    /// 应答无法解析为期望的形状
    #[error("Malformed reply to {command:?}: {reply:?}")]
    MalformedReply { command: String, reply: String },

    /// 控制器返回 NACK（`?` 开头的应答）
    #[error("Controller refused {command:?} (code {code:?})")]
    Nack { command: String, code: String },

    /// 写入值超出寄存器允许范围
    #[error("Invalid value for {register}: {value} ({reason})")]
    InvalidValue {
        register: Register,
        value: f64,
        reason: String,
    },

    /// 寄存器只读
    #[error("Register {0} is read-only")]
    ReadOnly(Register),
}

impl ProtocolError {
    /// 触发此错误的命令（如果有）
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Rejected { command }
            | Self::MalformedReply { command, .. }
            | Self::Nack { command, .. } => Some(command),
            Self::InvalidValue { .. } | Self::ReadOnly(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_command() {
        let err = ProtocolError::Rejected {
            command: "AC12x".to_string(),
        };
        assert!(err.to_string().contains("AC12x"));
        assert_eq!(err.command(), Some("AC12x"));

        let err = ProtocolError::Nack {
            command: "VE900".to_string(),
            code: "3".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("VE900") && msg.contains('3'), "{msg}");
    }

    #[test]
    fn test_invalid_value_has_no_command() {
        let err = ProtocolError::InvalidValue {
            register: Register::Velocity,
            value: 500.0,
            reason: "above maximum 80".to_string(),
        };
        assert_eq!(err.command(), None);
        assert!(err.to_string().contains("velocity"));
    }
}
