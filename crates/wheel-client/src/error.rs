//! 错误类型体系
//!
//! 客户端对外的统一错误类型，区分致命错误与可恢复错误。
//!
//! # 示例
//!
//! ```rust
//! use wheel_client::ClientError;
//!
//! fn handle_error(err: ClientError) {
//!     if err.is_fatal() {
//!         eprintln!("致命错误: {}", err);
//!         // 需要显式重连或人工检查设备
//!     } else if err.is_retryable() {
//!         eprintln!("可重试错误: {}", err);
//!     } else {
//!         eprintln!("错误: {}", err);
//!     }
//! }
//! ```

use crate::state::Mode;
use thiserror::Error;
use wheel_driver::DriverError;
use wheel_link::LinkError;
use wheel_protocol::ProtocolError;

/// 客户端错误类型
#[derive(Debug, Error)]
pub enum ClientError {
    // ==================== Fatal Errors ====================
    /// 传输失败：重连重试后仍失败，会话已断开
    #[error("Connection error during {command}: {source}")]
    Connection {
        /// 出错的命令或阶段
        command: String,
        #[source]
        source: LinkError,
    },

    /// 设备故障（例如位置读数无法解析）
    #[error("Device fault during {command}: {detail}")]
    Fault {
        /// 出错的命令或阶段
        command: String,
        /// 故障描述
        detail: String,
    },

    // ==================== Recoverable Errors ====================
    /// 协议错误（白名单拒绝、控制器 NACK、应答格式错误）
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// 闭环运动被取消
    #[error("Motion cancelled after {iterations} iterations")]
    Cancelled {
        /// 已完成的迭代次数
        iterations: u64,
    },

    /// 迭代预算耗尽仍未到位
    #[error("Iteration budget of {budget} exhausted ({last_error} steps from target)")]
    BudgetExceeded {
        /// 迭代预算
        budget: u64,
        /// 最后一次误差（步）
        last_error: i64,
    },

    /// 模式冲突：已有其他运动模式处于活动状态
    #[error("Cannot start {requested} while {active} is active")]
    ModeConflict {
        /// 当前活动模式
        active: Mode,
        /// 请求的模式
        requested: Mode,
    },

    /// 命令需要 Idle，但有运动模式处于活动状态
    #[error("{command} refused while {active} is active")]
    Busy {
        /// 被拒绝的命令或阶段
        command: String,
        /// 当前活动模式
        active: Mode,
    },

    /// 无效的状态转换（例如未锁定时更新锁定目标）
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition {
        /// 当前模式
        from: Mode,
        /// 目标模式
        to: Mode,
    },

    /// 等待超时
    #[error("Timed out waiting for {phase} after {timeout_ms}ms")]
    Timeout {
        /// 等待阶段
        phase: String,
        /// 超时时间（毫秒）
        timeout_ms: u64,
    },

    // ==================== Configuration Errors ====================
    /// 参数无效
    #[error("Invalid parameter '{param}': {reason}")]
    InvalidParameter {
        /// 参数名
        param: String,
        /// 原因
        reason: String,
    },
}

impl ClientError {
    /// 是否为致命错误
    ///
    /// 致命错误之后必须显式重连或检查设备。
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Fault { .. })
    }

    /// 是否可重试
    ///
    /// 可重试错误表示重新执行操作可能会成功。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BudgetExceeded { .. }
                | Self::Timeout { .. }
                | Self::ModeConflict { .. }
                | Self::Busy { .. }
        ) || matches!(self, Self::Protocol(ProtocolError::Nack { .. }))
    }

    /// 触发错误的命令或阶段
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Connection { command, .. } | Self::Fault { command, .. } => Some(command),
            Self::Protocol(e) => e.command(),
            Self::Timeout { phase, .. } => Some(phase),
            Self::Busy { command, .. } => Some(command),
            Self::InvalidParameter { param, .. } => Some(param),
            Self::Cancelled { .. } | Self::BudgetExceeded { .. } => Some("move"),
            Self::ModeConflict { .. } | Self::InvalidTransition { .. } => None,
        }
    }

    /// 创建无效参数错误
    pub fn invalid_parameter(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// 创建忙错误
    pub fn busy(command: impl Into<String>, active: Mode) -> Self {
        Self::Busy {
            command: command.into(),
            active,
        }
    }

    /// 创建模式冲突错误
    pub fn mode_conflict(active: Mode, requested: Mode) -> Self {
        Self::ModeConflict { active, requested }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::InvalidValue {
                register,
                value,
                reason,
            } => Self::InvalidParameter {
                param: register.name().to_string(),
                reason: format!("{value}: {reason}"),
            },
            ProtocolError::ReadOnly(register) => Self::InvalidParameter {
                param: register.name().to_string(),
                reason: "register is read-only".to_string(),
            },
            other => Self::Protocol(other),
        }
    }
}

impl From<DriverError> for ClientError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Connection { command, source } => Self::Connection { command, source },
            DriverError::Protocol(e) => e.into(),
            DriverError::Fault { command, reply } => Self::Fault {
                command,
                detail: format!("unreadable reply {reply:?}"),
            },
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, ClientError>;
