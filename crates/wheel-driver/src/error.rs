//! 驱动层错误类型定义

use thiserror::Error;
use wheel_link::LinkError;
use wheel_protocol::ProtocolError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输失败（重连重试后仍失败）
    #[error("Connection error during {command}: {source}")]
    Connection {
        command: String,
        #[source]
        source: LinkError,
    },

    /// 协议错误（校验失败、NACK、值越界）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 设备应答无法解析（例如位置读数不是数字）
    #[error("Device fault: unreadable reply to {command}: {reply:?}")]
    Fault { command: String, reply: String },
}

impl DriverError {
    /// 触发错误的命令或阶段
    pub fn command(&self) -> Option<&str> {
        match self {
            DriverError::Connection { command, .. } | DriverError::Fault { command, .. } => {
                Some(command)
            },
            DriverError::Protocol(e) => e.command(),
        }
    }

    /// 是否为连接错误
    pub fn is_connection(&self) -> bool {
        matches!(self, DriverError::Connection { .. })
    }

    pub(crate) fn connection(command: impl Into<String>, source: LinkError) -> Self {
        DriverError::Connection {
            command: command.into(),
            source,
        }
    }
}
