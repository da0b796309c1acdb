//! # Wheel Link Layer
//!
//! 传输层抽象：把"连接"和"一问一答"从具体 socket 中分离出来。
//!
//! - [`Link`]：一条已建立的连接，负责发送一帧、接收一帧
//! - [`Connector`]：连接工厂，负责（重新）建立 [`Link`]
//! - [`Session`]：独占唯一的连接，提供带一次重连重试的 `send_and_receive`
//! - [`TcpConnector`]：生产环境使用的 TCP 实现
//! - `mock`（feature）：模拟控制器，用于无硬件测试

use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub mod session;
pub mod tcp;

#[cfg(feature = "mock")]
pub mod mock;

pub use session::Session;
pub use tcp::{TcpConnector, TcpLink};

/// 固定的读超时（每次往返的上限）
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
    #[error("Not connected")]
    NotConnected,
    #[error("Reply frame exceeds {limit} bytes")]
    FrameTooLong { limit: usize },
    #[error("Cannot resolve address {addr}")]
    Resolve { addr: String },
}

impl LinkError {
    /// 是否为超时（包括底层 IO 超时）
    pub fn is_timeout(&self) -> bool {
        match self {
            LinkError::Timeout => true,
            LinkError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// 一条已建立的连接
pub trait Link: Send {
    /// 发送一个完整的线路帧
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// 接收一个完整的应答帧（含帧头和结束符），受读超时约束
    fn receive_frame(&mut self) -> Result<Bytes, LinkError>;

    /// 尽力关闭连接
    fn shutdown(&mut self) {}
}

/// 连接工厂
pub trait Connector: Send + Sync {
    /// 建立一条新连接
    fn connect(&self) -> Result<Box<dyn Link>, LinkError>;

    /// 对端描述（用于日志）
    fn peer(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_classification() {
        assert!(LinkError::Timeout.is_timeout());
        let io = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        assert!(LinkError::Io(io).is_timeout());
        assert!(!LinkError::Closed.is_timeout());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(LinkError::Timeout.to_string(), "Read timeout");
        assert!(
            LinkError::FrameTooLong { limit: 1024 }
                .to_string()
                .contains("1024")
        );
    }
}
