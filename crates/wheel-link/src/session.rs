//! Transport Session - 独占唯一连接的一问一答会话
//!
//! # 重试策略
//!
//! - 未连接时，先尝试一次重连再继续
//! - 任何传输失败后，恰好执行一次"重连 + 重发"
//! - 第二次失败：会话标记为断开，返回错误（调用方必须显式重连）
//!
//! 重试用显式的有界循环实现，保证调用一定终止。

use crate::{Connector, Link, LinkError};
use tracing::{debug, info, warn};
use wheel_protocol::{Command, decode, encode};

/// 每次调用允许的最大重试次数
pub const MAX_RETRIES: usize = 1;

/// 传输会话
///
/// 会话是 socket 的唯一所有者，其他组件都必须通过它收发。
pub struct Session {
    connector: Box<dyn Connector>,
    link: Option<Box<dyn Link>>,
    last_reply: Option<String>,
    reconnects: u64,
}

impl Session {
    /// 创建未连接的会话
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_boxed(Box::new(connector))
    }

    /// 使用已装箱的连接工厂创建未连接的会话
    pub fn from_boxed(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            link: None,
            last_reply: None,
            reconnects: 0,
        }
    }

    /// 建立连接（已连接时先关闭旧连接）
    ///
    /// 失败时会话保持断开。
    pub fn connect(&mut self) -> Result<(), LinkError> {
        self.drop_link();
        match self.connector.connect() {
            Ok(link) => {
                info!("Connected to {}", self.connector.peer());
                self.link = Some(link);
                Ok(())
            },
            Err(e) => {
                warn!("Connect to {} failed: {}", self.connector.peer(), e);
                Err(e)
            },
        }
    }

    /// 是否已连接
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// 断开连接（幂等）
    pub fn disconnect(&mut self) {
        if self.link.is_some() {
            info!("Disconnected from {}", self.connector.peer());
        }
        self.drop_link();
    }

    /// 发送命令并读取一帧应答
    ///
    /// 只接受 [`Command`]：类型本身保证命令已经通过白名单。
    pub fn send_and_receive(&mut self, command: &Command) -> Result<String, LinkError> {
        if !self.is_connected() {
            debug!("Not connected, attempting to connect before {}", command);
            if let Err(e) = self.reconnect() {
                self.last_reply = None;
                return Err(e);
            }
        }

        let frame = encode(command.as_str());
        let mut last_err = LinkError::NotConnected;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!("Reconnecting to resend {} (attempt {})", command, attempt);
                if let Err(e) = self.reconnect() {
                    self.last_reply = None;
                    return Err(e);
                }
            }

            match self.exchange(&frame) {
                Ok(reply) => {
                    debug!("{} -> {:?}", command, reply);
                    self.last_reply = Some(reply.clone());
                    return Ok(reply);
                },
                Err(e) => {
                    warn!("Send/receive of {} failed: {}", command, e);
                    self.drop_link();
                    last_err = e;
                },
            }
        }

        self.last_reply = None;
        Err(last_err)
    }

    /// 最近一次成功收到的应答
    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    /// 自动重连次数（用于诊断）
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects
    }

    /// 对端描述
    pub fn peer(&self) -> String {
        self.connector.peer()
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        self.reconnects += 1;
        self.connect()
    }

    fn exchange(&mut self, frame: &[u8]) -> Result<String, LinkError> {
        let link = self.link.as_mut().ok_or(LinkError::NotConnected)?;
        link.send_frame(frame)?;
        let reply = link.receive_frame()?;
        Ok(decode(&reply))
    }

    fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.shutdown();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.drop_link();
    }
}
