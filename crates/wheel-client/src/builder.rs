//! Client 层 Wheel Builder
//!
//! 提供链式 API 创建并连接 [`WheelClient`]。

use crate::client::WheelClient;
use crate::control::{PidConfig, SettleConfig};
use crate::error::Result;
use std::time::Duration;
use wheel_driver::HeartbeatConfig;
use wheel_link::{Connector, DEFAULT_READ_TIMEOUT, TcpConnector};
use wheel_protocol::DEFAULT_PORT;

/// 控制器默认地址
pub const DEFAULT_HOST: &str = "192.168.203.68";

/// Client 层 Wheel Builder
///
/// # 示例
///
/// ```rust,no_run
/// use wheel_client::{PidConfig, WheelBuilder};
/// use std::time::Duration;
///
/// # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
/// // 默认地址和端口
/// let wheel = WheelBuilder::new().connect()?;
///
/// // 完整配置
/// let wheel = WheelBuilder::new()
///     .host("10.0.0.5")
///     .port(7776)
///     .timeout(Duration::from_millis(500))
///     .pid(PidConfig::default().with_gains(0.4, 0.0, 0.05))
///     .connect()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WheelBuilder {
    host: String,
    port: u16,
    timeout: Duration,
    pid: PidConfig,
    heartbeat: HeartbeatConfig,
    settle: SettleConfig,
}

impl WheelBuilder {
    /// 创建新的 Builder
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置控制器地址（默认: 192.168.203.68）
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// 设置 TCP 端口（默认: 7776）
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 设置连接/读/写超时（默认: 1 秒）
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置 PID 参数
    pub fn pid(mut self, pid: PidConfig) -> Self {
        self.pid = pid;
        self
    }

    /// 设置心跳周期
    pub fn heartbeat(mut self, heartbeat: HeartbeatConfig) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// 设置静止检测参数
    pub fn settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    /// 通过 TCP 连接控制器
    pub fn connect(self) -> Result<WheelClient> {
        let connector =
            TcpConnector::new(self.host.clone(), self.port).with_timeout(self.timeout);
        self.connect_with(connector)
    }

    /// 使用自定义连接工厂（测试、模拟控制器）
    pub fn connect_with(self, connector: impl Connector + 'static) -> Result<WheelClient> {
        self.pid.validate()?;
        WheelClient::open(connector, self.pid, self.heartbeat, self.settle)
    }
}

impl Default for WheelBuilder {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_READ_TIMEOUT,
            pid: PidConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            settle: SettleConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use wheel_link::mock::MockController;

    #[test]
    fn test_builder_defaults() {
        let builder = WheelBuilder::new();
        assert_eq!(builder.host, DEFAULT_HOST);
        assert_eq!(builder.port, 7776);
        assert_eq!(builder.timeout, Duration::from_secs(1));
        assert_eq!(builder.pid, PidConfig::default());
    }

    #[test]
    fn test_builder_chain() {
        let builder = WheelBuilder::new().host("10.0.0.5").port(9000);
        assert_eq!(builder.host, "10.0.0.5");
        assert_eq!(builder.port, 9000);
    }

    #[test]
    fn test_invalid_pid_is_rejected_before_connecting() {
        let sim = MockController::new();
        let pid = PidConfig {
            max_step_speed: -1,
            ..PidConfig::default()
        };
        let result = WheelBuilder::new().pid(pid).connect_with(sim.connector());
        assert!(matches!(result, Err(ClientError::InvalidParameter { .. })));
        assert_eq!(sim.connect_count(), 0);
    }

    #[test]
    fn test_refused_connection_is_connection_error() {
        let sim = MockController::new();
        sim.refuse_connections(true);
        let result = WheelBuilder::new().connect_with(sim.connector());
        assert!(matches!(result, Err(ClientError::Connection { .. })));
    }
}
