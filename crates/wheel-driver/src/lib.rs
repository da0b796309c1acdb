//! 驱动层模块
//!
//! 本模块提供靶轮控制器的设备驱动功能，包括：
//! - 线路事务串行化（心跳与控制循环共享同一会话）
//! - 设备状态缓存（ArcSwap 无锁读取，只在显式轮询后更新）
//! - 后台心跳轮询（正常/快速两档节奏，可暂停）
//! - 连接新鲜度监控
//!
//! # 使用场景
//!
//! 适用于需要直接读写寄存器的场景。
//! 大多数用户应该使用 `wheel-client` 提供的更高级接口。

mod driver;
mod error;
pub mod heartbeat;
pub mod monitor;
pub mod state;

pub use driver::Driver;
pub use error::DriverError;
pub use heartbeat::{Heartbeat, HeartbeatConfig, HeartbeatPause};
pub use monitor::ConnectionMonitor;
pub use state::{DeviceState, mod_position};
