//! Wheel SDK - 靶轮运动控制器 Rust SDK
//!
//! 通过自定义帧 ASCII 协议（TCP）驱动步进电机/编码器控制器，
//! 并在圆周位置空间中实现闭环定位。
//!
//! # 架构设计
//!
//! 从底层到高层：
//!
//! - **协议层** (`protocol`): 帧封装、命令白名单、寄存器表、应答解析
//! - **传输层** (`link`): TCP 连接与一次重连重试
//! - **驱动层** (`driver`): 串行化线路事务、状态缓存、心跳
//! - **客户端层** (`client`): 运动模式状态机、PID 闭环、对外接口
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use wheel_sdk::prelude::*;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! wheel_sdk::init_logger();
//!
//! let wheel = WheelBuilder::new().host("192.168.203.68").connect()?;
//! wheel.refresh_all()?;
//! let report = wheel.move_to_mod_position(1024, 1, 20)?.wait()?;
//! println!("arrived at {}", report.final_position);
//! # Ok(())
//! # }
//! ```

pub use wheel_client as client;
pub use wheel_driver as driver;
pub use wheel_link as link;
pub use wheel_protocol as protocol;

pub mod logging;
pub mod prelude;

// --- 用户以此为界 ---

pub use logging::{init_logger, init_logger_with};

// 客户端层（推荐入口）
pub use wheel_client::{
    ClientError, Direction, MotionHandle, MotionReport, PidConfig, SettleConfig, WheelBuilder,
    WheelClient,
};
pub use wheel_client::state::Mode;

// 驱动层
pub use wheel_driver::{DeviceState, Driver, DriverError};

// 传输层与协议层错误
pub use wheel_link::LinkError;
pub use wheel_protocol::{ProtocolError, Reading, Register, STEPS_PER_REVOLUTION};
