//! # Wheel Client
//!
//! 靶轮控制器的用户友好接口：
//! - [`WheelClient`]：连接、状态快照、点动/扫描、锁定、闭环移动
//! - [`state`]：单一活动模式状态机
//! - [`control`]：圆周位置空间中的 PID 闭环
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use wheel_client::WheelBuilder;
//!
//! # fn main() -> wheel_client::Result<()> {
//! let wheel = WheelBuilder::new().host("192.168.203.68").connect()?;
//!
//! // 移动到第 4 个靶位（每转 16 个靶位）
//! let handle = wheel.move_to_mod_position(4 * 512, 1, 30)?;
//! let report = handle.wait()?;
//! println!("{} steps from target", report.final_error);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod client;
pub mod control;
pub mod error;
pub mod state;

pub use builder::{DEFAULT_HOST, WheelBuilder};
pub use client::{Direction, WheelClient, home_direction};
pub use control::{
    IterationBudget, MotionHandle, MotionReport, PidConfig, SettleConfig, unwrap_target,
    wrap_delta,
};
pub use error::{ClientError, Result};
pub use state::{Mode, ModeManager};
