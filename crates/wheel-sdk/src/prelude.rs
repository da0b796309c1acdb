//! Prelude - 常用类型的便捷导入
//!
//! ```rust
//! use wheel_sdk::prelude::*;
//! ```

pub use wheel_client::{
    Direction, IterationBudget, MotionHandle, MotionReport, PidConfig, SettleConfig, WheelBuilder,
    WheelClient,
};
pub use wheel_client::state::Mode;

pub use wheel_driver::{DeviceState, mod_position};
pub use wheel_protocol::{Reading, Register, STEPS_PER_REVOLUTION};

// 错误类型
pub use wheel_client::ClientError;
pub use wheel_driver::DriverError;
pub use wheel_link::LinkError;
pub use wheel_protocol::ProtocolError;
