//! 闭环位置控制
//!
//! 固件只有相对移动（`DI<steps>` + `FL`），本模块在圆周位置空间中合成取模定位：
//!
//! - [`circular`]：最短弧展开
//! - [`pid`]：离散 PID 会话与终止判定
//! - `engine`：工作线程循环（私有）
//! - [`motion`]：运动句柄（等待、取消、原地更新目标）
//! - [`settle`]：固件运动后的静止检测

pub mod circular;
pub(crate) mod engine;
pub mod motion;
pub mod pid;
pub mod settle;

pub use circular::{check_mod_target, unwrap_target, wrap_delta};
pub use motion::{MotionHandle, MotionReport};
pub use pid::{Iteration, IterationBudget, PidConfig, PidSession, Step};
pub use settle::SettleConfig;
