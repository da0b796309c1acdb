//! # Wheel Tools - 应用共享的数据文档
//!
//! **依赖原则**: 只依赖 `wheel-protocol`，避免依赖 `wheel-client`
//!
//! ## 包含模块
//!
//! - `settings` - 连接与控制参数（TOML，用户配置目录）
//! - `targets` - 靶位表（JSON，`[{"index", "name", "position"}]`）

pub mod settings;
pub mod targets;

pub use settings::{ConnectionSettings, ControlSettings, Settings};
pub use targets::{DEFAULT_TARGET_COUNT, Target, TargetTable};
