//! 命令定义和实现

pub mod config;
pub mod r#move;
pub mod register;
pub mod spin;
pub mod targets;

pub use config::ConfigCommand;
pub use r#move::{LockCommand, MoveCommand, TargetArgs};
pub use register::{SendCommand, SetCommand};
pub use spin::{JogCommand, SweepCommand};
pub use targets::TargetsCommand;
