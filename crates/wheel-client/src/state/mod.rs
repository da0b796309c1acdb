//! 运动模式状态机

pub mod machine;
pub mod mode;

pub use machine::ModeManager;
pub use mode::{AtomicMode, Mode};
