//! 日志初始化
//!
//! 安装 `tracing-subscriber` fmt 输出，过滤规则取自 `RUST_LOG`，
//! 并通过 `tracing-log` 把 `log` 记录桥接到 `tracing`。

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// 默认过滤规则
pub const DEFAULT_FILTER: &str = "info";

/// 使用默认过滤规则（`info`）初始化日志
///
/// 重复调用是安全的；返回本次调用是否安装了全局订阅者。
pub fn init_logger() -> bool {
    init_logger_with(DEFAULT_FILTER)
}

/// 初始化日志，`RUST_LOG` 未设置时使用 `default_filter`
pub fn init_logger_with(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true));

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return false;
    }
    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {}", e);
    }
    true
}
