//! 终端交互工具

use anyhow::{Context, Result, bail};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use wheel_sdk::Reading;

/// 安装 Ctrl+C 处理器，返回运行标志（收到信号后变为 `false`）
pub fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
        eprintln!("\n收到退出信号，正在停止...");
    })
    .context("安装 Ctrl+C 处理器失败")?;
    Ok(running)
}

/// 寄存器读数的显示文本
pub fn format_reading(reading: Reading) -> String {
    match reading {
        Reading::Value(v) if v.fract() == 0.0 => format!("{}", v as i64),
        Reading::Value(v) => format!("{v:.3}"),
        Reading::NotANumber => "NaN".to_string(),
        Reading::Unknown => "-".to_string(),
    }
}

/// 可选值的显示文本
pub fn show<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// 解析逗号分隔的靶位序号（如 `0,3,5`）
pub fn parse_indices(text: &str) -> Result<Vec<usize>> {
    let indices = text
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().with_context(|| format!("无效的靶位序号: {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    if indices.is_empty() {
        bail!("至少需要一个靶位序号");
    }
    Ok(indices)
}
