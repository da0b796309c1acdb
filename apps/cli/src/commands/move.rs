//! 闭环运动命令
//!
//! `move` 单次移动到位后结束；`lock` 持续保持目标直到 Ctrl+C。

use anyhow::Result;
use clap::Args;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::modes::oneshot::{OneShotMode, hold_until_interrupted};
use crate::utils::{install_interrupt_flag, show};

/// 目标选择（圈内位置或靶位，二选一）
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct TargetArgs {
    /// 圈内位置（步，0..8192）
    #[arg(long = "mod", value_name = "STEPS")]
    pub mod_position: Option<i64>,

    /// 靶位名称或序号
    #[arg(long, value_name = "NAME|INDEX")]
    pub target: Option<String>,
}

/// 移动命令参数
#[derive(Args, Debug)]
pub struct MoveCommand {
    #[command(flatten)]
    pub target: TargetArgs,

    /// 到位容差（步，覆盖配置）
    #[arg(long)]
    pub tolerance: Option<i64>,

    /// 迭代上限（`-1` 不限，覆盖配置）
    #[arg(long, allow_negative_numbers = true)]
    pub max_iterations: Option<i64>,
}

impl MoveCommand {
    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let control = &mode.settings().control;
        let tolerance = self.tolerance.unwrap_or(control.tolerance);
        let max_iterations = self.max_iterations.unwrap_or(control.max_iterations);

        let (target, label) = mode.resolve_target(&self.target)?;
        let running = install_interrupt_flag()?;
        let wheel = mode.connect()?;

        println!("⏳ 移动到 {label}（容差 {tolerance}）...");
        let handle = wheel.move_to_mod_position(target, tolerance, max_iterations)?;
        while !handle.is_finished() {
            if !running.load(Ordering::SeqCst) {
                handle.cancel();
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        let report = handle.wait()?;
        println!(
            "✅ 已到位: 位置 {}（圈内 {}），误差 {}，迭代 {} 次",
            report.final_position,
            show(wheel.mod_position()),
            report.final_error,
            report.iterations
        );
        Ok(())
    }
}

/// 锁定命令参数
#[derive(Args, Debug)]
pub struct LockCommand {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl LockCommand {
    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let (target, label) = mode.resolve_target(&self.target)?;
        let running = install_interrupt_flag()?;
        let wheel = mode.connect()?;

        let handle = wheel.start_lock(target)?;
        println!("🔒 锁定到 {label}，按 Ctrl+C 结束");

        let held = hold_until_interrupted(&running, Duration::from_secs(1), || {
            if handle.is_finished() {
                anyhow::bail!("锁定已意外结束");
            }
            println!(
                "pos {:>8} | mod {:>5} | iterations {}",
                show(wheel.position()),
                show(wheel.mod_position()),
                handle.iterations()
            );
            Ok(())
        });

        let stopped = wheel.stop_lock();
        let outcome = handle.wait();
        held?;
        stopped?;
        if let Err(e) = outcome
            && !matches!(e, wheel_sdk::ClientError::Cancelled { .. })
        {
            return Err(e.into());
        }
        println!("✅ 已解除锁定");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: MoveCommand,
    }

    #[test]
    fn test_unbounded_iterations_parse() {
        let h = Harness::try_parse_from(["t", "--target", "Gold", "--max-iterations", "-1"]).unwrap();
        assert_eq!(h.args.max_iterations, Some(-1));
        assert_eq!(h.args.target.target.as_deref(), Some("Gold"));
        assert_eq!(h.args.tolerance, None);
    }
}
