//! Position Control Engine - 闭环运动工作线程
//!
//! 每次迭代：
//! 1. 检查取消标志与迭代预算
//! 2. 读取绝对位置（读不到则以设备故障中止，会话保持）
//! 3. PID 计算；需要移动时发送 `DI<steps>` + `FL`；未到位的迭代都顺带刷新遥测
//! 4. 休眠一个控制周期（可被取消打断）
//!
//! 所有结束路径（成功、取消、预算耗尽、故障、连接错误、panic）
//! 都经过同一个清理：模式回到 Idle，心跳恢复，然后通知等待方。

use super::motion::{MotionReport, MotionResult, MotionShared};
use super::pid::{IterationBudget, PidSession, Step};
use crate::error::ClientError;
use crate::state::ModeManager;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use wheel_driver::{Driver, HeartbeatPause};

/// 启动工作线程
///
/// 调用方必须已经进入 `shared.mode()`；启动失败时由调用方负责退出模式。
pub(crate) fn spawn(
    driver: Arc<Driver>,
    modes: Arc<ModeManager>,
    pause: HeartbeatPause,
    shared: Arc<MotionShared>,
    session: PidSession,
    tick: Duration,
) -> Result<JoinHandle<()>, ClientError> {
    let name = format!("wheel-{}", shared.mode());
    thread::Builder::new()
        .name(name)
        .spawn(move || {
            let mut cleanup = Cleanup {
                modes,
                shared: shared.clone(),
                pause: Some(pause),
                result: None,
            };
            cleanup.result = Some(run(&driver, &shared, session, tick));
        })
        .map_err(|e| ClientError::Fault {
            command: "spawn motion worker".to_string(),
            detail: e.to_string(),
        })
}

/// 闭环循环本体
pub(crate) fn run(
    driver: &Driver,
    shared: &MotionShared,
    mut session: PidSession,
    tick: Duration,
) -> MotionResult {
    info!(
        "{} run started: target {} ({:?})",
        shared.mode(),
        session.target(),
        session.budget()
    );

    loop {
        if shared.is_cancelled() {
            return Err(ClientError::Cancelled {
                iterations: session.iteration(),
            });
        }
        if !session.has_budget() {
            let budget = match session.budget() {
                IterationBudget::Bounded(n) => n,
                IterationBudget::Unbounded => u64::MAX,
            };
            return Err(ClientError::BudgetExceeded {
                budget,
                last_error: session.last_error().unwrap_or_default(),
            });
        }

        session.set_target(shared.target());
        let current = driver.refresh_position()?;
        let it = session.step(current);
        shared.record_iteration(session.iteration());
        debug!(
            "iteration {}: position {} error {} output {}",
            session.iteration(),
            current,
            it.error,
            it.output
        );

        match it.step {
            Step::Arrived => {
                return Ok(MotionReport {
                    iterations: session.iteration(),
                    final_position: current,
                    final_error: it.error,
                });
            },
            Step::Move(steps) => driver.move_relative(steps)?,
            Step::Hold => {},
        }
        // 心跳暂停期间由控制循环顺带刷新遥测
        if let Err(e) = driver.refresh_telemetry() {
            trace!("Telemetry refresh skipped: {}", e);
        }

        if session.has_budget() {
            shared.sleep(tick);
        }
    }
}

/// 唯一的清理路径
///
/// 在 `Drop` 中执行，panic 展开时同样生效。
struct Cleanup {
    modes: Arc<ModeManager>,
    shared: Arc<MotionShared>,
    pause: Option<HeartbeatPause>,
    result: Option<MotionResult>,
}

impl Drop for Cleanup {
    fn drop(&mut self) {
        let mode = self.shared.mode();
        self.modes.leave(mode);
        // 释放暂停守卫，心跳恢复
        self.pause.take();

        let result = self.result.take().unwrap_or_else(|| {
            Err(ClientError::Fault {
                command: format!("{mode} worker"),
                detail: "worker panicked".to_string(),
            })
        });
        match &result {
            Ok(report) => info!(
                "{} finished after {} iterations at {}",
                mode, report.iterations, report.final_position
            ),
            Err(ClientError::Cancelled { iterations }) => {
                info!("{} cancelled after {} iterations", mode, iterations)
            },
            Err(e) => warn!("{} ended: {}", mode, e),
        }
        self.shared.finish(result);
    }
}
