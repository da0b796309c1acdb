//! WheelClient - 核心对外接口
//!
//! 协作方（CLI、GUI）只通过本结构体访问控制器：
//! - 连接管理
//! - 状态快照与类型化 getter/setter
//! - 点动、扫描、锁定、单次闭环移动
//! - 寻零、复位、编码器置位
//!
//! 所有运动入口都先经过 [`ModeManager`]，保证任一时刻至多一个运动模式。

use crate::builder::WheelBuilder;
use crate::control::engine;
use crate::control::motion::MotionShared;
use crate::control::settle;
use crate::control::{
    IterationBudget, MotionHandle, PidConfig, PidSession, SettleConfig, check_mod_target,
    unwrap_target,
};
use crate::error::{ClientError, Result};
use crate::state::{Mode, ModeManager};
use parking_lot::Mutex;
use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};
use wheel_driver::{DeviceState, Driver, DriverError, Heartbeat, HeartbeatConfig, mod_position};
use wheel_link::Connector;
use wheel_protocol::{Action, Reading, Register, STEPS_PER_REVOLUTION};

/// `RE` 之后、寻零之前的等待
const RESET_DELAY: Duration = Duration::from_millis(100);

/// 旋转方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// 正方向（`DI100`）
    #[default]
    Forward,
    /// 反方向（`DI-100`）
    Reverse,
}

impl Direction {
    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }
}

/// 寻零方向
///
/// `-sin(2π·m/N) ≥ 0` 时正向，否则反向。
pub fn home_direction(mod_position: i64) -> Direction {
    let angle = TAU * mod_position as f64 / STEPS_PER_REVOLUTION as f64;
    if -angle.sin() >= 0.0 {
        Direction::Forward
    } else {
        Direction::Reverse
    }
}

/// 正在运行（或已结束但尚未回收）的闭环运动
struct ActiveMotion {
    shared: Arc<MotionShared>,
    thread: Option<JoinHandle<()>>,
}

impl ActiveMotion {
    /// 取消并等待工作线程退出
    fn stop(mut self) {
        self.shared.request_cancel();
        self.shared.wait_finished();
        self.join();
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("{} worker panicked", self.shared.mode());
        }
    }
}

/// 靶轮控制器客户端
///
/// # 示例
///
/// ```rust,no_run
/// use wheel_client::WheelClient;
///
/// # fn main() -> wheel_client::Result<()> {
/// let wheel = WheelClient::connect("192.168.203.68", 7776)?;
/// wheel.refresh_all()?;
/// println!("position = {:?}", wheel.position());
///
/// let report = wheel.move_to_mod_position(2048, 1, 20)?.wait()?;
/// println!("arrived after {} iterations", report.iterations);
/// # Ok(())
/// # }
/// ```
pub struct WheelClient {
    driver: Arc<Driver>,
    modes: Arc<ModeManager>,
    heartbeat: Heartbeat,
    pid: PidConfig,
    settle: SettleConfig,
    active: Mutex<Option<ActiveMotion>>,
    /// 进入点动/扫描时驱动的链路丢失计数
    firmware_epoch: AtomicU64,
}

impl WheelClient {
    /// 使用默认参数连接
    pub fn connect(host: impl Into<String>, port: u16) -> Result<Self> {
        WheelBuilder::new().host(host).port(port).connect()
    }

    /// 创建 Builder
    pub fn builder() -> WheelBuilder {
        WheelBuilder::new()
    }

    pub(crate) fn open(
        connector: impl Connector + 'static,
        pid: PidConfig,
        heartbeat: HeartbeatConfig,
        settle: SettleConfig,
    ) -> Result<Self> {
        let driver = Arc::new(Driver::new(connector));
        driver.connect()?;
        let heartbeat = Heartbeat::start(driver.clone(), heartbeat);
        info!("WheelClient ready ({})", driver.peer());

        Ok(Self {
            driver,
            modes: Arc::new(ModeManager::new()),
            heartbeat,
            pid,
            settle,
            active: Mutex::new(None),
            firmware_epoch: AtomicU64::new(0),
        })
    }

    // ==================== 连接 ====================

    pub fn is_connected(&self) -> bool {
        self.driver.is_connected()
    }

    /// 断开后重新连接
    pub fn reconnect(&self) -> Result<()> {
        self.sync_link_state();
        self.driver.connect()?;
        Ok(())
    }

    /// 断开连接
    ///
    /// 取消闭环运动、尽力发送停止命令，模式回到 Idle。
    pub fn disconnect(&self) {
        self.cancel_active_motion();
        if self.driver.is_connected() {
            match self.modes.current() {
                Mode::Jogging => self.best_effort(Action::StopJog),
                Mode::Sweeping => self.best_effort(Action::StopSweep),
                _ => {},
            }
        }
        self.modes.force_idle();
        self.heartbeat.set_fast(false);
        self.driver.disconnect();
        info!("WheelClient disconnected");
    }

    /// 链路是否在最近一段时间内有过成功往返
    pub fn is_link_fresh(&self) -> bool {
        self.driver.monitor().is_fresh()
    }

    /// 心跳是否处于快速轮询
    pub fn is_fast_polling(&self) -> bool {
        self.heartbeat.is_fast()
    }

    /// 底层驱动（诊断用）
    pub fn driver(&self) -> &Arc<Driver> {
        &self.driver
    }

    // ==================== 状态 ====================

    /// 刷新全部寄存器
    pub fn refresh_all(&self) -> Result<DeviceState> {
        self.link(self.driver.refresh_all())
    }

    /// 刷新位置
    pub fn refresh_position(&self) -> Result<i64> {
        self.link(self.driver.refresh_position())
    }

    /// 刷新遥测
    pub fn refresh_telemetry(&self) -> Result<()> {
        self.link(self.driver.refresh_telemetry())
    }

    /// 读取单个寄存器
    pub fn query(&self, register: Register) -> Result<Reading> {
        self.link(self.driver.query(register))
    }

    /// 状态快照（无锁，不触发 IO）
    pub fn state(&self) -> DeviceState {
        self.driver.state()
    }

    pub fn position(&self) -> Option<i64> {
        self.state().position()
    }

    pub fn mod_position(&self) -> Option<i64> {
        self.state().mod_position()
    }

    pub fn revolutions(&self) -> Option<f64> {
        self.state().revolutions()
    }

    pub fn temperature(&self) -> Option<f64> {
        self.state().temperature()
    }

    /// 当前运动模式
    ///
    /// 点动或扫描期间链路丢失过时，本地视为已停止并返回 Idle。
    pub fn mode(&self) -> Mode {
        self.sync_link_state();
        self.modes.current()
    }

    // ==================== 写入 ====================

    /// 写任意可写寄存器，返回实际写入的量化值
    ///
    /// - 编码器位置只能在 Idle 时设置
    /// - 闭环运动期间不能改写移动距离
    pub fn set(&self, register: Register, value: f64) -> Result<f64> {
        let active = self.mode();
        match register {
            Register::Position if !active.is_idle() => {
                return Err(ClientError::invalid_parameter(
                    register.name(),
                    format!("encoder can only be set while idle ({active} is active)"),
                ));
            },
            Register::MoveDistance if active.is_closed_loop() => {
                return Err(ClientError::busy(format!("write {}", register.name()), active));
            },
            _ => {},
        }
        self.link(self.driver.write(register, value))
    }

    pub fn set_velocity(&self, rev_per_sec: f64) -> Result<f64> {
        self.set(Register::Velocity, rev_per_sec)
    }

    pub fn set_acceleration(&self, rev_per_sec2: f64) -> Result<f64> {
        self.set(Register::Acceleration, rev_per_sec2)
    }

    pub fn set_deceleration(&self, rev_per_sec2: f64) -> Result<f64> {
        self.set(Register::Deceleration, rev_per_sec2)
    }

    pub fn set_max_acceleration(&self, rev_per_sec2: f64) -> Result<f64> {
        self.set(Register::MaxAcceleration, rev_per_sec2)
    }

    pub fn set_move_distance(&self, steps: i64) -> Result<i64> {
        self.set(Register::MoveDistance, steps as f64).map(|v| v as i64)
    }

    pub fn set_jog_speed(&self, rev_per_sec: f64) -> Result<f64> {
        self.set(Register::JogSpeed, rev_per_sec)
    }

    pub fn set_jog_acceleration(&self, rev_per_sec2: f64) -> Result<f64> {
        self.set(Register::JogAcceleration, rev_per_sec2)
    }

    /// 扫描掩码（每一位对应一个靶位）
    pub fn set_sweep_mask(&self, mask: u16) -> Result<u16> {
        self.set(Register::SweepMask, f64::from(mask)).map(|v| v as u16)
    }

    pub fn set_sweep_width(&self, steps: i64) -> Result<i64> {
        self.set(Register::SweepWidth, steps as f64).map(|v| v as i64)
    }

    pub fn set_sweep_offset(&self, steps: i64) -> Result<i64> {
        self.set(Register::SweepOffset, steps as f64).map(|v| v as i64)
    }

    pub fn set_sweep_speed(&self, rev_per_sec: f64) -> Result<f64> {
        self.set(Register::SweepSpeed, rev_per_sec)
    }

    pub fn set_sweep_cutoff(&self, cutoff: f64) -> Result<f64> {
        self.set(Register::SweepCutoff, cutoff)
    }

    pub fn set_lock_demand_position(&self, steps: i64) -> Result<i64> {
        self.set(Register::LockDemandPosition, steps as f64).map(|v| v as i64)
    }

    /// 锁定更新间隔（毫秒）
    pub fn set_lock_update_interval(&self, millis: u32) -> Result<u32> {
        self.set(Register::LockUpdateInterval, f64::from(millis)).map(|v| v as u32)
    }

    pub fn set_lock_slew_fast(&self, rev_per_sec: f64) -> Result<f64> {
        self.set(Register::LockSlewFast, rev_per_sec)
    }

    pub fn set_lock_slew_slow(&self, rev_per_sec: f64) -> Result<f64> {
        self.set(Register::LockSlewSlow, rev_per_sec)
    }

    /// 设置编码器位置（`EP`），仅 Idle 时允许
    pub fn set_encoder_position(&self, steps: i64) -> Result<()> {
        self.set(Register::Position, steps as f64)?;
        info!("Encoder position set to {}", steps);
        Ok(())
    }

    /// 发送原始命令（诊断用），必须通过白名单
    pub fn send_raw(&self, command: &str) -> Result<String> {
        self.link(self.driver.send_raw(command))
    }

    // ==================== 点动 / 扫描 ====================

    /// 正方向点动
    pub fn start_jog(&self) -> Result<()> {
        self.start_jog_in(Direction::Forward)
    }

    /// 指定方向点动
    pub fn start_jog_in(&self, direction: Direction) -> Result<()> {
        self.enter_firmware_mode(Mode::Jogging)?;
        if let Err(e) = self
            .driver
            .send_directed(Action::StartJog, direction.is_forward())
        {
            self.modes.leave(Mode::Jogging);
            return Err(e.into());
        }
        self.heartbeat.set_fast(true);
        Ok(())
    }

    /// 停止点动（总是发送 `SJ`）
    pub fn stop_jog(&self) -> Result<()> {
        self.stop_firmware_mode(Mode::Jogging, Action::StopJog)
    }

    /// 启动固件扫描程序
    pub fn start_sweep(&self) -> Result<()> {
        self.enter_firmware_mode(Mode::Sweeping)?;
        if let Err(e) = self.driver.send_action(Action::StartSweep) {
            self.modes.leave(Mode::Sweeping);
            return Err(e.into());
        }
        self.heartbeat.set_fast(true);
        Ok(())
    }

    /// 停止扫描（总是发送 `SK`）
    pub fn stop_sweep(&self) -> Result<()> {
        self.stop_firmware_mode(Mode::Sweeping, Action::StopSweep)
    }

    // ==================== 闭环 ====================

    /// 单次闭环移动到圈内位置
    ///
    /// `max_iterations` 为 `-1` 表示不限次数。
    pub fn move_to_mod_position(
        &self,
        target_mod: i64,
        tolerance: i64,
        max_iterations: i64,
    ) -> Result<MotionHandle> {
        let budget = IterationBudget::from_raw(max_iterations)?;
        self.start_closed_loop(Mode::MovingOnce, target_mod, tolerance, budget)
    }

    /// 锁定到圈内位置
    ///
    /// 已在锁定时原地更新目标，不重启会话。
    pub fn start_lock(&self, target_mod: i64) -> Result<MotionHandle> {
        if self.modes.current() == Mode::Locking {
            return self.update_lock_target(target_mod);
        }
        self.start_closed_loop(
            Mode::Locking,
            target_mod,
            self.pid.lock_tolerance,
            IterationBudget::Unbounded,
        )
    }

    /// 更新锁定目标
    pub fn update_lock_target(&self, target_mod: i64) -> Result<MotionHandle> {
        check_mod_target(target_mod)?;
        let shared = {
            let active = self.active.lock();
            match active.as_ref() {
                Some(motion)
                    if motion.shared.mode() == Mode::Locking && !motion.shared.is_finished() =>
                {
                    motion.shared.clone()
                },
                _ => {
                    return Err(ClientError::InvalidTransition {
                        from: self.modes.current(),
                        to: Mode::Locking,
                    });
                },
            }
        };

        let current = self.refresh_position()?;
        let absolute = unwrap_target(current, target_mod)?;
        shared.set_target(absolute);
        info!("Lock target -> {} (absolute {})", target_mod, absolute);
        Ok(MotionHandle::new(shared))
    }

    /// 停止锁定
    pub fn stop_lock(&self) -> Result<()> {
        let motion = {
            let mut active = self.active.lock();
            if active
                .as_ref()
                .is_some_and(|m| m.shared.mode() == Mode::Locking)
            {
                active.take()
            } else {
                None
            }
        };
        if let Some(motion) = motion {
            motion.stop();
        }
        self.modes.leave(Mode::Locking);
        Ok(())
    }

    /// 取消正在运行的闭环运动，阻塞到清理完成
    ///
    /// 返回被取消运动的模式。
    pub fn cancel_active_motion(&self) -> Option<Mode> {
        let motion = self.active.lock().take()?;
        let mode = motion.shared.mode();
        motion.stop();
        Some(mode)
    }

    // ==================== 寻零 / 复位 ====================

    /// 寻零（仅 Idle）
    ///
    /// 方向由当前圈内位置决定，走较近的一侧。不等待运动结束，
    /// 需要时调用 [`wait_until_settled`](Self::wait_until_settled)。
    pub fn seek_home(&self) -> Result<()> {
        self.sync_link_state();
        self.modes.require_idle("seek home")?;
        let current = self.refresh_position()?;
        let direction = home_direction(mod_position(current));
        self.link(
            self.driver
                .send_directed(Action::SeekHome, direction.is_forward()),
        )?;
        info!("Seeking home from {} ({:?})", current, direction);
        Ok(())
    }

    /// 轮询位置直到静止，返回最终位置
    pub fn wait_until_settled(&self) -> Result<i64> {
        settle::wait_until_settled(&self.driver, &self.settle)
    }

    /// 复位控制器并寻零
    ///
    /// 任何模式下都可调用：先停止活动模式并回到 Idle，再发送 `RE`。
    pub fn reset(&self) -> Result<()> {
        self.cancel_active_motion();
        match self.modes.current() {
            Mode::Jogging => self.best_effort(Action::StopJog),
            Mode::Sweeping => self.best_effort(Action::StopSweep),
            _ => {},
        }
        self.modes.force_idle();
        self.heartbeat.set_fast(false);

        self.link(self.driver.send_action(Action::Reset))?;
        info!("Controller reset");
        thread::sleep(RESET_DELAY);
        self.seek_home()
    }

    // ==================== 内部 ====================

    fn start_closed_loop(
        &self,
        mode: Mode,
        target_mod: i64,
        tolerance: i64,
        budget: IterationBudget,
    ) -> Result<MotionHandle> {
        check_mod_target(target_mod)?;
        if tolerance < 0 {
            return Err(ClientError::invalid_parameter(
                "tolerance",
                format!("{tolerance} must not be negative"),
            ));
        }

        self.sync_link_state();
        let mut active = self.active.lock();
        if let Some(mut finished) = active.take_if(|m| m.shared.is_finished()) {
            finished.join();
        }
        self.modes.try_enter(mode)?;
        let pause = self.heartbeat.pause();

        let absolute = match self
            .driver
            .refresh_position()
            .map_err(ClientError::from)
            .and_then(|current| unwrap_target(current, target_mod))
        {
            Ok(absolute) => absolute,
            Err(e) => {
                drop(pause);
                self.modes.leave(mode);
                return Err(e);
            },
        };

        let shared = MotionShared::new(mode, absolute);
        let session = PidSession::new(absolute, tolerance, budget, self.pid);
        let thread = match engine::spawn(
            self.driver.clone(),
            self.modes.clone(),
            pause,
            shared.clone(),
            session,
            self.pid.tick,
        ) {
            Ok(thread) => thread,
            Err(e) => {
                self.modes.leave(mode);
                return Err(e);
            },
        };

        *active = Some(ActiveMotion {
            shared: shared.clone(),
            thread: Some(thread),
        });
        Ok(MotionHandle::new(shared))
    }

    fn enter_firmware_mode(&self, mode: Mode) -> Result<()> {
        self.sync_link_state();
        self.reap_finished();
        self.firmware_epoch
            .store(self.driver.link_losses(), Ordering::Release);
        self.modes.try_enter(mode)
    }

    fn stop_firmware_mode(&self, mode: Mode, action: Action) -> Result<()> {
        let result = self.driver.send_action(action).map(drop);
        if self.modes.leave(mode) {
            self.heartbeat.set_fast(false);
        }
        self.link(result)
    }

    /// 点动/扫描期间链路丢失过（心跳或任一调用发现）：本地视为已停止
    fn sync_link_state(&self) {
        let mode = self.modes.current();
        if !mode.wants_fast_poll()
            || self.driver.link_losses() == self.firmware_epoch.load(Ordering::Acquire)
        {
            return;
        }
        if self.modes.leave(mode) {
            self.heartbeat.set_fast(false);
            warn!("Link lost while {}, treated as stopped", mode);
        }
    }

    /// 转换驱动结果，连接失败时先同步链路状态
    fn link<T>(&self, result: std::result::Result<T, DriverError>) -> Result<T> {
        result.map_err(|e| {
            if e.is_connection() {
                self.sync_link_state();
            }
            e.into()
        })
    }

    fn best_effort(&self, action: Action) {
        if let Err(e) = self.driver.send_action(action) {
            warn!("Best-effort {} failed: {}", action.token(), e);
        }
    }

    /// 回收已自行结束的闭环运动
    fn reap_finished(&self) {
        let finished = self.active.lock().take_if(|m| m.shared.is_finished());
        if let Some(mut motion) = finished {
            motion.join();
        }
    }
}

impl Drop for WheelClient {
    fn drop(&mut self) {
        self.cancel_active_motion();
    }
}
