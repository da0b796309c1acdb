//! Driver API 模块
//!
//! 提供对外的 [`Driver`] 结构体：串行化所有线路事务，并维护设备状态缓存。

use crate::error::DriverError;
use crate::monitor::ConnectionMonitor;
use crate::state::DeviceState;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use wheel_link::{Connector, Session};
use wheel_protocol::{
    Action, Command, DIRECTION_HINT_STEPS, ProtocolError, Reading, Register, ReplyKind,
    parse_reading,
};

/// 超过此时间没有成功往返即认为链路陈旧
const STALE_AFTER: Duration = Duration::from_secs(10);

/// 控制器驱动
///
/// - 所有线路事务经由同一把 `Mutex<Session>` 串行化（心跳与控制循环共用）
/// - 状态快照通过 `ArcSwap` 发布，读取无锁
/// - 事务失败导致会话断开时链路丢失计数加一
pub struct Driver {
    session: Mutex<Session>,
    state: ArcSwap<DeviceState>,
    monitor: ConnectionMonitor,
    link_losses: AtomicU64,
}

impl Driver {
    /// 使用连接工厂创建（未连接）
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::from_session(Session::new(connector))
    }

    /// 使用已有会话创建
    pub fn from_session(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            state: ArcSwap::from_pointee(DeviceState::default()),
            monitor: ConnectionMonitor::new(STALE_AFTER),
            link_losses: AtomicU64::new(0),
        }
    }

    // ==================== 连接 ====================

    /// 建立连接
    pub fn connect(&self) -> Result<(), DriverError> {
        let mut session = self.session.lock();
        session
            .connect()
            .map_err(|e| DriverError::connection("connect", e))?;
        info!("Driver connected to {}", session.peer());
        Ok(())
    }

    /// 断开连接（幂等）
    pub fn disconnect(&self) {
        self.session.lock().disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.session.lock().is_connected()
    }

    pub fn peer(&self) -> String {
        self.session.lock().peer()
    }

    /// 最近一次成功收到的原始应答
    pub fn last_reply(&self) -> Option<String> {
        self.session.lock().last_reply().map(str::to_string)
    }

    /// 自动重连次数
    pub fn reconnect_count(&self) -> u64 {
        self.session.lock().reconnect_count()
    }

    pub fn monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// 事务失败后会话被标记为断开的次数（不含主动断开）
    pub fn link_losses(&self) -> u64 {
        self.link_losses.load(Ordering::Acquire)
    }

    // ==================== 状态读取（无锁） ====================

    /// 当前状态快照
    pub fn state(&self) -> DeviceState {
        **self.state.load()
    }

    /// 当前状态快照（共享指针）
    pub fn state_arc(&self) -> Arc<DeviceState> {
        self.state.load_full()
    }

    // ==================== 轮询 ====================

    /// 读取单个寄存器并更新缓存
    pub fn query(&self, register: Register) -> Result<Reading, DriverError> {
        let mut session = self.session.lock();
        let (reading, _) = self.query_locked(&mut session, register)?;
        self.publish(|s| s.set(register, reading));
        Ok(reading)
    }

    /// 刷新全部寄存器
    ///
    /// 单个字段无法解析时记为 `NotANumber` 并继续；传输失败则整体中止，
    /// 不发布部分结果。
    pub fn refresh_all(&self) -> Result<DeviceState, DriverError> {
        let mut session = self.session.lock();
        let mut readings = Vec::with_capacity(Register::COUNT);
        for register in Register::ALL {
            let (reading, _) = self.query_locked(&mut session, register)?;
            readings.push((register, reading));
        }
        drop(session);

        let state = self.publish(|s| {
            for (register, reading) in &readings {
                s.set(*register, *reading);
            }
        });
        debug!("Refreshed {} registers", readings.len());
        Ok(state)
    }

    /// 刷新位置（心跳使用的廉价查询）
    ///
    /// 位置读数不是数字时返回 [`DriverError::Fault`]。
    pub fn refresh_position(&self) -> Result<i64, DriverError> {
        let mut session = self.session.lock();
        let (reading, reply) = self.query_locked(&mut session, Register::Position)?;
        drop(session);

        self.publish(|s| s.set(Register::Position, reading));
        reading.as_i64().ok_or_else(|| DriverError::Fault {
            command: Register::Position.query().to_string(),
            reply,
        })
    }

    /// 刷新遥测（温度、编码器速度、力矩参考）
    ///
    /// 单项失败不影响其他项，返回第一个错误。
    pub fn refresh_telemetry(&self) -> Result<(), DriverError> {
        let mut first_err = None;
        for register in [
            Register::Temperature,
            Register::EncoderVelocity,
            Register::TorqueReference,
        ] {
            if let Err(e) = self.query(register) {
                trace!("Telemetry {} failed: {}", register, e);
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    // ==================== 写入 ====================

    /// 写寄存器
    ///
    /// 本地校验、发送写命令、乐观更新缓存（不回读）。
    /// 控制器返回 NACK 时报告协议错误且不更新缓存。返回实际写入的量化值。
    pub fn write(&self, register: Register, value: f64) -> Result<f64, DriverError> {
        let command = Command::write(register, value)?;
        let quantized = register.check(value)?;

        let mut session = self.session.lock();
        let reply = self.transact(&mut session, &command)?;
        drop(session);

        check_ack(&command, &reply)?;
        self.publish(|s| s.set(register, Reading::Value(quantized)));
        debug!("{} <- {}", register, quantized);
        Ok(quantized)
    }

    /// 发送动作命令
    pub fn send_action(&self, action: Action) -> Result<String, DriverError> {
        let command = Command::action(action);
        let mut session = self.session.lock();
        let reply = self.transact(&mut session, &command)?;
        drop(session);
        check_ack(&command, &reply)?;
        Ok(reply)
    }

    /// 设置方向提示后发送动作（点动、寻零的方向由 `DI` 符号决定）
    pub fn send_directed(&self, action: Action, forward: bool) -> Result<String, DriverError> {
        let hint = Command::direction_hint(forward);
        let command = Command::action(action);

        let mut session = self.session.lock();
        let reply = self.transact(&mut session, &hint)?;
        check_ack(&hint, &reply)?;
        let reply = self.transact(&mut session, &command)?;
        drop(session);

        check_ack(&command, &reply)?;
        let distance = if forward {
            DIRECTION_HINT_STEPS
        } else {
            -DIRECTION_HINT_STEPS
        };
        self.publish(|s| s.set(Register::MoveDistance, Reading::Value(distance as f64)));
        Ok(reply)
    }

    /// 相对移动：`DI<steps>` 后紧跟 `FL`，两条命令之间不会插入其他事务
    pub fn move_relative(&self, steps: i64) -> Result<(), DriverError> {
        let distance = Command::move_distance(steps)?;
        let execute = Command::action(Action::ExecuteMove);

        let mut session = self.session.lock();
        let reply = self.transact(&mut session, &distance)?;
        check_ack(&distance, &reply)?;
        let reply = self.transact(&mut session, &execute)?;
        drop(session);

        check_ack(&execute, &reply)?;
        self.publish(|s| s.set(Register::MoveDistance, Reading::Value(steps as f64)));
        debug!("Relative move {} steps", steps);
        Ok(())
    }

    /// 发送原始命令（诊断用），必须通过白名单
    pub fn send_raw(&self, text: &str) -> Result<String, DriverError> {
        let command = Command::raw(text)?;
        let mut session = self.session.lock();
        self.transact(&mut session, &command)
    }

    // ==================== 内部 ====================

    fn transact(&self, session: &mut Session, command: &Command) -> Result<String, DriverError> {
        let reply = session.send_and_receive(command).map_err(|e| {
            if !session.is_connected() {
                let losses = self.link_losses.fetch_add(1, Ordering::AcqRel) + 1;
                warn!("Link lost during {} (#{})", command.as_str(), losses);
            }
            DriverError::connection(command.as_str(), e)
        })?;
        self.monitor.register_reply();
        Ok(reply)
    }

    fn query_locked(
        &self,
        session: &mut Session,
        register: Register,
    ) -> Result<(Reading, String), DriverError> {
        let reply = self.transact(session, &Command::query(register))?;
        let reading = parse_reading(&reply);
        if !reading.is_value() {
            debug!("{} reply not a number: {:?}", register, reply);
        }
        Ok((reading, reply))
    }

    fn publish(&self, update: impl Fn(&mut DeviceState)) -> DeviceState {
        let mut published = DeviceState::default();
        self.state.rcu(|current| {
            let mut next = **current;
            update(&mut next);
            published = next;
            next
        });
        published
    }
}

/// NACK 应答转换为协议错误
fn check_ack(command: &Command, reply: &str) -> Result<(), DriverError> {
    match ReplyKind::classify(reply) {
        ReplyKind::Nack { code } => Err(ProtocolError::Nack {
            command: command.to_string(),
            code: code.to_string(),
        }
        .into()),
        _ => Ok(()),
    }
}
