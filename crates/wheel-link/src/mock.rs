//! 模拟控制器
//!
//! 在内存中模拟靶轮控制器的寄存器与运动，用于无硬件测试。
//! 可注入的故障：
//! - 接下来 N 次往返失败（连接被重置）
//! - 拒绝新连接
//! - 指定寄存器返回无法解析的应答
//! - 所有写命令返回 NACK
//! - 电机卡死（`FL` 不改变位置）
//! - 不应答（读超时）

use crate::{Connector, Link, LinkError};
use bytes::Bytes;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use wheel_protocol::{Action, Register, STEPS_PER_REVOLUTION, decode, encode, is_number_literal};

/// 模拟硬件状态
#[derive(Debug, Clone)]
struct SimState {
    values: [f64; Register::COUNT],
    jogging: bool,
    sweeping: bool,
    stuck: bool,
    silent: bool,
    nack_writes: bool,
    garbage: Vec<Register>,
    fail_exchanges: usize,
    refuse_connections: bool,
    connects: usize,
    latency: Duration,
    log: Vec<String>,
}

impl Default for SimState {
    fn default() -> Self {
        let mut values = [0.0; Register::COUNT];
        values[Register::Velocity.index()] = 10.0;
        values[Register::Acceleration.index()] = 100.0;
        values[Register::Deceleration.index()] = 100.0;
        values[Register::MaxAcceleration.index()] = 1000.0;
        values[Register::JogSpeed.index()] = 1.0;
        values[Register::JogAcceleration.index()] = 10.0;
        values[Register::LockUpdateInterval.index()] = 100.0;
        values[Register::Temperature.index()] = 31.5;
        values[Register::CommandMode.index()] = 21.0;
        Self {
            values,
            jogging: false,
            sweeping: false,
            stuck: false,
            silent: false,
            nack_writes: false,
            garbage: Vec::new(),
            fail_exchanges: 0,
            refuse_connections: false,
            connects: 0,
            latency: Duration::ZERO,
            log: Vec::new(),
        }
    }
}

impl SimState {
    fn position(&self) -> f64 {
        self.values[Register::Position.index()]
    }

    fn set(&mut self, register: Register, value: f64) {
        self.values[register.index()] = value;
    }

    /// 处理一条命令，返回应答文本（`None` 表示不应答）
    fn handle(&mut self, command: &str) -> Option<String> {
        if self.silent {
            return None;
        }

        if let Some(action) = Action::ALL.into_iter().find(|a| a.token() == command) {
            self.apply_action(action);
            return Some("%".to_string());
        }

        if let Some(register) = Register::from_query(command) {
            if self.garbage.contains(&register) {
                return Some(format!("{command}=??"));
            }
            let value = self.values[register.index()];
            return Some(format!("{command}={}", register.format_value(value)));
        }

        for register in Register::ALL {
            let Some(prefix) = register.write_prefix() else {
                continue;
            };
            let Some(literal) = command.strip_prefix(prefix) else {
                continue;
            };
            if !is_number_literal(literal) {
                continue;
            }
            if self.nack_writes {
                return Some("?1".to_string());
            }
            let Ok(value) = literal.parse::<f64>() else {
                return Some("?2".to_string());
            };
            self.set(register, value);
            return Some("%".to_string());
        }

        Some("?0".to_string())
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            Action::StartJog => self.jogging = true,
            Action::StopJog => self.jogging = false,
            Action::SeekHome => {
                self.jogging = false;
                let n = STEPS_PER_REVOLUTION as f64;
                let home = (self.position() / n).round() * n;
                self.set(Register::Position, home);
            },
            Action::Reset => {
                self.jogging = false;
                self.sweeping = false;
            },
            Action::StartSweep => self.sweeping = true,
            Action::StopSweep => self.sweeping = false,
            Action::ExecuteMove => {
                if !self.stuck {
                    let distance = self.values[Register::MoveDistance.index()];
                    self.set(Register::Position, self.position() + distance);
                }
            },
            // 固件锁定只应答，不模拟
            Action::StartLock | Action::StopLock => {},
        }
    }
}

/// 模拟控制器句柄（可克隆，所有克隆共享同一状态）
#[derive(Debug, Clone, Default)]
pub struct MockController {
    state: Arc<Mutex<SimState>>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    /// 连接到此控制器的连接工厂
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            controller: self.clone(),
        }
    }

    pub fn position(&self) -> i64 {
        self.state.lock().position().round() as i64
    }

    pub fn set_position(&self, position: i64) {
        self.state.lock().set(Register::Position, position as f64);
    }

    pub fn value(&self, register: Register) -> f64 {
        self.state.lock().values[register.index()]
    }

    pub fn set_value(&self, register: Register, value: f64) {
        self.state.lock().set(register, value);
    }

    pub fn is_jogging(&self) -> bool {
        self.state.lock().jogging
    }

    pub fn is_sweeping(&self) -> bool {
        self.state.lock().sweeping
    }

    /// 电机卡死：`FL` 不再改变位置
    pub fn set_stuck(&self, stuck: bool) {
        self.state.lock().stuck = stuck;
    }

    /// 不应答任何命令
    pub fn set_silent(&self, silent: bool) {
        self.state.lock().silent = silent;
    }

    /// 所有写命令返回 NACK
    pub fn set_nack_writes(&self, nack: bool) {
        self.state.lock().nack_writes = nack;
    }

    /// 指定寄存器的查询返回无法解析的应答
    pub fn set_garbage(&self, register: Register, garbage: bool) {
        let mut state = self.state.lock();
        state.garbage.retain(|r| *r != register);
        if garbage {
            state.garbage.push(register);
        }
    }

    /// 接下来 `n` 次往返以连接重置失败
    pub fn fail_next_exchanges(&self, n: usize) {
        self.state.lock().fail_exchanges = n;
    }

    /// 拒绝新连接
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().refuse_connections = refuse;
    }

    /// 每次应答前的模拟延迟
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().latency = latency;
    }

    /// 成功建立的连接数
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects
    }

    /// 收到的全部命令（按顺序）
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().log.clone()
    }

    /// 与 `token` 完全相等的命令条数
    pub fn count(&self, token: &str) -> usize {
        self.state.lock().log.iter().filter(|c| *c == token).count()
    }

    /// 以 `prefix` 开头的命令条数
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn clear_log(&self) {
        self.state.lock().log.clear();
    }
}

/// 模拟连接工厂
#[derive(Debug, Clone)]
pub struct MockConnector {
    controller: MockController,
}

impl Connector for MockConnector {
    fn connect(&self) -> Result<Box<dyn Link>, LinkError> {
        let mut state = self.controller.state.lock();
        if state.refuse_connections {
            return Err(LinkError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock controller refused connection",
            )));
        }
        state.connects += 1;
        Ok(Box::new(MockLink {
            controller: self.controller.clone(),
            pending: None,
        }))
    }

    fn peer(&self) -> String {
        "mock".to_string()
    }
}

/// 模拟连接
pub struct MockLink {
    controller: MockController,
    pending: Option<Result<String, ()>>,
}

impl Link for MockLink {
    fn send_frame(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        let command = decode(frame);
        trace!("mock <- {}", command);
        let mut state = self.controller.state.lock();
        state.log.push(command.clone());

        if state.fail_exchanges > 0 {
            state.fail_exchanges -= 1;
            self.pending = Some(Err(()));
            return Ok(());
        }
        self.pending = state.handle(&command).map(Ok);
        Ok(())
    }

    fn receive_frame(&mut self) -> Result<Bytes, LinkError> {
        let latency = self.controller.state.lock().latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        match self.pending.take() {
            Some(Ok(reply)) => Ok(encode(&reply)),
            Some(Err(())) => Err(LinkError::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "mock connection reset",
            ))),
            None => Err(LinkError::Timeout),
        }
    }
}
