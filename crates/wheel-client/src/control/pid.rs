//! PID Session - 圆周位置空间中的离散 PID
//!
//! # 算法
//!
//! ```text
//! error      = target - current               （步）
//! integral   = sum(最近 10 次 error)
//! derivative = error - previous_error         （第一次为 0）
//! output     = round(clamp(Kp·e + Ki·integral + Kd·derivative, ±max_step_speed))
//! ```
//!
//! 每次迭代输出一个相对移动步数；`|error| ≤ tolerance` 时不发送移动。
//!
//! # 终止
//!
//! - 有界运行：第一次迭代即在容差内（"已到位"），或连续 `stable_threshold` 次在容差内
//! - 无界运行（锁定）：从不因稳定而终止，只能被取消或出错

use crate::error::ClientError;
use std::collections::VecDeque;
use std::time::Duration;

/// PID 参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidConfig {
    /// 比例增益 (Kp)
    pub kp: f64,
    /// 积分增益 (Ki)
    pub ki: f64,
    /// 微分增益 (Kd)
    pub kd: f64,
    /// 单次迭代最大移动步数
    pub max_step_speed: i64,
    /// 误差历史长度（积分窗口）
    pub history_len: usize,
    /// 判定到位所需的连续稳定次数
    pub stable_threshold: u32,
    /// 锁定模式的容差（步）
    pub lock_tolerance: i64,
    /// 控制周期
    pub tick: Duration,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.0,
            kd: 0.1,
            max_step_speed: 2048,
            history_len: 10,
            stable_threshold: 2,
            lock_tolerance: 1,
            tick: Duration::from_secs(1),
        }
    }
}

impl PidConfig {
    /// 设置 PID 增益
    pub fn with_gains(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
        self
    }

    /// 设置控制周期
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// 校验参数
    pub fn validate(&self) -> Result<(), ClientError> {
        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            if !gain.is_finite() {
                return Err(ClientError::invalid_parameter(name, "gain must be finite"));
            }
        }
        if self.max_step_speed <= 0 {
            return Err(ClientError::invalid_parameter(
                "max_step_speed",
                "must be positive",
            ));
        }
        if self.history_len == 0 {
            return Err(ClientError::invalid_parameter("history_len", "must be positive"));
        }
        if self.stable_threshold == 0 {
            return Err(ClientError::invalid_parameter(
                "stable_threshold",
                "must be positive",
            ));
        }
        if self.lock_tolerance < 0 {
            return Err(ClientError::invalid_parameter(
                "lock_tolerance",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// 迭代预算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationBudget {
    /// 至多 n 次迭代
    Bounded(u64),
    /// 无界（锁定）
    Unbounded,
}

impl IterationBudget {
    /// 从原始整数构造：`-1` 表示无界，正数表示上限
    pub fn from_raw(raw: i64) -> Result<Self, ClientError> {
        match raw {
            -1 => Ok(Self::Unbounded),
            n if n > 0 => Ok(Self::Bounded(n as u64)),
            n => Err(ClientError::invalid_parameter(
                "max_iterations",
                format!("{n} (use -1 for unbounded or a positive limit)"),
            )),
        }
    }

    pub fn is_bounded(self) -> bool {
        matches!(self, Self::Bounded(_))
    }

    /// 第 `iteration` 次（从 0 计）迭代是否仍在预算内
    pub fn allows(self, iteration: u64) -> bool {
        match self {
            Self::Bounded(n) => iteration < n,
            Self::Unbounded => true,
        }
    }
}

/// 单次迭代的决策
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// 已到位，有界运行结束
    Arrived,
    /// 本次不移动
    Hold,
    /// 相对移动若干步
    Move(i64),
}

/// 一次迭代的计算结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Iteration {
    pub error: i64,
    pub output: i64,
    pub step: Step,
}

/// PID 会话
///
/// 每次移动或锁定请求创建一个，成功、取消、出错或预算耗尽时销毁。
#[derive(Debug, Clone)]
pub struct PidSession {
    target: i64,
    tolerance: i64,
    budget: IterationBudget,
    config: PidConfig,
    iteration: u64,
    history: VecDeque<i64>,
    stable_count: u32,
    previous_error: Option<i64>,
    last_error: Option<i64>,
}

impl PidSession {
    pub fn new(target: i64, tolerance: i64, budget: IterationBudget, config: PidConfig) -> Self {
        Self {
            target,
            tolerance,
            budget,
            config,
            iteration: 0,
            history: VecDeque::with_capacity(config.history_len),
            stable_count: 0,
            previous_error: None,
            last_error: None,
        }
    }

    /// 绝对目标位置
    pub fn target(&self) -> i64 {
        self.target
    }

    /// 原地更新目标（锁定模式重新选靶）
    pub fn set_target(&mut self, target: i64) {
        if target != self.target {
            self.target = target;
            self.stable_count = 0;
        }
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn budget(&self) -> IterationBudget {
        self.budget
    }

    /// 是否还能执行下一次迭代
    pub fn has_budget(&self) -> bool {
        self.budget.allows(self.iteration)
    }

    pub fn stable_count(&self) -> u32 {
        self.stable_count
    }

    /// 最近一次误差
    pub fn last_error(&self) -> Option<i64> {
        self.last_error
    }

    /// 积分项（误差历史之和）
    pub fn integral(&self) -> i64 {
        self.history.iter().sum()
    }

    /// 执行一次迭代的计算
    pub fn step(&mut self, current: i64) -> Iteration {
        let error = self.target - current;

        if self.history.len() == self.config.history_len {
            self.history.pop_front();
        }
        self.history.push_back(error);

        let integral = self.integral() as f64;
        let derivative = (error - self.previous_error.unwrap_or(error)) as f64;
        let raw = self.config.kp * error as f64
            + self.config.ki * integral
            + self.config.kd * derivative;
        let limit = self.config.max_step_speed as f64;
        let output = raw.clamp(-limit, limit).round() as i64;

        let first = self.iteration == 0;
        self.previous_error = Some(error);
        self.last_error = Some(error);
        self.iteration += 1;

        let step = if error.abs() <= self.tolerance {
            self.stable_count += 1;
            let done = first || self.stable_count >= self.config.stable_threshold;
            if self.budget.is_bounded() && done {
                Step::Arrived
            } else {
                Step::Hold
            }
        } else {
            self.stable_count = 0;
            if output != 0 { Step::Move(output) } else { Step::Hold }
        };

        Iteration {
            error,
            output,
            step,
        }
    }
}
