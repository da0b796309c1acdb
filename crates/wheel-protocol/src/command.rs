//! 命令构建
//!
//! 类型化的命令在构造时就满足白名单，因此可以直接发送；
//! 原始字符串必须通过 [`Command::raw`] 显式校验。

use crate::register::Register;
use crate::validate::validate;
use crate::{DIRECTION_HINT_STEPS, ProtocolError};
use std::fmt;

/// 裸动作命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Action {
    /// 开始点动（`CJ`）
    StartJog,
    /// 停止点动（`SJ`）
    StopJog,
    /// 寻零（`SHX0H`）
    SeekHome,
    /// 复位控制器（`RE`）
    Reset,
    /// 启动扫描程序（`QX1`）
    StartSweep,
    /// 停止扫描程序（`SK`）
    StopSweep,
    /// 执行相对移动（`FL`，距离由 `DI` 寄存器给出）
    ExecuteMove,
    /// 进入锁定模式（`QX2`）
    StartLock,
    /// 退出锁定模式（`SKD`）
    StopLock,
}

impl Action {
    /// 全部动作
    pub const ALL: [Action; 9] = [
        Action::StartJog,
        Action::StopJog,
        Action::SeekHome,
        Action::Reset,
        Action::StartSweep,
        Action::StopSweep,
        Action::ExecuteMove,
        Action::StartLock,
        Action::StopLock,
    ];

    /// 线路令牌
    pub fn token(self) -> &'static str {
        match self {
            Action::StartJog => "CJ",
            Action::StopJog => "SJ",
            Action::SeekHome => "SHX0H",
            Action::Reset => "RE",
            Action::StartSweep => "QX1",
            Action::StopSweep => "SK",
            Action::ExecuteMove => "FL",
            Action::StartLock => "QX2",
            Action::StopLock => "SKD",
        }
    }
}

/// 已校验的命令文本
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// 动作命令
    pub fn action(action: Action) -> Self {
        Command(action.token().to_string())
    }

    /// 读查询命令
    pub fn query(register: Register) -> Self {
        Command(register.query().to_string())
    }

    /// 写命令（本地校验值并按寄存器精度格式化）
    pub fn write(register: Register, value: f64) -> Result<Self, ProtocolError> {
        let quantized = register.check(value)?;
        let prefix = register
            .write_prefix()
            .ok_or(ProtocolError::ReadOnly(register))?;
        Ok(Command(format!(
            "{prefix}{}",
            register.format_value(quantized)
        )))
    }

    /// 相对移动距离（`DI<steps>`）
    pub fn move_distance(steps: i64) -> Result<Self, ProtocolError> {
        Self::write(Register::MoveDistance, steps as f64)
    }

    /// 方向提示：正方向写 `DI100`，负方向写 `DI-100`
    ///
    /// 点动和寻零的旋转方向由移动距离寄存器的符号决定。
    pub fn direction_hint(forward: bool) -> Self {
        let steps = if forward {
            DIRECTION_HINT_STEPS
        } else {
            -DIRECTION_HINT_STEPS
        };
        Command(format!("DI{steps}"))
    }

    /// 原始命令（诊断用），发送前必须通过白名单
    pub fn raw(text: impl Into<String>) -> Result<Self, ProtocolError> {
        let text = text.into();
        validate(&text)?;
        Ok(Command(text))
    }

    /// 命令文本
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        Command::action(action)
    }
}
