//! 寄存器写入与原始命令

use anyhow::{Result, anyhow};
use clap::Args;
use wheel_sdk::Register;

use crate::modes::oneshot::OneShotMode;

/// 写寄存器命令参数
#[derive(Args, Debug)]
pub struct SetCommand {
    /// 寄存器名称或查询令牌（如 jog_speed 或 JS）
    pub param: String,

    /// 新值
    #[arg(allow_negative_numbers = true)]
    pub value: f64,
}

impl SetCommand {
    pub fn register(&self) -> Result<Register> {
        self.param.parse::<Register>().map_err(|e| anyhow!(e))
    }

    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let register = self.register()?;
        let wheel = mode.connect()?;
        let accepted = wheel.set(register, self.value)?;
        println!("✅ {} = {}", register, register.format_value(accepted));
        Ok(())
    }
}

/// 原始命令参数
#[derive(Args, Debug)]
pub struct SendCommand {
    /// 命令文本（如 RUe1、VE2.5）
    #[arg(allow_hyphen_values = true)]
    pub raw: String,
}

impl SendCommand {
    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let wheel = mode.connect()?;
        let reply = wheel.send_raw(self.raw.trim())?;
        println!("{reply}");
        Ok(())
    }
}
