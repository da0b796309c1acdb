//! 固件运动命令：点动与扫描
//!
//! 运动持续到 Ctrl+C，退出前总会发送停止命令。

use anyhow::Result;
use clap::Args;
use std::time::Duration;
use wheel_client::Direction;
use wheel_tools::TargetTable;

use crate::modes::oneshot::{OneShotMode, hold_until_interrupted, print_telemetry};
use crate::utils::{install_interrupt_flag, parse_indices};

const REPORT_INTERVAL: Duration = Duration::from_millis(500);

/// 点动命令参数
#[derive(Args, Debug)]
pub struct JogCommand {
    /// 反向旋转
    #[arg(long)]
    pub ccw: bool,

    /// 点动速度（转/秒）
    #[arg(long)]
    pub speed: Option<f64>,
}

impl JogCommand {
    pub fn direction(&self) -> Direction {
        if self.ccw { Direction::Reverse } else { Direction::Forward }
    }

    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let running = install_interrupt_flag()?;
        let wheel = mode.connect()?;

        if let Some(speed) = self.speed {
            let accepted = wheel.set_jog_speed(speed)?;
            println!("点动速度: {accepted} rps");
        }
        wheel.start_jog_in(self.direction())?;
        println!("🔄 点动中（{:?}），按 Ctrl+C 停止", self.direction());

        let held = hold_until_interrupted(&running, REPORT_INTERVAL, || {
            wheel.refresh_telemetry()?;
            print_telemetry(&wheel);
            Ok(())
        });
        let stopped = wheel.stop_jog();
        held?;
        stopped?;
        println!("✅ 已停止点动");
        Ok(())
    }
}

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct SweepCommand {
    /// 参与扫描的靶位序号（逗号分隔，写入扫描掩码）
    #[arg(long, value_name = "I,J,..")]
    pub targets: Option<String>,
}

impl SweepCommand {
    /// 目标列表对应的扫描掩码
    pub fn mask(&self) -> Result<Option<u16>> {
        self.targets
            .as_deref()
            .map(|text| TargetTable::sweep_mask(&parse_indices(text)?))
            .transpose()
    }

    pub fn execute(&self, mode: &OneShotMode) -> Result<()> {
        let mask = self.mask()?;
        let running = install_interrupt_flag()?;
        let wheel = mode.connect()?;

        if let Some(mask) = mask {
            wheel.set_sweep_mask(mask)?;
            println!("扫描掩码: {mask:#06x}");
        }
        wheel.start_sweep()?;
        println!("〰️ 扫描中，按 Ctrl+C 停止");

        let held = hold_until_interrupted(&running, REPORT_INTERVAL, || {
            wheel.refresh_telemetry()?;
            print_telemetry(&wheel);
            Ok(())
        });
        let stopped = wheel.stop_sweep();
        held?;
        stopped?;
        println!("✅ 已停止扫描");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jog_direction() {
        assert_eq!(JogCommand { ccw: false, speed: None }.direction(), Direction::Forward);
        assert_eq!(JogCommand { ccw: true, speed: None }.direction(), Direction::Reverse);
    }

    #[test]
    fn test_sweep_mask_from_targets() {
        let none = SweepCommand { targets: None };
        assert_eq!(none.mask().unwrap(), None);

        let some = SweepCommand { targets: Some("0,2,15".to_string()) };
        assert_eq!(some.mask().unwrap(), Some(0x8005));

        let bad = SweepCommand { targets: Some("16".to_string()) };
        assert!(bad.mask().is_err());
    }
}
