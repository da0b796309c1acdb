//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置（命令行 `--host`/`--port` 优先）
//! 2. 连接控制器
//! 3. 执行操作
//! 4. 断开连接

use anyhow::{Context, Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;
use wheel_client::{PidConfig, WheelBuilder, WheelClient};
use wheel_sdk::{Register, STEPS_PER_REVOLUTION};
use wheel_tools::{Settings, TargetTable};

use crate::commands::TargetArgs;
use crate::utils::{format_reading, show};

/// One-shot 模式
pub struct OneShotMode {
    settings: Settings,
}

impl OneShotMode {
    /// 加载配置并应用命令行覆盖
    pub fn new(host: Option<String>, port: Option<u16>) -> Result<Self> {
        let mut settings = Settings::load()?;
        if let Some(host) = host {
            settings.connection.host = host;
        }
        if let Some(port) = port {
            settings.connection.port = port;
        }
        Ok(Self::from_settings(settings))
    }

    pub fn from_settings(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// 由控制设置生成 PID 参数
    pub fn pid_config(&self) -> PidConfig {
        let control = &self.settings.control;
        PidConfig {
            max_step_speed: control.max_step_speed,
            ..PidConfig::default()
        }
        .with_gains(control.kp, control.ki, control.kd)
        .with_tick(Duration::from_millis(control.tick_ms))
    }

    /// 连接控制器
    pub fn connect(&self) -> Result<WheelClient> {
        let connection = &self.settings.connection;
        println!("⏳ 连接到 {}:{}...", connection.host, connection.port);
        let wheel = WheelBuilder::new()
            .host(connection.host.clone())
            .port(connection.port)
            .pid(self.pid_config())
            .connect()
            .with_context(|| format!("无法连接到 {}:{}", connection.host, connection.port))?;
        info!("Connected to {}:{}", connection.host, connection.port);
        println!("✅ 已连接");
        Ok(wheel)
    }

    /// 加载靶位表
    pub fn targets(&self) -> Result<TargetTable> {
        TargetTable::load_from_file(self.settings.target_file()?)
    }

    /// 解析目标圈内位置，返回 (位置, 显示名称)
    pub fn resolve_target(&self, target: &TargetArgs) -> Result<(i64, String)> {
        if let Some(position) = target.mod_position {
            if !(0..STEPS_PER_REVOLUTION).contains(&position) {
                bail!("圈内位置 {position} 超出范围 [0, {STEPS_PER_REVOLUTION})");
            }
            return Ok((position, position.to_string()));
        }
        let Some(key) = target.target.as_deref() else {
            bail!("需要 --mod 或 --target");
        };
        let table = self.targets()?;
        let found = table
            .find(key)
            .with_context(|| format!("未找到靶位: {key}"))?;
        Ok((found.position, format!("{} ({})", found.name, found.position)))
    }

    /// 读取并显示全部寄存器
    pub fn status(&self) -> Result<()> {
        print_status(&self.connect()?)
    }

    /// 查询当前位置
    pub fn position(&self) -> Result<()> {
        let wheel = self.connect()?;
        let position = wheel.refresh_position()?;
        println!("📍 位置: {position}");
        println!("   圈内: {}", show(wheel.mod_position()));
        println!("   圈数: {}", show(wheel.revolutions().map(|r| format!("{r:.4}"))));
        Ok(())
    }

    /// 寻零并等待静止
    pub fn home(&self) -> Result<()> {
        let wheel = self.connect()?;
        println!("⏳ 寻零...");
        wheel.seek_home()?;
        let position = wheel.wait_until_settled()?;
        println!("✅ 已静止于 {position}");
        Ok(())
    }

    /// 复位控制器并寻零
    pub fn reset(&self) -> Result<()> {
        let wheel = self.connect()?;
        println!("⏳ 复位...");
        wheel.reset()?;
        let position = wheel.wait_until_settled()?;
        println!("✅ 复位完成，位置 {position}");
        Ok(())
    }

    /// 将当前编码器位置设为 0
    pub fn zero(&self) -> Result<()> {
        let wheel = self.connect()?;
        wheel.set_encoder_position(0)?;
        println!("✅ 编码器位置已置零");
        Ok(())
    }

    /// 监控遥测数据
    pub fn monitor(&self, interval_ms: u64) -> Result<()> {
        let running = crate::utils::install_interrupt_flag()?;
        let wheel = self.connect()?;
        println!("📊 监控中 (每 {interval_ms} ms)...");
        println!("按 Ctrl+C 停止\n");

        hold_until_interrupted(&running, Duration::from_millis(interval_ms), || {
            wheel.refresh_position()?;
            wheel.refresh_telemetry()?;
            print_telemetry(&wheel);
            Ok(())
        })
    }
}

/// 周期执行 `tick` 直到收到 Ctrl+C 或出错
pub fn hold_until_interrupted(
    running: &AtomicBool,
    interval: Duration,
    mut tick: impl FnMut() -> Result<()>,
) -> Result<()> {
    while running.load(Ordering::SeqCst) {
        tick()?;
        thread::sleep(interval);
    }
    Ok(())
}

/// 读取全部寄存器并逐行打印
pub fn print_status(wheel: &WheelClient) -> Result<()> {
    let state = wheel.refresh_all()?;

    println!("📊 控制器状态:");
    for (register, reading) in state.iter() {
        println!("  {:<22} {}", register.name(), format_reading(reading));
    }
    println!("  {:<22} {}", "mod_position", show(state.mod_position()));
    println!("  {:<22} {}", "revolutions", show(state.revolutions().map(|r| format!("{r:.4}"))));
    println!("  {:<22} {}", "mode", wheel.mode());
    Ok(())
}

/// 打印一行遥测
pub fn print_telemetry(wheel: &WheelClient) {
    let state = wheel.state();
    println!(
        "pos {:>8} | mod {:>5} | temp {:>6} | enc {:>8} | mot {:>8} | torque {:>7}",
        show(state.position()),
        show(state.mod_position()),
        format_reading(state.reading(Register::Temperature)),
        format_reading(state.reading(Register::EncoderVelocity)),
        format_reading(state.reading(Register::MotorVelocity)),
        format_reading(state.reading(Register::TorqueReference)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_with_targets(dir: &std::path::Path) -> OneShotMode {
        let mut settings = Settings::default();
        let path = dir.join("targets.json");
        settings.set("target_file", &path.display().to_string()).unwrap();

        let mut table = TargetTable::defaults();
        table.set(4, Some("Gold".to_string()), Some(2100)).unwrap();
        table.save_to_file(&path).unwrap();
        OneShotMode::from_settings(settings)
    }

    #[test]
    fn test_pid_config_follows_settings() {
        let mut settings = Settings::default();
        settings.set("kp", "0.8").unwrap();
        settings.set("tick_ms", "250").unwrap();
        settings.set("max_step_speed", "512").unwrap();

        let pid = OneShotMode::from_settings(settings).pid_config();
        assert_eq!(pid.kp, 0.8);
        assert_eq!(pid.kd, 0.1);
        assert_eq!(pid.max_step_speed, 512);
        assert_eq!(pid.tick, Duration::from_millis(250));
        assert!(pid.validate().is_ok());
    }

    #[test]
    fn test_resolve_target() {
        let dir = tempfile::tempdir().unwrap();
        let mode = mode_with_targets(dir.path());

        let by_mod = TargetArgs { mod_position: Some(100), target: None };
        assert_eq!(mode.resolve_target(&by_mod).unwrap().0, 100);

        let by_name = TargetArgs { mod_position: None, target: Some("gold".to_string()) };
        assert_eq!(mode.resolve_target(&by_name).unwrap().0, 2100);

        let by_index = TargetArgs { mod_position: None, target: Some("1".to_string()) };
        assert_eq!(mode.resolve_target(&by_index).unwrap().0, 512);

        let out_of_range = TargetArgs { mod_position: Some(8192), target: None };
        assert!(mode.resolve_target(&out_of_range).is_err());

        let unknown = TargetArgs { mod_position: None, target: Some("lead".to_string()) };
        assert!(mode.resolve_target(&unknown).is_err());
    }

    #[test]
    fn test_hold_stops_on_flag_and_error() {
        let running = AtomicBool::new(true);
        let mut ticks = 0;
        hold_until_interrupted(&running, Duration::ZERO, || {
            ticks += 1;
            if ticks == 3 {
                running.store(false, Ordering::SeqCst);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(ticks, 3);

        let running = AtomicBool::new(true);
        assert!(hold_until_interrupted(&running, Duration::ZERO, || bail!("lost")).is_err());
    }
}
