//! 配置管理命令
//!
//! 读写 `<config_dir>/wheel/config.toml`

use anyhow::{Result, bail};
use clap::Subcommand;
use wheel_tools::{Settings, TargetTable};

use crate::modes::oneshot::OneShotMode;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项
    Set {
        /// 配置项名称（如 host, port, kp）
        key: String,

        /// 新值
        #[arg(allow_negative_numbers = true)]
        value: String,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Set { key, value } => {
                let mut settings = Settings::load()?;
                apply(&mut settings, &key, &value)?;
                settings.save()?;
                println!("✅ {key} = {value}");
                Ok(())
            },

            ConfigCommand::Get { key } => {
                let settings = Settings::load()?;
                for line in describe(&settings, &key)? {
                    println!("{line}");
                }
                Ok(())
            },

            ConfigCommand::Check => {
                let path = Settings::default_path()?;
                println!("配置文件: {}", path.display());
                let settings = Settings::load()?;
                for line in check(&settings)? {
                    println!("  {line}");
                }
                Ok(())
            },
        }
    }
}

/// 写入配置项，并保证结果仍是可用的控制参数
fn apply(settings: &mut Settings, key: &str, value: &str) -> Result<()> {
    let mut candidate = settings.clone();
    candidate.set(key, value)?;
    OneShotMode::from_settings(candidate.clone()).pid_config().validate()?;
    *settings = candidate;
    Ok(())
}

fn describe(settings: &Settings, key: &str) -> Result<Vec<String>> {
    if key == "all" {
        return Ok(Settings::KEYS
            .iter()
            .map(|k| format!("{k} = {}", settings.get(k).unwrap_or_default()))
            .collect());
    }
    match settings.get(key) {
        Some(value) if value.is_empty() => Ok(vec!["(未设置)".to_string()]),
        Some(value) => Ok(vec![value]),
        None => bail!("未知配置项: {key}（可用: {}）", Settings::KEYS.join(", ")),
    }
}

fn check(settings: &Settings) -> Result<Vec<String>> {
    let mut lines = vec![format!(
        "控制器: {}:{}",
        settings.connection.host, settings.connection.port
    )];

    let pid = OneShotMode::from_settings(settings.clone()).pid_config();
    match pid.validate() {
        Ok(()) => lines.push(format!(
            "PID: kp={} ki={} kd={} 周期={:?}",
            pid.kp, pid.ki, pid.kd, pid.tick
        )),
        Err(e) => lines.push(format!("❌ PID 参数无效: {e}")),
    }

    let target_file = settings.target_file()?;
    match TargetTable::load_from_file(&target_file) {
        Ok(table) => lines.push(format!(
            "靶位表: {}（{} 个靶位{}）",
            target_file.display(),
            table.len(),
            if target_file.exists() { "" } else { "，使用默认值" }
        )),
        Err(e) => lines.push(format!("❌ 靶位表无效: {e:#}")),
    }
    Ok(lines)
}
