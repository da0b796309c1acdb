//! # 程序设置
//!
//! 连接参数与闭环控制参数，保存为 TOML：
//! - Linux: `~/.config/wheel/config.toml`
//! - macOS: `~/Library/Application Support/wheel/config.toml`
//! - Windows: `%APPDATA%\wheel\config.toml`

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wheel_protocol::DEFAULT_PORT;

/// 配置文件名
pub const CONFIG_FILE: &str = "config.toml";

/// 默认靶位表文件名
pub const TARGET_FILE: &str = "targets.json";

/// 全部设置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub control: ControlSettings,
}

/// 连接设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// 控制器地址
    pub host: String,
    /// TCP 端口
    pub port: u16,
    /// 靶位表文件（未设置时使用配置目录下的 `targets.json`）
    pub target_file: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "192.168.203.68".to_string(),
            port: DEFAULT_PORT,
            target_file: None,
        }
    }
}

/// 闭环控制设置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// 到位容差（步）
    pub tolerance: i64,
    /// 单次移动的迭代上限（`-1` 不限）
    pub max_iterations: i64,
    /// 控制周期（毫秒）
    pub tick_ms: u64,
    /// 单次迭代最大移动步数
    pub max_step_speed: i64,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            kp: 0.5,
            ki: 0.0,
            kd: 0.1,
            tolerance: 1,
            max_iterations: 20,
            tick_ms: 1000,
            max_step_speed: 2048,
        }
    }
}

impl Settings {
    /// 可通过 [`get`](Self::get)/[`set`](Self::set) 访问的键
    pub const KEYS: [&'static str; 10] = [
        "host",
        "port",
        "target_file",
        "kp",
        "ki",
        "kd",
        "tolerance",
        "max_iterations",
        "tick_ms",
        "max_step_speed",
    ];

    /// 配置目录（`<config_dir>/wheel`）
    pub fn config_dir() -> Result<PathBuf> {
        let mut path = dirs::config_dir().ok_or_else(|| anyhow!("无法确定配置目录"))?;
        path.push("wheel");
        Ok(path)
    }

    /// 默认配置文件路径
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// 从默认路径加载
    pub fn load() -> Result<Self> {
        Self::load_from_file(Self::default_path()?)
    }

    /// 保存到默认路径
    pub fn save(&self) -> Result<()> {
        self.save_to_file(Self::default_path()?)
    }

    /// 从文件加载，文件不存在时返回默认设置
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    /// 保存到文件（自动创建父目录）
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }
        let content = toml::to_string_pretty(self).context("序列化配置失败")?;
        fs::write(path, content).with_context(|| format!("写入配置文件失败: {}", path.display()))
    }

    /// 靶位表文件路径
    pub fn target_file(&self) -> Result<PathBuf> {
        match &self.connection.target_file {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join(TARGET_FILE)),
        }
    }

    /// 按键读取（文本形式）
    pub fn get(&self, key: &str) -> Option<String> {
        let c = &self.connection;
        let p = &self.control;
        Some(match key {
            "host" => c.host.clone(),
            "port" => c.port.to_string(),
            "target_file" => c
                .target_file
                .as_ref()
                .map_or_else(String::new, |path| path.display().to_string()),
            "kp" => p.kp.to_string(),
            "ki" => p.ki.to_string(),
            "kd" => p.kd.to_string(),
            "tolerance" => p.tolerance.to_string(),
            "max_iterations" => p.max_iterations.to_string(),
            "tick_ms" => p.tick_ms.to_string(),
            "max_step_speed" => p.max_step_speed.to_string(),
            _ => return None,
        })
    }

    /// 按键写入（文本形式），校验取值
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let c = &mut self.connection;
        let p = &mut self.control;
        match key {
            "host" => {
                if value.trim().is_empty() {
                    bail!("host 不能为空");
                }
                c.host = value.trim().to_string();
            },
            "port" => c.port = parse(key, value)?,
            "target_file" => {
                c.target_file = (!value.is_empty()).then(|| PathBuf::from(value));
            },
            "kp" => p.kp = parse_gain(key, value)?,
            "ki" => p.ki = parse_gain(key, value)?,
            "kd" => p.kd = parse_gain(key, value)?,
            "tolerance" => {
                let tolerance: i64 = parse(key, value)?;
                if tolerance < 0 {
                    bail!("tolerance 不能为负");
                }
                p.tolerance = tolerance;
            },
            "max_iterations" => {
                let n: i64 = parse(key, value)?;
                if n != -1 && n <= 0 {
                    bail!("max_iterations 必须为正数或 -1");
                }
                p.max_iterations = n;
            },
            "tick_ms" => {
                let tick: u64 = parse(key, value)?;
                if tick == 0 {
                    bail!("tick_ms 必须为正数");
                }
                p.tick_ms = tick;
            },
            "max_step_speed" => {
                let speed: i64 = parse(key, value)?;
                if speed <= 0 {
                    bail!("max_step_speed 必须为正数");
                }
                p.max_step_speed = speed;
            },
            _ => bail!("未知配置项: {key}（可用: {}）", Self::KEYS.join(", ")),
        }
        Ok(())
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("{key} 的值无效: {value:?}"))
}

fn parse_gain(key: &str, value: &str) -> Result<f64> {
    let gain: f64 = parse(key, value)?;
    if !gain.is_finite() {
        bail!("{key} 必须是有限数");
    }
    Ok(gain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.connection.host, "192.168.203.68");
        assert_eq!(settings.connection.port, 7776);
        assert_eq!(settings.control.kp, 0.5);
        assert_eq!(settings.control.tolerance, 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut settings = Settings::default();
        settings.set("host", "10.0.0.5").unwrap();
        settings.set("kd", "0.25").unwrap();
        settings.set("target_file", "/tmp/targets.json").unwrap();
        settings.save_to_file(&path).unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.get("kd").as_deref(), Some("0.25"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[control]\nkp = 0.8\n").unwrap();

        let loaded = Settings::load_from_file(&path).unwrap();
        assert_eq!(loaded.control.kp, 0.8);
        assert_eq!(loaded.control.kd, 0.1);
        assert_eq!(loaded.connection, ConnectionSettings::default());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[control\nkp = ").unwrap();
        assert!(Settings::load_from_file(&path).is_err());
    }

    #[test]
    fn test_set_validates() {
        let mut settings = Settings::default();
        assert!(settings.set("port", "70000").is_err());
        assert!(settings.set("tolerance", "-1").is_err());
        assert!(settings.set("max_iterations", "0").is_err());
        assert!(settings.set("kp", "NaN").is_err());
        assert!(settings.set("color", "red").is_err());
        settings.set("max_iterations", "-1").unwrap();
        assert_eq!(settings.control.max_iterations, -1);
        settings.set("target_file", "").unwrap();
        assert_eq!(settings.connection.target_file, None);
    }

    #[test]
    fn test_every_key_is_readable() {
        let settings = Settings::default();
        for key in Settings::KEYS {
            assert!(settings.get(key).is_some(), "{key}");
        }
        assert!(settings.get("nope").is_none());
    }
}
