//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道，保留历史记录。
//! 未识别的输入作为原始命令发送（经白名单校验），`mon` 切换遥测监控。

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;
use wheel_client::{Direction, MotionHandle, WheelClient};
use wheel_sdk::{ClientError, Register};

use crate::modes::oneshot::{OneShotMode, print_status, print_telemetry};

/// Ctrl+C 在通道中的标记
const INTERRUPT: &str = "SIGINT";

/// 默认监控间隔
const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_millis(500);

/// Shell 命令
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Help,
    Exit,
    Status,
    Position,
    /// 切换监控（可选间隔毫秒）
    Monitor(Option<u64>),
    Move { target: i64, tolerance: Option<i64>, max_iterations: Option<i64> },
    Target(String),
    Lock(i64),
    Unlock,
    Jog(Direction),
    Sweep,
    /// 停止一切运动
    Stop,
    Home,
    Reset,
    Zero,
    Set { register: Register, value: f64 },
    /// 原始命令
    Raw(String),
}

impl ReplCommand {
    /// 解析一行输入
    pub fn parse(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&head) = parts.first() else {
            bail!("空命令");
        };
        let args = &parts[1..];

        let command = match head.to_ascii_lowercase().as_str() {
            "help" | "?" => Self::Help,
            "exit" | "quit" => Self::Exit,
            "status" => Self::Status,
            "pos" | "position" => Self::Position,
            "mon" | "monitor" => Self::Monitor(args.first().map(|s| parse_arg(s, "间隔")).transpose()?),
            "move" => Self::Move {
                target: parse_arg(required(args, 0, "move <mod> [tolerance] [max_iterations]")?, "位置")?,
                tolerance: args.get(1).map(|s| parse_arg(s, "容差")).transpose()?,
                max_iterations: args.get(2).map(|s| parse_arg(s, "迭代上限")).transpose()?,
            },
            "target" => Self::Target(required(args, 0, "target <name|index>")?.to_string()),
            "lock" => Self::Lock(parse_arg(required(args, 0, "lock <mod>")?, "位置")?),
            "unlock" => Self::Unlock,
            "jog" => match args.first().copied() {
                None | Some("cw") => Self::Jog(Direction::Forward),
                Some("ccw") => Self::Jog(Direction::Reverse),
                Some(other) => bail!("未知方向: {other}（cw / ccw）"),
            },
            "sweep" => Self::Sweep,
            "stop" => Self::Stop,
            "home" => Self::Home,
            "reset" => Self::Reset,
            "zero" => Self::Zero,
            "set" => {
                let name = required(args, 0, "set <param> <value>")?;
                Self::Set {
                    register: name.parse::<Register>().map_err(|e| anyhow!(e))?,
                    value: parse_arg(required(args, 1, "set <param> <value>")?, "值")?,
                }
            },
            _ => Self::Raw(line.trim().to_string()),
        };
        Ok(command)
    }
}

fn required<'a>(args: &[&'a str], index: usize, usage: &str) -> Result<&'a str> {
    args.get(index).copied().ok_or_else(|| anyhow!("用法: {usage}"))
}

fn parse_arg<T: std::str::FromStr>(text: &str, what: &str) -> Result<T> {
    text.parse().map_err(|_| anyhow!("无效的{what}: {text:?}"))
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<Result<()>>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Self {
        let (command_tx, command_rx) = bounded::<String>(10);

        // 在专用线程内创建 Editor（生命周期 = REPL 会话）
        let input_thread = thread::spawn(move || {
            let mut rl = DefaultEditor::new().context("Failed to initialize readline")?;

            let history_path = dirs::data_dir().map(|d| d.join("wheel").join("history.txt"));
            if let Some(path) = &history_path {
                rl.load_history(path).ok();
            }

            loop {
                match rl.readline("wheel> ") {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        let _ = rl.add_history_entry(line.as_str());
                        let exit = matches!(line.as_str(), "exit" | "quit");
                        if command_tx.send(line).is_err() || exit {
                            break;
                        }
                    },

                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        println!("^C");
                        let _ = command_tx.send(INTERRUPT.to_string());
                    },

                    Err(rustyline::error::ReadlineError::Eof) => {
                        let _ = command_tx.send("exit".to_string());
                        break;
                    },

                    Err(err) => {
                        eprintln!("Error: {err:?}");
                        break;
                    },
                }
            }

            if let Some(path) = &history_path {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).ok();
                }
                rl.save_history(path).ok();
            }
            Ok(())
        });

        Self {
            command_rx,
            _input_thread: input_thread,
        }
    }
}

/// 后台遥测监控
struct Monitor {
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl Monitor {
    fn start(wheel: Arc<WheelClient>, interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("wheel-monitor".into())
            .spawn(move || {
                while let Err(RecvTimeoutError::Timeout) = stop_rx.recv_timeout(interval) {
                    match wheel.refresh_telemetry() {
                        Ok(()) => print_telemetry(&wheel),
                        Err(e) => warn!("Telemetry poll failed: {}", e),
                    }
                }
            })
            .context("启动监控线程失败")?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop_tx.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// REPL 会话（保持控制器连接）
pub struct ReplSession<'a> {
    mode: &'a OneShotMode,
    wheel: Arc<WheelClient>,
    monitor: Option<Monitor>,
}

impl<'a> ReplSession<'a> {
    pub fn new(mode: &'a OneShotMode, wheel: WheelClient) -> Self {
        Self {
            mode,
            wheel: Arc::new(wheel),
            monitor: None,
        }
    }

    pub fn wheel(&self) -> &WheelClient {
        &self.wheel
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    /// 执行一条命令；闭环移动期间从 `input` 读取取消请求
    pub fn execute(&mut self, command: ReplCommand, input: Option<&Receiver<String>>) -> Result<()> {
        let wheel = &self.wheel;
        match command {
            ReplCommand::Help => print_help(),
            ReplCommand::Exit => {},
            ReplCommand::Status => print_status(wheel)?,
            ReplCommand::Position => {
                let position = wheel.refresh_position()?;
                println!("📍 {position}（圈内 {}）", position.rem_euclid(wheel_sdk::STEPS_PER_REVOLUTION));
            },
            ReplCommand::Monitor(interval) => {
                if self.monitor.take().is_some() {
                    println!("监控已关闭");
                } else {
                    let interval = interval.map_or(DEFAULT_MONITOR_INTERVAL, Duration::from_millis);
                    self.monitor = Some(Monitor::start(self.wheel.clone(), interval)?);
                    println!("监控已开启（再次输入 mon 关闭）");
                }
            },
            ReplCommand::Move { target, tolerance, max_iterations } => {
                let control = &self.mode.settings().control;
                let handle = wheel.move_to_mod_position(
                    target,
                    tolerance.unwrap_or(control.tolerance),
                    max_iterations.unwrap_or(control.max_iterations),
                )?;
                report_move(wait_motion(handle, input))?;
            },
            ReplCommand::Target(key) => {
                let table = self.mode.targets()?;
                let found = table.find(&key).with_context(|| format!("未找到靶位: {key}"))?;
                println!("⏳ 移动到 {}（{}）", found.name, found.position);
                let control = &self.mode.settings().control;
                let handle = wheel.move_to_mod_position(
                    found.position,
                    control.tolerance,
                    control.max_iterations,
                )?;
                report_move(wait_motion(handle, input))?;
            },
            ReplCommand::Lock(target) => {
                wheel.start_lock(target)?;
                println!("🔒 锁定到 {target}（unlock 解除）");
            },
            ReplCommand::Unlock => {
                wheel.stop_lock()?;
                println!("✅ 已解除锁定");
            },
            ReplCommand::Jog(direction) => {
                wheel.start_jog_in(direction)?;
                println!("🔄 点动中（stop 停止）");
            },
            ReplCommand::Sweep => {
                wheel.start_sweep()?;
                println!("〰️ 扫描中（stop 停止）");
            },
            ReplCommand::Stop => self.stop_all()?,
            ReplCommand::Home => {
                wheel.seek_home()?;
                println!("✅ 已静止于 {}", wheel.wait_until_settled()?);
            },
            ReplCommand::Reset => {
                wheel.reset()?;
                println!("✅ 复位完成，位置 {}", wheel.wait_until_settled()?);
            },
            ReplCommand::Zero => {
                wheel.set_encoder_position(0)?;
                println!("✅ 编码器位置已置零");
            },
            ReplCommand::Set { register, value } => {
                let accepted = wheel.set(register, value)?;
                println!("✅ {register} = {}", register.format_value(accepted));
            },
            ReplCommand::Raw(text) => println!("{}", wheel.send_raw(&text)?),
        }
        Ok(())
    }

    /// 停止闭环运动、点动和扫描
    pub fn stop_all(&self) -> Result<()> {
        if let Some(mode) = self.wheel.cancel_active_motion() {
            println!("🛑 已取消 {mode}");
        }
        self.wheel.stop_jog()?;
        self.wheel.stop_sweep()?;
        println!("🛑 已停止");
        Ok(())
    }
}

/// 等待闭环移动结束，期间 Ctrl+C 或 `stop` 取消移动
fn wait_motion(handle: MotionHandle, input: Option<&Receiver<String>>) -> Result<wheel_sdk::MotionReport, ClientError> {
    if let Some(input) = input {
        while !handle.is_finished() {
            match input.recv_timeout(Duration::from_millis(50)) {
                Ok(line) if line == INTERRUPT || line == "stop" => handle.cancel(),
                Ok(line) => eprintln!("⚠️  移动中，忽略: {line}"),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => handle.cancel(),
            }
        }
    }
    handle.wait()
}

fn report_move(outcome: Result<wheel_sdk::MotionReport, ClientError>) -> Result<()> {
    match outcome {
        Ok(report) => {
            println!(
                "✅ 已到位: 位置 {}，误差 {}，迭代 {} 次",
                report.final_position, report.final_error, report.iterations
            );
            Ok(())
        },
        Err(ClientError::Cancelled { iterations }) => {
            println!("🛑 移动已取消（{iterations} 次迭代后）");
            Ok(())
        },
        Err(e) => Err(e.into()),
    }
}

/// 运行 REPL 模式
pub fn run_repl(mode: &OneShotMode) -> Result<()> {
    let wheel = mode.connect()?;
    let mut session = ReplSession::new(mode, wheel);
    let input = ReplInput::new();

    println!("Wheel CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
    println!("输入 'help' 查看帮助，'exit' 退出");
    println!();

    while let Ok(line) = input.command_rx.recv() {
        if line == INTERRUPT {
            eprintln!("🛑 Emergency stop");
            if let Err(err) = session.stop_all() {
                eprintln!("❌ Error: {err}");
            }
            continue;
        }

        let command = match ReplCommand::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                eprintln!("❌ {err}");
                continue;
            },
        };
        if command == ReplCommand::Exit {
            break;
        }
        if let Err(err) = session.execute(command, Some(&input.command_rx)) {
            eprintln!("❌ Error: {err}");
            print_help_hint(&line);
        }
    }

    session.monitor.take();
    session.wheel.disconnect();
    println!("👋 再见！");
    Ok(())
}

/// 打印帮助信息
fn print_help() {
    println!("可用命令:");
    println!("  status                        读取全部寄存器");
    println!("  pos                           查询当前位置");
    println!("  mon [ms]                      开启/关闭遥测监控");
    println!("  move <mod> [tol] [max]        闭环移动到圈内位置");
    println!("  target <name|index>           闭环移动到靶位");
    println!("  lock <mod> / unlock           闭环锁定 / 解除");
    println!("  jog [cw|ccw] / sweep          点动 / 扫描");
    println!("  stop                          停止一切运动");
    println!("  home / reset / zero           寻零 / 复位 / 编码器置零");
    println!("  set <param> <value>           写寄存器");
    println!("  <raw>                         发送原始命令（如 RUe1, VE2.5）");
    println!("  help / exit                   帮助 / 退出");
    println!();
    println!("快捷键:");
    println!("  Ctrl+C                        停止一切运动");
    println!("  Ctrl+D                        退出");
    println!();
}

/// 提供基于错误的帮助提示
fn print_help_hint(command: &str) {
    if command.starts_with("move") || command.starts_with("lock") {
        eprintln!("💡 提示: 圈内位置范围 0..8192，例如 'move 4096'");
    } else if command.starts_with("set") {
        eprintln!("💡 提示: 使用 'set jog_speed 2.5' 或 'set JS 2.5'");
    } else {
        eprintln!("💡 提示: 输入 'help' 查看所有命令");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheel_client::{PidConfig, WheelBuilder};
    use wheel_sdk::link::mock::MockController;
    use wheel_tools::Settings;

    fn session<'a>(mode: &'a OneShotMode, sim: &MockController) -> ReplSession<'a> {
        let wheel = WheelBuilder::new()
            .pid(PidConfig::default().with_tick(Duration::from_millis(5)))
            .connect_with(sim.connector())
            .unwrap();
        ReplSession::new(mode, wheel)
    }

    #[test]
    fn test_parse_builtins() {
        assert_eq!(ReplCommand::parse("mon").unwrap(), ReplCommand::Monitor(None));
        assert_eq!(ReplCommand::parse("mon 200").unwrap(), ReplCommand::Monitor(Some(200)));
        assert_eq!(
            ReplCommand::parse("move 4096 2").unwrap(),
            ReplCommand::Move { target: 4096, tolerance: Some(2), max_iterations: None }
        );
        assert_eq!(ReplCommand::parse("jog ccw").unwrap(), ReplCommand::Jog(Direction::Reverse));
        assert_eq!(
            ReplCommand::parse("set JS 2.5").unwrap(),
            ReplCommand::Set { register: Register::JogSpeed, value: 2.5 }
        );
        assert_eq!(ReplCommand::parse("QUIT").unwrap(), ReplCommand::Exit);
    }

    #[test]
    fn test_parse_falls_back_to_raw() {
        assert_eq!(ReplCommand::parse("RUe1").unwrap(), ReplCommand::Raw("RUe1".to_string()));
        assert_eq!(ReplCommand::parse(" VE2.5 ").unwrap(), ReplCommand::Raw("VE2.5".to_string()));
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        assert!(ReplCommand::parse("move").is_err());
        assert!(ReplCommand::parse("move abc").is_err());
        assert!(ReplCommand::parse("jog sideways").is_err());
        assert!(ReplCommand::parse("set warp 1").is_err());
        assert!(ReplCommand::parse("").is_err());
    }

    #[test]
    fn test_session_runs_commands_against_controller() {
        let sim = MockController::new();
        sim.set_position(300);
        let mode = OneShotMode::from_settings(Settings::default());
        let mut session = session(&mode, &sim);

        session.execute(ReplCommand::Raw("RUe1".to_string()), None).unwrap();
        assert!(session.execute(ReplCommand::Raw("ZZ".to_string()), None).is_err());

        session.execute(ReplCommand::Jog(Direction::Forward), None).unwrap();
        assert!(sim.is_jogging());
        session.execute(ReplCommand::Stop, None).unwrap();
        assert!(!sim.is_jogging());

        session
            .execute(ReplCommand::Move { target: 1000, tolerance: Some(1), max_iterations: Some(50) }, None)
            .unwrap();
        assert!((sim.position() - 1000).abs() <= 1);
    }

    #[test]
    fn test_monitor_toggles() {
        let sim = MockController::new();
        let mode = OneShotMode::from_settings(Settings::default());
        let mut session = session(&mode, &sim);

        session.execute(ReplCommand::Monitor(Some(5)), None).unwrap();
        assert!(session.is_monitoring());
        session.execute(ReplCommand::Monitor(None), None).unwrap();
        assert!(!session.is_monitoring());
    }

    #[test]
    fn test_stop_cancels_move_from_input() {
        let sim = MockController::new();
        sim.set_stuck(true);
        let mode = OneShotMode::from_settings(Settings::default());
        let mut session = session(&mode, &sim);

        let (tx, rx) = bounded(4);
        tx.send(INTERRUPT.to_string()).unwrap();
        session
            .execute(ReplCommand::Move { target: 4000, tolerance: Some(1), max_iterations: Some(-1) }, Some(&rx))
            .unwrap();
        assert_eq!(session.wheel().mode(), wheel_sdk::Mode::Idle);
    }
}
