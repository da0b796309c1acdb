//! # Wheel CLI
//!
//! 靶轮控制器命令行工具。
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认地址
//! wheel-cli config set host 192.168.203.68
//!
//! # 执行操作（内部：连接 -> 移动 -> 断开）
//! wheel-cli move --target 3
//! ```
//!
//! ### REPL 模式（推荐用于调试）
//!
//! ```bash
//! $ wheel-cli shell
//! wheel> RUe1
//! RUe1=4096
//! wheel> mon
//! wheel> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod modes;
mod utils;

use commands::{
    ConfigCommand, JogCommand, LockCommand, MoveCommand, SendCommand, SetCommand, SweepCommand,
    TargetsCommand,
};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// Wheel CLI - 靶轮命令行工具
#[derive(Parser, Debug)]
#[command(name = "wheel-cli")]
#[command(about = "Command-line interface for the target wheel motion controller", long_about = None)]
#[command(version)]
struct Cli {
    /// 控制器地址（覆盖配置）
    #[arg(long, global = true)]
    host: Option<String>,

    /// 控制器端口（覆盖配置）
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 靶位表管理
    #[command(subcommand)]
    Targets(TargetsCommand),

    /// 读取并显示全部寄存器
    Status,

    /// 查询当前位置
    Position,

    /// 闭环移动到圈内位置或靶位
    Move {
        #[command(flatten)]
        args: MoveCommand,
    },

    /// 闭环锁定（Ctrl+C 结束）
    Lock {
        #[command(flatten)]
        args: LockCommand,
    },

    /// 点动旋转（Ctrl+C 结束）
    Jog {
        #[command(flatten)]
        args: JogCommand,
    },

    /// 扫描（Ctrl+C 结束）
    Sweep {
        #[command(flatten)]
        args: SweepCommand,
    },

    /// 寻零并等待静止
    Home,

    /// 复位控制器并寻零
    Reset,

    /// 将当前编码器位置设为 0
    Zero,

    /// 写寄存器
    Set {
        #[command(flatten)]
        args: SetCommand,
    },

    /// 发送原始命令（经白名单校验）
    Send {
        #[command(flatten)]
        args: SendCommand,
    },

    /// 监控遥测数据（Ctrl+C 结束）
    Monitor {
        /// 刷新间隔（毫秒）
        #[arg(short, long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

fn main() -> Result<()> {
    wheel_sdk::init_logger_with("warn,wheel_cli=info");

    let cli = Cli::parse();
    let Cli { host, port, command } = cli;

    match command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Targets(cmd) => cmd.execute(&OneShotMode::new(host, port)?),
        Commands::Status => OneShotMode::new(host, port)?.status(),
        Commands::Position => OneShotMode::new(host, port)?.position(),
        Commands::Move { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Lock { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Jog { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Sweep { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Home => OneShotMode::new(host, port)?.home(),
        Commands::Reset => OneShotMode::new(host, port)?.reset(),
        Commands::Zero => OneShotMode::new(host, port)?.zero(),
        Commands::Set { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Send { args } => args.execute(&OneShotMode::new(host, port)?),
        Commands::Monitor { interval_ms } => OneShotMode::new(host, port)?.monitor(interval_ms),
        // REPL 模式：交互式 Shell
        Commands::Shell => run_repl(&OneShotMode::new(host, port)?),
    }
}
