//! # Duck CLI
//!
//! 鸭子机器人舵机总线的台架与上电前工具。
//!
//! ```bash
//! # 扫总线，看哪些 ID 在应答
//! duck-cli --serial-port /dev/ttyACM0 scan
//!
//! # 操作员监督的上电前诊断（含小幅运动测试）
//! duck-cli check
//!
//! # 两阶段标定：记录中位读数，再合并进配置
//! duck-cli calibrate --output offsets.json
//! duck-cli merge --record offsets.json
//!
//! # 台架：给单个舵机改 ID、装舵盘
//! duck-cli configure --new-id 12
//!
//! # IMU 数据流
//! duck-cli imu --imu-port /dev/serial0
//! ```
//!
//! 所有驱动硬件的子命令都在 Ctrl-C 上做尽力而为的力矩关断。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod connect;
mod operator;

use commands::{
    CalibrateCommand, CheckCommand, ConfigureCommand, ImuCommand, MergeCommand, ScanCommand,
};

/// Duck CLI - 舵机总线工具
#[derive(Parser, Debug)]
#[command(name = "duck-cli")]
#[command(about = "Bench and pre-flight tooling for the duck robot servo bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描总线上的舵机 ID
    Scan {
        #[command(flatten)]
        args: ScanCommand,
    },

    /// 上电前诊断（操作员监督的响应性 + 运动测试）
    Check {
        #[command(flatten)]
        args: CheckCommand,
    },

    /// 标定阶段 1：记录所有舵机的中位读数
    Calibrate {
        #[command(flatten)]
        args: CalibrateCommand,
    },

    /// 标定阶段 2：把记录合并进机器人配置
    Merge {
        #[command(flatten)]
        args: MergeCommand,
    },

    /// 台架配置单个舵机（改 ID、装舵盘、验证运动）
    Configure {
        #[command(flatten)]
        args: ConfigureCommand,
    },

    /// 打印 IMU 姿态数据流
    Imu {
        #[command(flatten)]
        args: ImuCommand,
    },
}

fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("duck_cli=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scan { args } => args.execute(),
        Commands::Check { args } => args.execute(),
        Commands::Calibrate { args } => args.execute(),
        Commands::Merge { args } => args.execute(),
        Commands::Configure { args } => args.execute(),
        Commands::Imu { args } => args.execute(),
    }
}
