//! 标定阶段 1：记录中位读数

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use duck_bus::BusTransport;
use duck_client::calibration::{self, RecordOptions};

use crate::connect::ConnectArgs;

/// 标定记录命令参数
#[derive(Args, Debug)]
pub struct CalibrateCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 扫描起始 ID
    #[arg(long, default_value_t = 1)]
    pub from: u8,

    /// 扫描结束 ID（含）
    #[arg(long, default_value_t = 50)]
    pub to: u8,

    /// 开到中位的安全速度（原始速度单位）
    #[arg(long, default_value_t = 500)]
    pub speed: u16,

    /// 加速度（ST 家族）
    #[arg(long, default_value_t = 30)]
    pub acc: u8,

    /// 到位等待（毫秒）
    #[arg(long, default_value_t = 800)]
    pub settle_ms: u64,

    /// 记录输出文件（JSON，舵机 ID → 计数）
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// 记录完成后直接合并进配置（等价于随后跑 merge）
    #[arg(long)]
    pub merge: bool,
}

impl CalibrateCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connect.load_config()?;
        let (adapter, mut bus) = self.connect.open_bench(&config)?;
        crate::connect::install_bench_interrupt_sweep(config.protocol, bus.clone())?;

        println!("⚠️  标定会把所有应答的舵机开到机械中位");
        println!("⏳ 扫描并居中 ID {}..={}...", self.from, self.to);

        let opts = RecordOptions {
            id_range: self.from..=self.to,
            safe_speed: self.speed,
            safe_acc: self.acc,
            settle: Duration::from_millis(self.settle_ms),
        };
        let record = calibration::record(adapter.as_ref(), &mut bus, &opts);
        bus.close();

        if record.is_empty() {
            bail!("no servos responded in range {}..={}", self.from, self.to);
        }

        println!("✔ 记录 {} 个舵机的中位读数:", record.len());
        for (id, count) in record.iter() {
            println!("  ID {id:3}  {count} counts");
        }

        if let Some(path) = &self.output {
            record.save(path)?;
            println!("✔ 记录已写入 {}", path.display());
        }

        if self.merge {
            let report =
                calibration::merge_into_config(&self.connect.duck_config_path, &record)?;
            println!("✔ 已合并进 {}", self.connect.duck_config_path);
            println!("  备份: {}", report.backup_path.display());
            for name in &report.updated {
                println!("  更新 {name}");
            }
        } else if self.output.is_none() {
            println!("💡 提示: 用 --output 保存记录，或 --merge 直接合并进配置");
        }

        Ok(())
    }
}
