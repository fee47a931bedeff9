//! 标定阶段 2：合并记录进配置

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use duck_client::CalibrationRecord;
use duck_client::calibration::merge_into_config;

/// 合并命令参数
#[derive(Args, Debug)]
pub struct MergeCommand {
    /// 标定记录文件（calibrate --output 的产物）
    #[arg(long)]
    pub record: PathBuf,

    /// 机器人配置文件路径
    #[arg(long, default_value = "duck_config.json")]
    pub duck_config_path: String,
}

impl MergeCommand {
    pub fn execute(&self) -> Result<()> {
        let record = CalibrationRecord::load(&self.record)?;
        println!("⏳ 合并 {} 个舵机的偏移...", record.len());

        let report = merge_into_config(&self.duck_config_path, &record)?;

        println!("✔ 已合并进 {}", self.duck_config_path);
        println!("  备份: {}", report.backup_path.display());
        for name in &report.updated {
            println!("  更新 {name}");
        }
        for name in &report.preserved {
            println!("  保留 {name}（记录里没有对应舵机）");
        }
        Ok(())
    }
}
