//! 总线扫描命令

use anyhow::Result;
use clap::Args;

use crate::connect::ConnectArgs;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct ScanCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 扫描起始 ID
    #[arg(long, default_value_t = 1)]
    pub from: u8,

    /// 扫描结束 ID（含）
    #[arg(long, default_value_t = 50)]
    pub to: u8,
}

impl ScanCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connect.load_config()?;
        let hwi = self.connect.open_hwi(&config)?;

        println!("⏳ 扫描 ID {}..={}...", self.from, self.to);
        let found = hwi.scan_bus(self.from..=self.to);

        if found.is_empty() {
            println!("❌ 没有舵机应答，检查供电和接线");
        } else {
            println!("✔ 发现 {} 个舵机:", found.len());
            for id in &found {
                // 反查关节表，没映射的 ID 也照样列出来
                let joint = hwi
                    .joints()
                    .iter()
                    .find(|j| j.servo_id == *id)
                    .map(|j| j.name.as_str())
                    .unwrap_or("(未映射)");
                println!("  ID {id:3}  {joint}");
            }
            // 配置里有、总线上没有的关节单独点名
            for spec in hwi.joints() {
                if !found.contains(&spec.servo_id) {
                    println!("⚠️  {} (ID {}) 未应答", spec.name, spec.servo_id);
                }
            }
        }

        hwi.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_default_range() {
        let cmd = ScanCommand {
            connect: ConnectArgs {
                serial_port: "/dev/ttyACM0".to_string(),
                baud_rate: 1_000_000,
                duck_config_path: "duck_config.json".to_string(),
                protocol: None,
            },
            from: 1,
            to: 50,
        };
        assert_eq!(cmd.from, 1);
        assert_eq!(cmd.to, 50);
    }
}
