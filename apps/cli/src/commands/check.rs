//! 上电前诊断命令

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use duck_client::{CheckOutcome, DiagnosticMachine, ServoHealth};

use crate::connect::{ConnectArgs, install_interrupt_sweep};
use crate::operator::ConsoleOperator;

/// 诊断命令参数
#[derive(Args, Debug)]
pub struct CheckCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 运动测试的位置增量（弧度）
    #[arg(long, default_value_t = 0.1)]
    pub delta: f64,

    /// 每次指令后的等待（毫秒）
    #[arg(long, default_value_t = 1000)]
    pub settle_ms: u64,
}

impl CheckCommand {
    pub fn execute(&self) -> Result<()> {
        let config = self.connect.load_config()?;
        let hwi = self.connect.open_hwi(&config)?;
        install_interrupt_sweep(Arc::clone(&hwi))?;

        println!("⏳ 上电前诊断：{} 个关节", hwi.joints().len());

        let mut machine = DiagnosticMachine::new(&hwi, ConsoleOperator);
        machine.delta = self.delta;
        machine.settle = Duration::from_millis(self.settle_ms);
        let report = machine.run();

        println!("\n📊 诊断结果:");
        for (name, health) in &report.health {
            let mark = match health {
                ServoHealth::Responsive => "✔",
                ServoHealth::Unresponsive => "❌",
                ServoHealth::Unknown => "?",
            };
            println!("  {mark} {name}");
        }
        for m in &report.movements {
            let mark = if m.ok { "✔" } else { "❌" };
            match (m.before, m.after) {
                (Some(b), Some(a)) => {
                    println!("  {mark} {} 运动测试: {:.3} → {:.3} rad", m.joint, b, a)
                }
                _ => println!("  {mark} {} 运动测试: 读取失败", m.joint),
            }
        }

        hwi.close();
        if report.outcome == CheckOutcome::Aborted {
            bail!("diagnostic aborted by operator");
        }
        println!("\n✔ 诊断完成");
        Ok(())
    }
}
