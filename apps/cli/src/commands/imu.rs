//! IMU 数据流命令

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use duck_client::imu::{ImuPoller, SerialImu};

/// IMU 命令参数
#[derive(Args, Debug)]
pub struct ImuCommand {
    /// IMU 串口（UART-RVC 模式）
    #[arg(long, default_value = "/dev/serial0")]
    pub imu_port: String,

    /// IMU 波特率
    #[arg(long, default_value_t = SerialImu::DEFAULT_BAUD)]
    pub imu_baud: u32,

    /// 打印多少帧后退出（默认一直打印到 Ctrl-C）
    #[arg(long)]
    pub count: Option<u64>,
}

impl ImuCommand {
    pub fn execute(&self) -> Result<()> {
        let source = SerialImu::open(&self.imu_port, self.imu_baud)?;
        let poller = ImuPoller::spawn(source);
        let latest = poller.latest();

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;

        println!("📊 yaw / pitch / roll (°)   accel (m/s²)");
        let mut printed = 0u64;
        while running.load(Ordering::SeqCst) {
            let Some(frame) = latest.wait_fresh(Duration::from_millis(500)) else {
                println!("⚠️  500 ms 内没有新帧，检查接线和波特率");
                continue;
            };
            println!(
                "  {:8.2} {:8.2} {:8.2}   [{:6.2} {:6.2} {:6.2}]",
                frame.yaw,
                frame.pitch,
                frame.roll,
                frame.accel[0],
                frame.accel[1],
                frame.accel[2],
            );
            printed += 1;
            if self.count.is_some_and(|n| printed >= n) {
                break;
            }
        }

        poller.stop();
        Ok(())
    }
}
