//! 台架配置命令：给单个舵机改 ID、装舵盘、验证运动
//!
//! 一次只接一个舵机。ID 写进 EPROM 需要先解锁、写完再上锁；
//! 部分批次的舵机 EPROM 提交不可靠，所以写两遍再校验。

use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;

use duck_bus::BusTransport;
use duck_driver::ServoAdapter;
use duck_protocol::ProtocolKind;
use duck_protocol::registers::{sc, st};

use crate::connect::ConnectArgs;

/// 台架速度/加速度，低到装错也不伤结构
const BENCH_SPEED: u16 = 600;
const BENCH_ACC: u8 = 30;
/// EPROM 提交等待
const EPROM_SETTLE: Duration = Duration::from_millis(800);

/// 配置命令参数
#[derive(Args, Debug)]
pub struct ConfigureCommand {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// 要写入的新 ID（0-253）
    #[arg(long)]
    pub new_id: u8,

    /// 只改 ID，跳过居中、舵盘安装和运动验证
    #[arg(long)]
    pub only_id: bool,
}

fn id_addr(kind: ProtocolKind) -> u8 {
    match kind {
        ProtocolKind::Sc => sc::ID,
        ProtocolKind::St => st::ID,
    }
}

impl ConfigureCommand {
    pub fn execute(&self) -> Result<()> {
        if self.new_id > 253 {
            bail!("servo id must be 0-253, got {}", self.new_id);
        }
        let config = self.connect.load_config()?;
        let (adapter, mut bus) = self.connect.open_bench(&config)?;
        crate::connect::install_bench_interrupt_sweep(config.protocol, bus.clone())?;

        println!("=== 舵机台架配置 ===");
        println!("⚠️  确保总线上只接了一个舵机");

        // 扫描整个合法 ID 空间找到它
        println!("\n⏳ 扫描舵机...");
        let mut found_id = None;
        for id in 0..=253u8 {
            if let Ok(pos) = adapter.read_position(&mut bus, id) {
                println!("✔ 发现舵机 ID {id}，位置 {pos}");
                found_id = Some(id);
                break;
            }
        }
        let Some(found_id) = found_id else {
            bus.close();
            bail!("no servo detected, check power and wiring");
        };

        let center = adapter.profile().center_count();
        if !self.only_id {
            println!("\n⏳ 开到中位 ({center})...");
            adapter.write_goal(&mut bus, found_id, center, BENCH_SPEED, BENCH_ACC)?;
            spin_sleep::sleep(Duration::from_secs(2));

            println!("\n➡️  现在断电，在机械中立位装上舵盘");
            let _ = inquire::Confirm::new("舵盘装好了？")
                .with_default(true)
                .prompt();
        }

        let current_id = if found_id != self.new_id {
            self.write_id(adapter.as_ref(), &mut bus, found_id)?
        } else {
            println!("ID 已经正确，跳过改写");
            found_id
        };

        if !self.only_id {
            // 左右各摆一次再回中，确认舵盘方向装对了
            println!("\n⏳ 运动验证...");
            let delta = adapter.profile().resolution / 10;
            adapter.write_goal(&mut bus, current_id, center - delta, BENCH_SPEED, BENCH_ACC)?;
            spin_sleep::sleep(Duration::from_secs(1));
            adapter.write_goal(&mut bus, current_id, center + delta, BENCH_SPEED, BENCH_ACC)?;
            spin_sleep::sleep(Duration::from_secs(1));
            adapter.write_goal(&mut bus, current_id, center, BENCH_SPEED, BENCH_ACC)?;
            spin_sleep::sleep(Duration::from_secs(1));
        }

        let pos = adapter.read_position(&mut bus, current_id)?;
        bus.close();

        println!("\n===");
        println!("✔ 配置完成");
        println!("  最终 ID: {current_id}");
        println!("  位置:    {pos}");
        println!("===");
        println!("\n可以断开这个舵机，换下一个。");
        Ok(())
    }

    /// 解锁 EPROM → 写两遍新 ID → 上锁 → 回读校验
    fn write_id(
        &self,
        adapter: &dyn ServoAdapter,
        bus: &mut dyn BusTransport,
        found_id: u8,
    ) -> Result<u8> {
        let addr = id_addr(adapter.kind());
        println!("\n⏳ 改 ID {} → {}", found_id, self.new_id);

        match adapter.read_byte(bus, found_id, addr) {
            Ok(v) => println!("  当前 ID 寄存器: {v}"),
            Err(e) => println!("  当前 ID 寄存器读取失败: {e}"),
        }

        adapter.set_eprom_lock(bus, found_id, false)?;

        adapter.write_byte(bus, found_id, addr, self.new_id)?;
        spin_sleep::sleep(EPROM_SETTLE);
        // 部分批次 EPROM 提交不可靠，冗余写一遍
        if let Err(e) = adapter.write_byte(bus, found_id, addr, self.new_id) {
            println!("⚠️  第二次写入失败: {e}");
        }
        spin_sleep::sleep(EPROM_SETTLE);

        // 写完 ID 后舵机可能已经换了身份，先用新 ID 上锁，不行再试旧的
        if adapter.set_eprom_lock(bus, self.new_id, true).is_err() {
            if let Err(e) = adapter.set_eprom_lock(bus, found_id, true) {
                println!("⚠️  EPROM 上锁失败: {e}");
            }
        }
        spin_sleep::sleep(Duration::from_millis(1200));

        let read_back = adapter.read_byte(bus, self.new_id, addr)?;
        if read_back != self.new_id {
            bail!(
                "id verification failed: register reads {} at id {}",
                read_back,
                self.new_id
            );
        }
        println!("✔ ID 已写入并校验: {read_back}");
        Ok(self.new_id)
    }
}
