//! 连接参数与会话构建
//!
//! 所有触硬件的子命令共用同一组串口/配置参数，和同一个
//! Ctrl-C 收尾路径（力矩关断 → 关总线 → 退出码 130）。

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use duck_bus::{BusTransport, SerialBus, SharedBus};
use duck_client::shutdown::torque_disable_sweep;
use duck_driver::{DuckConfig, Hwi, ServoAdapter, adapter_for};
use duck_protocol::ProtocolKind;
use duck_protocol::packet::{BROADCAST_ID, InstructionPacket};
use duck_protocol::registers::{sc, st};

/// 串口与配置参数（命令行覆盖配置文件）
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// 舵机总线串口
    #[arg(long, default_value = "/dev/ttyACM0")]
    pub serial_port: String,

    /// 总线波特率
    #[arg(long, default_value_t = 1_000_000)]
    pub baud_rate: u32,

    /// 机器人配置文件路径
    #[arg(long, default_value = "duck_config.json")]
    pub duck_config_path: String,

    /// 协议家族覆盖（sc / st），默认读配置
    #[arg(long)]
    pub protocol: Option<String>,
}

impl ConnectArgs {
    /// 加载配置，应用 --protocol 覆盖
    pub fn load_config(&self) -> Result<DuckConfig> {
        let mut config = DuckConfig::load(&self.duck_config_path)
            .with_context(|| format!("loading {}", self.duck_config_path))?;
        if let Some(name) = &self.protocol {
            config
                .override_protocol(name)
                .with_context(|| format!("unknown protocol {name:?}"))?;
        }
        Ok(config)
    }

    /// 打开统一硬件接口，放进 `Arc` 以便中断处理线程做收尾
    pub fn open_hwi(&self, config: &DuckConfig) -> Result<Arc<Hwi>> {
        let hwi = Hwi::open(config, &self.serial_port, self.baud_rate)
            .with_context(|| format!("opening {}", self.serial_port))?;
        Ok(Arc::new(hwi))
    }

    /// 台架命令用：裸总线 + 协议适配器，不经过关节表
    ///
    /// 总线包在 `SharedBus` 里，克隆一份交给中断处理线程做收尾。
    pub fn open_bench(
        &self,
        config: &DuckConfig,
    ) -> Result<(Box<dyn ServoAdapter>, SharedBus<SerialBus>)> {
        let bus = SerialBus::open(&self.serial_port, self.baud_rate)
            .with_context(|| format!("opening {}", self.serial_port))?;
        Ok((adapter_for(config.profile), SharedBus::new(bus)))
    }
}

/// 注册 Ctrl-C 处理：力矩关断 + 关总线后退出
///
/// 每个进程只能注册一次，驱动硬件的子命令在进入运动流程前调用。
pub fn install_interrupt_sweep(hwi: Arc<Hwi>) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\n⚠️  中断，正在关断力矩...");
        torque_disable_sweep(&hwi);
        std::process::exit(130);
    })
    .context("installing Ctrl-C handler")
}

/// 台架命令的 Ctrl-C 处理：广播力矩关断 + 关总线后退出
///
/// 台架流程不走关节表（总线上可能是任意 ID），所以用广播 ID 关断，
/// 舵机对广播不应答，write_only 即可。
pub fn install_bench_interrupt_sweep(
    kind: ProtocolKind,
    mut bus: SharedBus<SerialBus>,
) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\n⚠️  中断，正在广播力矩关断...");
        if let Err(e) = bus.write_only(&torque_disable_broadcast(kind)) {
            eprintln!("⚠️  力矩关断发送失败: {e}");
        }
        bus.close();
        std::process::exit(130);
    })
    .context("installing Ctrl-C handler")
}

/// 广播力矩关断帧（两个家族的 TORQUE_ENABLE 地址恰好相同，但不依赖这一点）
fn torque_disable_broadcast(kind: ProtocolKind) -> Vec<u8> {
    let addr = match kind {
        ProtocolKind::Sc => sc::TORQUE_ENABLE,
        ProtocolKind::St => st::TORQUE_ENABLE,
    };
    InstructionPacket::write(BROADCAST_ID, addr, &[0]).to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use duck_protocol::packet::INST_WRITE;

    #[test]
    fn test_torque_disable_broadcast_frame() {
        for kind in [ProtocolKind::Sc, ProtocolKind::St] {
            let frame = torque_disable_broadcast(kind);
            assert_eq!(&frame[..3], &[0xFF, 0xFF, BROADCAST_ID]);
            assert_eq!(frame[4], INST_WRITE);
            assert_eq!(frame[5], 0x28);
            assert_eq!(frame[6], 0); // 关断
        }
    }
}
