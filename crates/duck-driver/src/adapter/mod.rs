//! 协议适配器
//!
//! 两个互不兼容的线协议收敛到一个能力接口后面。适配器在打开总线时
//! 根据配置选定一次，之后不存在任何逐调用的类型探测。
//!
//! 每个原语都是单发的：失败就返回，不在适配器内部重试。
//! 重试预算属于调用方（HWI / 诊断状态机），这样各操作可以单独调参。

mod sc;
mod st;

pub use sc::ScAdapter;
pub use st::StAdapter;

use duck_bus::{BusError, BusTransport};
use duck_protocol::{InstructionPacket, ProtocolKind, ProtocolProfile, StatusPacket};
use duck_protocol::packet::word_to_bytes;
use tracing::warn;

/// 诊断寄存器读数（名字 + 读取结果，统一拓宽到 u16）
#[derive(Debug)]
pub struct DiagnosticRegister {
    pub name: &'static str,
    pub value: Result<u16, BusError>,
}

/// 一个舵机家族的读写原语
///
/// 所有方法都是单次总线事务（`write_goal` 的 SC 实现除外，
/// 它需要先读当前位置来推导运动时长，这是固件事实）。
pub trait ServoAdapter: Send + Sync {
    fn kind(&self) -> ProtocolKind;

    fn profile(&self) -> ProtocolProfile;

    /// 读当前位置（计数）
    fn read_position(&self, bus: &mut dyn BusTransport, id: u8) -> Result<u16, BusError>;

    /// 读当前速度（原始速度单位，带符号）
    fn read_speed(&self, bus: &mut dyn BusTransport, id: u8) -> Result<i16, BusError>;

    /// 读"是否在运动"标志
    fn read_moving(&self, bus: &mut dyn BusTransport, id: u8) -> Result<bool, BusError>;

    /// 写目标位置
    ///
    /// SC 家族用时长参数，ST 家族用速度+加速度，差异封装在实现里。
    fn write_goal(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        count: u16,
        speed: u16,
        acc: u8,
    ) -> Result<(), BusError>;

    /// 力矩开关
    fn set_torque(&self, bus: &mut dyn BusTransport, id: u8, enabled: bool) -> Result<(), BusError>;

    /// 读诊断寄存器组
    ///
    /// 只在运动验证失败时调用，正常路径不产生这部分总线流量。
    fn read_diagnostics(&self, bus: &mut dyn BusTransport, id: u8) -> Vec<DiagnosticRegister>;

    /// 写单字节寄存器（台架配置：改 ID 等）
    fn write_byte(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        addr: u8,
        value: u8,
    ) -> Result<(), BusError>;

    /// 读单字节寄存器
    fn read_byte(&self, bus: &mut dyn BusTransport, id: u8, addr: u8) -> Result<u8, BusError>;

    /// EPROM 解锁 / 上锁（ID 写入需要持久化时）
    fn set_eprom_lock(&self, bus: &mut dyn BusTransport, id: u8, locked: bool)
    -> Result<(), BusError>;
}

/// 按协议家族构造适配器（打开时调用一次）
pub fn adapter_for(profile: ProtocolProfile) -> Box<dyn ServoAdapter> {
    match profile.kind {
        ProtocolKind::Sc => Box::new(ScAdapter::new(profile)),
        ProtocolKind::St => Box::new(StAdapter::new(profile)),
    }
}

// ==================== 家族共用的事务原语 ====================

/// 发送指令包并解析状态包，核对应答 ID
pub(crate) fn exchange(
    bus: &mut dyn BusTransport,
    packet: &InstructionPacket,
) -> Result<StatusPacket, BusError> {
    let raw = bus.transaction(&packet.to_bytes())?;
    let status = StatusPacket::parse(&raw)?;
    if status.id != packet.id {
        warn!(
            expected = packet.id,
            got = status.id,
            "response from unexpected servo id"
        );
    }
    if status.error != 0 {
        // 固件错误位（过载/过压等）只记录，不当作事务失败，
        // 与原厂 SDK 的通信结果语义一致
        warn!(id = status.id, error = status.error, "servo reports error bits");
    }
    Ok(status)
}

pub(crate) fn read_word(
    bus: &mut dyn BusTransport,
    kind: ProtocolKind,
    id: u8,
    addr: u8,
) -> Result<u16, BusError> {
    let status = exchange(bus, &InstructionPacket::read(id, addr, 2))?;
    status
        .word(kind)
        .ok_or_else(|| short_reply(2, status.params.len()))
}

pub(crate) fn read_byte_reg(
    bus: &mut dyn BusTransport,
    id: u8,
    addr: u8,
) -> Result<u8, BusError> {
    let status = exchange(bus, &InstructionPacket::read(id, addr, 1))?;
    status
        .params
        .first()
        .copied()
        .ok_or_else(|| short_reply(1, status.params.len()))
}

pub(crate) fn write_reg(
    bus: &mut dyn BusTransport,
    id: u8,
    addr: u8,
    data: &[u8],
) -> Result<(), BusError> {
    exchange(bus, &InstructionPacket::write(id, addr, data)).map(|_| ())
}

pub(crate) fn short_reply(expected: usize, actual: usize) -> BusError {
    BusError::Corrupt(duck_protocol::ProtocolError::TooShort { expected, actual })
}

/// 原始速度字段解码：bit15 是方向位
pub(crate) fn decode_speed(raw: u16) -> i16 {
    if raw & 0x8000 != 0 {
        -((raw & 0x7FFF) as i16)
    } else {
        raw as i16
    }
}

/// 位置/速度等 16 位数值按家族字节序编码
pub(crate) fn word_bytes(kind: ProtocolKind, value: u16) -> [u8; 2] {
    word_to_bytes(kind, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_speed_sign_bit() {
        assert_eq!(decode_speed(0), 0);
        assert_eq!(decode_speed(100), 100);
        assert_eq!(decode_speed(0x8064), -100);
    }
}
