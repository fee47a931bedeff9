//! ST/SMS 家族适配器（STS，2048 计数）
//!
//! ST 固件直接接受速度 + 加速度三元组：加速度寄存器紧邻目标位置
//! 之前，一次连续写入 acc + position + time + speed 共 7 字节
//! （对应原厂 SDK 的 WritePosEx）。

use duck_bus::{BusError, BusTransport};
use duck_protocol::registers::{EPROM_LOCK, EPROM_UNLOCK, st};
use duck_protocol::{ProtocolKind, ProtocolProfile};
use tracing::debug;

use super::{
    DiagnosticRegister, ServoAdapter, decode_speed, read_byte_reg, read_word, word_bytes,
    write_reg,
};

pub struct StAdapter {
    profile: ProtocolProfile,
}

impl StAdapter {
    pub fn new(profile: ProtocolProfile) -> Self {
        debug_assert_eq!(profile.kind, ProtocolKind::St);
        Self { profile }
    }
}

impl ServoAdapter for StAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::St
    }

    fn profile(&self) -> ProtocolProfile {
        self.profile
    }

    fn read_position(&self, bus: &mut dyn BusTransport, id: u8) -> Result<u16, BusError> {
        read_word(bus, ProtocolKind::St, id, st::PRESENT_POSITION)
    }

    fn read_speed(&self, bus: &mut dyn BusTransport, id: u8) -> Result<i16, BusError> {
        read_word(bus, ProtocolKind::St, id, st::PRESENT_SPEED).map(decode_speed)
    }

    fn read_moving(&self, bus: &mut dyn BusTransport, id: u8) -> Result<bool, BusError> {
        read_byte_reg(bus, id, st::MOVING).map(|v| v != 0)
    }

    fn write_goal(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        count: u16,
        speed: u16,
        acc: u8,
    ) -> Result<(), BusError> {
        debug!(id, count, speed, acc, "st write goal");
        let mut data = [0u8; 7];
        data[0] = acc;
        data[1..3].copy_from_slice(&word_bytes(ProtocolKind::St, count));
        // time 字段置 0：ST 家族由速度/加速度决定轨迹
        data[3..5].copy_from_slice(&word_bytes(ProtocolKind::St, 0));
        data[5..7].copy_from_slice(&word_bytes(ProtocolKind::St, speed));
        write_reg(bus, id, st::GOAL_ACC, &data)
    }

    fn set_torque(&self, bus: &mut dyn BusTransport, id: u8, enabled: bool) -> Result<(), BusError> {
        write_reg(bus, id, st::TORQUE_ENABLE, &[u8::from(enabled)])
    }

    fn read_diagnostics(&self, bus: &mut dyn BusTransport, id: u8) -> Vec<DiagnosticRegister> {
        vec![
            DiagnosticRegister {
                name: "torque_enable",
                value: read_byte_reg(bus, id, st::TORQUE_ENABLE).map(u16::from),
            },
            DiagnosticRegister {
                name: "min_angle_limit",
                value: read_word(bus, ProtocolKind::St, id, st::MIN_ANGLE_LIMIT),
            },
            DiagnosticRegister {
                name: "max_angle_limit",
                value: read_word(bus, ProtocolKind::St, id, st::MAX_ANGLE_LIMIT),
            },
            DiagnosticRegister {
                name: "present_position",
                value: read_word(bus, ProtocolKind::St, id, st::PRESENT_POSITION),
            },
            DiagnosticRegister {
                name: "present_speed",
                value: read_word(bus, ProtocolKind::St, id, st::PRESENT_SPEED),
            },
            DiagnosticRegister {
                name: "moving",
                value: read_byte_reg(bus, id, st::MOVING).map(u16::from),
            },
        ]
    }

    fn write_byte(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        addr: u8,
        value: u8,
    ) -> Result<(), BusError> {
        write_reg(bus, id, addr, &[value])
    }

    fn read_byte(&self, bus: &mut dyn BusTransport, id: u8, addr: u8) -> Result<u8, BusError> {
        read_byte_reg(bus, id, addr)
    }

    fn set_eprom_lock(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        locked: bool,
    ) -> Result<(), BusError> {
        let value = if locked { EPROM_LOCK } else { EPROM_UNLOCK };
        write_reg(bus, id, st::LOCK, &[value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duck_bus::mock::{MockBus, request_addr, status_frame};

    #[test]
    fn test_write_goal_layout() {
        let mut bus = MockBus::new(|req| Ok(status_frame(req[2], 0, &[])));
        let log = bus.sent_log();
        let a = StAdapter::new(ProtocolKind::St.profile());

        a.write_goal(&mut bus, 5, 1024, 600, 30).unwrap();

        let sent = log.lock();
        let frame = &sent[0];
        // WRITE @ GOAL_ACC，载荷 acc + pos + time + speed
        assert_eq!(request_addr(frame), st::GOAL_ACC);
        let payload = &frame[6..13];
        assert_eq!(payload[0], 30);
        // ST 小端：1024 = 0x0400
        assert_eq!(&payload[1..3], &[0x00, 0x04]);
        assert_eq!(&payload[3..5], &[0x00, 0x00]);
        assert_eq!(&payload[5..7], &[0x58, 0x02]);
    }
}
