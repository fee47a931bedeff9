//! SC 家族适配器（SCSCL，1024 计数）
//!
//! SC 固件的目标位置写入带的是"运动时长"而不是加速度。
//! 时长从 |Δcount| / speed 推导，带经验下限和固定补偿毫秒数。
//! 这两个常数是实测调出来的，不是物理公式，按需调整。

use duck_bus::{BusError, BusTransport};
use duck_protocol::registers::{EPROM_LOCK, EPROM_UNLOCK, sc};
use duck_protocol::{ProtocolKind, ProtocolProfile};
use tracing::debug;

use super::{
    DiagnosticRegister, ServoAdapter, decode_speed, read_byte_reg, read_word, word_bytes,
    write_reg,
};

/// 推导出的运动时长下限（ms）：接近零的时长会被固件拒绝
pub const SC_MIN_DURATION_MS: u16 = 20;
/// 固定补偿（ms）：给通信与启动留余量，经验值
pub const SC_DURATION_FUDGE_MS: u16 = 25;

pub struct ScAdapter {
    profile: ProtocolProfile,
}

impl ScAdapter {
    pub fn new(profile: ProtocolProfile) -> Self {
        debug_assert_eq!(profile.kind, ProtocolKind::Sc);
        Self { profile }
    }

    /// |Δcount| / speed → 运动时长（ms），带下限与固定补偿
    fn duration_ms(&self, delta: u16, speed: u16) -> u16 {
        if speed == 0 {
            return SC_MIN_DURATION_MS;
        }
        let ms = (f64::from(delta) / f64::from(speed) * 1000.0).round() as u16;
        ms.saturating_add(SC_DURATION_FUDGE_MS).max(SC_MIN_DURATION_MS)
    }
}

impl ServoAdapter for ScAdapter {
    fn kind(&self) -> ProtocolKind {
        ProtocolKind::Sc
    }

    fn profile(&self) -> ProtocolProfile {
        self.profile
    }

    fn read_position(&self, bus: &mut dyn BusTransport, id: u8) -> Result<u16, BusError> {
        read_word(bus, ProtocolKind::Sc, id, sc::PRESENT_POSITION)
    }

    fn read_speed(&self, bus: &mut dyn BusTransport, id: u8) -> Result<i16, BusError> {
        read_word(bus, ProtocolKind::Sc, id, sc::PRESENT_SPEED).map(decode_speed)
    }

    fn read_moving(&self, bus: &mut dyn BusTransport, id: u8) -> Result<bool, BusError> {
        read_byte_reg(bus, id, sc::MOVING).map(|v| v != 0)
    }

    fn write_goal(
        &self,
        bus: &mut dyn BusTransport,
        id: u8,
        count: u16,
        speed: u16,
        _acc: u8,
    ) -> Result<(), BusError> {
        // 时长需要 Δcount；读不到当前位置时保守地按半行程计
        let delta = match self.read_position(bus, id) {
            Ok(current) => current.abs_diff(count),
            Err(_) => self.profile.resolution / 2,
        };
        let duration = self.duration_ms(delta, speed);
        debug!(id, count, speed, duration, "sc write goal");

        let mut data = [0u8; 6];
        data[0..2].copy_from_slice(&word_bytes(ProtocolKind::Sc, count));
        data[2..4].copy_from_slice(&word_bytes(ProtocolKind::Sc, duration));
        data[4..6].copy_from_slice(&word_bytes(ProtocolKind::Sc, speed));
        write_reg(bus, id, sc::GOAL_POSITION, &data)
    }

    fn set_torque(&self, bus: &mut dyn BusTransport, id: u8, enabled: bool) -> Result<(), BusError> {
        write_reg(bus, id, sc::TORQUE_ENABLE, &[u8::from(enabled)])
    }

    fn read_diagnostics(&self, bus: &mut dyn BusTransport, id: u8) -> Vec<DiagnosticRegister> {
        vec![
            DiagnosticRegister {
                name: "torque_enable",
                value: read_byte_reg(bus, id, sc::TORQUE_ENABLE).map(u16::from),
            },
            DiagnosticRegister {
                name: "min_angle_limit",
                value: read_word(bus, ProtocolKind::Sc, id, sc::MIN_ANGLE_LIMIT),
            },
            DiagnosticRegister {
                name: "max_angle_limit",
                value: read_word(bus, ProtocolKind::Sc, id, sc::MAX_ANGLE_LIMIT),
            },
            DiagnosticRegister {
                name: "present_position",
                value: read_word(bus, ProtocolKind::Sc, id, sc::PRESENT_POSITION),
            },
            DiagnosticRegister {
                name: "present_speed",
                value: read_word(bus, ProtocolKind::Sc, id, sc::PRESENT_SPEED),
            },
            DiagnosticRegister {
                name: "moving",
                value: read_byte_reg(bus, id, sc::MOVING).map(u16::from),
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
        write_reg(bus, id, sc::LOCK, &[value])
    }
}
