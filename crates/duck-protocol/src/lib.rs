//! # Duck Protocol
//!
//! SC / ST 串行总线舵机协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `profile`: 协议档案（分辨率、中位值）与弧度↔计数转换
//! - `packet`: 指令包构建 / 状态包解析
//! - `registers`: 两个舵机家族各自的寄存器地址表
//!
//! ## 两个家族
//!
//! 总线上存在两种互不兼容的舵机协议：
//!
//! | 家族 | 分辨率 | 16 位寄存器字节序 |
//! |------|--------|-------------------|
//! | SC (SCSCL)    | 1024 | 高位在前（大端） |
//! | ST (SMS/STS)  | 2048 | 低位在前（小端） |
//!
//! 字节序差异是固件事实，不是设计选择，必须按家族保留。

pub mod packet;
pub mod profile;
pub mod registers;

pub use packet::{InstructionPacket, StatusPacket, checksum};
pub use profile::{ProtocolKind, ProtocolProfile};

use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    #[error("Missing packet header (0xFF 0xFF)")]
    MissingHeader,

    #[error("Checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Declared length {declared} does not match payload length {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("Unknown protocol selector: {0:?} (expected \"sc\" or \"st\")")]
    UnknownProtocol(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_protocol_display() {
        let err = ProtocolError::UnknownProtocol("dynamixel".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("dynamixel"));
        assert!(msg.contains("\"sc\""));
    }
}
