//! 指令包构建 / 状态包解析
//!
//! 帧格式（两个家族相同，仅 16 位数值的字节序不同）：
//!
//! ```text
//! 指令包: FF FF | ID | LEN | INST | PARAM... | CHKSUM
//! 状态包: FF FF | ID | LEN | ERR  | PARAM... | CHKSUM
//! ```
//!
//! `LEN` = 参数字节数 + 2；`CHKSUM` = `!(ID + LEN + INST + ΣPARAM) & 0xFF`。

use crate::ProtocolError;
use crate::profile::ProtocolKind;

pub const HEADER: [u8; 2] = [0xFF, 0xFF];

/// 广播 ID（所有舵机应答被抑制）
pub const BROADCAST_ID: u8 = 0xFE;

pub const INST_PING: u8 = 0x01;
pub const INST_READ: u8 = 0x02;
pub const INST_WRITE: u8 = 0x03;

/// 帧校验和：ID 起到参数末尾所有字节求和取反
pub fn checksum(body: &[u8]) -> u8 {
    let sum: u32 = body.iter().map(|&b| u32::from(b)).sum();
    !(sum as u8)
}

/// 发往舵机的指令包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionPacket {
    pub id: u8,
    pub instruction: u8,
    pub params: Vec<u8>,
}

impl InstructionPacket {
    pub fn ping(id: u8) -> Self {
        Self { id, instruction: INST_PING, params: vec![] }
    }

    /// 从 `addr` 起读取 `len` 字节
    pub fn read(id: u8, addr: u8, len: u8) -> Self {
        Self { id, instruction: INST_READ, params: vec![addr, len] }
    }

    /// 从 `addr` 起写入 `data`
    pub fn write(id: u8, addr: u8, data: &[u8]) -> Self {
        let mut params = Vec::with_capacity(1 + data.len());
        params.push(addr);
        params.extend_from_slice(data);
        Self { id, instruction: INST_WRITE, params }
    }

    /// 序列化为线上字节
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = (self.params.len() + 2) as u8;
        let mut out = Vec::with_capacity(6 + self.params.len());
        out.extend_from_slice(&HEADER);
        out.push(self.id);
        out.push(len);
        out.push(self.instruction);
        out.extend_from_slice(&self.params);
        out.push(checksum(&out[2..]));
        out
    }
}

/// 舵机返回的状态包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusPacket {
    pub id: u8,
    /// 固件错误位（0 = 正常）
    pub error: u8,
    pub params: Vec<u8>,
}

impl StatusPacket {
    /// 从接收缓冲解析一个状态包
    ///
    /// 允许帧头前有垃圾字节（总线回波），从第一个 `FF FF` 开始解析。
    pub fn parse(buf: &[u8]) -> Result<Self, ProtocolError> {
        let start = buf
            .windows(2)
            .position(|w| w == HEADER)
            .ok_or(ProtocolError::MissingHeader)?;
        let frame = &buf[start..];
        if frame.len() < 6 {
            return Err(ProtocolError::TooShort { expected: 6, actual: frame.len() });
        }

        let id = frame[2];
        let len = frame[3] as usize;
        // LEN = ERR + PARAM... + CHKSUM，合法下限是 2（无参数状态包）。
        // 回波总线上的垃圾字节可能凑出 len 为 0/1 且校验和碰巧吻合的帧。
        if len < 2 {
            return Err(ProtocolError::LengthMismatch { declared: len, actual: frame.len() - 4 });
        }
        let total = 4 + len;
        if frame.len() < total {
            return Err(ProtocolError::LengthMismatch { declared: len, actual: frame.len() - 4 });
        }

        let body = &frame[2..total - 1];
        let expected = checksum(body);
        let actual = frame[total - 1];
        if expected != actual {
            return Err(ProtocolError::ChecksumMismatch { expected, actual });
        }

        Ok(Self {
            id,
            error: frame[4],
            params: frame[5..total - 1].to_vec(),
        })
    }

    /// 按家族字节序取第一个 16 位参数
    pub fn word(&self, kind: ProtocolKind) -> Option<u16> {
        self.word_at(kind, 0)
    }

    /// 按家族字节序取第 `offset` 字节起的 16 位参数
    pub fn word_at(&self, kind: ProtocolKind, offset: usize) -> Option<u16> {
        let bytes = self.params.get(offset..offset + 2)?;
        Some(word_from_bytes(kind, [bytes[0], bytes[1]]))
    }
}

/// 16 位数值 → 线上字节（SC 大端，ST 小端）
pub fn word_to_bytes(kind: ProtocolKind, value: u16) -> [u8; 2] {
    if kind.word_big_endian() {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    }
}

/// 线上字节 → 16 位数值
pub fn word_from_bytes(kind: ProtocolKind, bytes: [u8; 2]) -> u16 {
    if kind.word_big_endian() {
        u16::from_be_bytes(bytes)
    } else {
        u16::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 官方 SDK 文档里的 ping 算例：ID=1 → FF FF 01 02 01 FB
    #[test]
    fn test_ping_frame_bytes() {
        let bytes = InstructionPacket::ping(1).to_bytes();
        assert_eq!(bytes, vec![0xFF, 0xFF, 0x01, 0x02, 0x01, 0xFB]);
    }

    #[test]
    fn test_read_frame_bytes() {
        // 读 ID=1 present position（0x38 起 2 字节）
        let bytes = InstructionPacket::read(1, 0x38, 2).to_bytes();
        assert_eq!(bytes[..5], [0xFF, 0xFF, 0x01, 0x04, 0x02]);
        assert_eq!(bytes[5], 0x38);
        assert_eq!(bytes[6], 2);
        assert_eq!(bytes[7], checksum(&bytes[2..7]));
    }

    #[test]
    fn test_status_roundtrip() {
        // 手工构造一个状态包: ID=5, error=0, params=[0x02, 0x00]
        let body = [0x05u8, 0x04, 0x00, 0x02, 0x00];
        let mut frame = vec![0xFF, 0xFF];
        frame.extend_from_slice(&body);
        frame.push(checksum(&body));

        let pkt = StatusPacket::parse(&frame).unwrap();
        assert_eq!(pkt.id, 5);
        assert_eq!(pkt.error, 0);
        assert_eq!(pkt.params, vec![0x02, 0x00]);
        // ST 小端: 0x0002 = 2; SC 大端: 0x0200 = 512
        assert_eq!(pkt.word(ProtocolKind::St), Some(2));
        assert_eq!(pkt.word(ProtocolKind::Sc), Some(512));
    }

    #[test]
    fn test_parse_skips_leading_garbage() {
        let body = [0x01u8, 0x02, 0x00];
        let mut frame = vec![0x00, 0x17, 0xFF, 0xFF];
        frame.extend_from_slice(&body);
        frame.push(checksum(&body));
        let pkt = StatusPacket::parse(&frame).unwrap();
        assert_eq!(pkt.id, 1);
        assert!(pkt.params.is_empty());
    }

    #[test]
    fn test_parse_bad_checksum() {
        let body = [0x01u8, 0x02, 0x00];
        let mut frame = vec![0xFF, 0xFF];
        frame.extend_from_slice(&body);
        frame.push(checksum(&body) ^ 0xA5);
        assert!(matches!(
            StatusPacket::parse(&frame),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    /// 声明长度小于最小值（ERR+CHKSUM）的帧必须报 LengthMismatch 而不是越界。
    /// 两个向量的校验和都是碰巧吻合的，只有长度下限能拦住它们。
    #[test]
    fn test_parse_declared_len_below_minimum() {
        // len=0: FF FF FF 00 ..，body=[0xFF]，!(0xFF)=0x00 恰好等于下一字节
        assert!(matches!(
            StatusPacket::parse(&[0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00]),
            Err(ProtocolError::LengthMismatch { declared: 0, .. })
        ));
        // len=1: 校验和同样吻合
        assert!(matches!(
            StatusPacket::parse(&[0xFF, 0xFF, 0x03, 0x01, 0xFB, 0x00]),
            Err(ProtocolError::LengthMismatch { declared: 1, .. })
        ));
    }

    #[test]
    fn test_parse_no_header() {
        assert!(matches!(
            StatusPacket::parse(&[0x01, 0x02, 0x03]),
            Err(ProtocolError::MissingHeader)
        ));
    }

    #[test]
    fn test_word_endianness_per_family() {
        assert_eq!(word_to_bytes(ProtocolKind::Sc, 0x0102), [0x01, 0x02]);
        assert_eq!(word_to_bytes(ProtocolKind::St, 0x0102), [0x02, 0x01]);
        assert_eq!(word_from_bytes(ProtocolKind::Sc, [0x01, 0x02]), 0x0102);
        assert_eq!(word_from_bytes(ProtocolKind::St, [0x01, 0x02]), 0x0201);
    }
}
