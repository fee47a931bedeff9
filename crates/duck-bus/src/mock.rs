//! 测试用 Mock 总线
//!
//! 用一个可编程的应答函数模拟总线另一端的舵机，并记录发出的
//! 每一个请求帧供断言。无任何硬件依赖。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use duck_protocol::packet::checksum;

use crate::{BusError, BusTransport};

/// 应答函数：输入请求帧，输出应答帧或失败
pub type Responder = Box<dyn FnMut(&[u8]) -> Result<Vec<u8>, BusError> + Send>;

/// 可编程 Mock 总线
pub struct MockBus {
    responder: Responder,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    open: bool,
}

impl MockBus {
    pub fn new(responder: impl FnMut(&[u8]) -> Result<Vec<u8>, BusError> + Send + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            sent: Arc::new(Mutex::new(Vec::new())),
            open: true,
        }
    }

    /// 所有请求都超时的总线（模拟空总线 / 全部舵机缺席）
    pub fn silent() -> Self {
        Self::new(|_| Err(BusError::Timeout))
    }

    /// 发送日志的共享句柄（总线交给上层后测试仍可断言）
    pub fn sent_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }
}

impl BusTransport for MockBus {
    fn transaction(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        self.sent.lock().push(request.to_vec());
        (self.responder)(request)
    }

    fn write_only(&mut self, request: &[u8]) -> Result<(), BusError> {
        if !self.open {
            return Err(BusError::Closed);
        }
        self.sent.lock().push(request.to_vec());
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<(), BusError> {
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// 构造一个合法的状态帧（测试辅助）
pub fn status_frame(id: u8, error: u8, params: &[u8]) -> Vec<u8> {
    let len = (params.len() + 2) as u8;
    let mut body = vec![id, len, error];
    body.extend_from_slice(params);
    let mut frame = vec![0xFF, 0xFF];
    frame.extend_from_slice(&body);
    frame.push(checksum(&body));
    frame
}

/// 从请求帧里取出目标舵机 ID（测试辅助）
pub fn request_id(request: &[u8]) -> u8 {
    request[2]
}

/// 从请求帧里取出指令码（测试辅助）
pub fn request_instruction(request: &[u8]) -> u8 {
    request[4]
}

/// 从读/写请求帧里取出寄存器地址（测试辅助）
pub fn request_addr(request: &[u8]) -> u8 {
    request[5]
}

#[cfg(test)]
mod tests {
    use super::*;
    use duck_protocol::{InstructionPacket, StatusPacket};

    #[test]
    fn test_status_frame_parses() {
        let frame = status_frame(7, 0, &[0x00, 0x02]);
        let pkt = StatusPacket::parse(&frame).unwrap();
        assert_eq!(pkt.id, 7);
        assert_eq!(pkt.params, vec![0x00, 0x02]);
    }

    #[test]
    fn test_mock_records_and_responds() {
        let mut bus = MockBus::new(|req| Ok(status_frame(request_id(req), 0, &[])));
        let log = bus.sent_log();

        let req = InstructionPacket::ping(3).to_bytes();
        let reply = bus.transaction(&req).unwrap();
        let pkt = StatusPacket::parse(&reply).unwrap();
        assert_eq!(pkt.id, 3);
        assert_eq!(log.lock().len(), 1);
        assert_eq!(request_instruction(&log.lock()[0]), 0x01);
    }

    #[test]
    fn test_closed_bus_rejects() {
        let mut bus = MockBus::silent();
        bus.close();
        bus.close(); // 幂等
        assert!(matches!(bus.transaction(&[0xFF]), Err(BusError::Closed)));
    }
}
