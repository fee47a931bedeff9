//! 跨线程共享的总线句柄
//!
//! 把一条总线放进 `Arc<Mutex<_>>`，每个方法调用短暂持锁完成一次事务。
//! 长流程（扫描、标定、台架配置）在事务之间不持锁，中断处理线程
//! 因此总能在事务间隙拿到总线做力矩关断收尾。

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{BusError, BusTransport};

/// 可克隆的总线句柄，所有克隆指向同一条底层总线
pub struct SharedBus<B: BusTransport> {
    inner: Arc<Mutex<B>>,
}

impl<B: BusTransport> SharedBus<B> {
    pub fn new(bus: B) -> Self {
        Self { inner: Arc::new(Mutex::new(bus)) }
    }
}

impl<B: BusTransport> Clone for SharedBus<B> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<B: BusTransport> BusTransport for SharedBus<B> {
    fn transaction(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError> {
        self.inner.lock().transaction(request)
    }

    fn write_only(&mut self, request: &[u8]) -> Result<(), BusError> {
        self.inner.lock().write_only(request)
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), BusError> {
        self.inner.lock().set_timeout(timeout)
    }

    fn close(&mut self) {
        self.inner.lock().close();
    }

    fn is_open(&self) -> bool {
        self.inner.lock().is_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, request_id, status_frame};
    use duck_protocol::{InstructionPacket, StatusPacket};

    #[test]
    fn test_shared_bus_delegates() {
        let mut bus = SharedBus::new(MockBus::new(|req| Ok(status_frame(request_id(req), 0, &[]))));
        let reply = bus.transaction(&InstructionPacket::ping(9).to_bytes()).unwrap();
        assert_eq!(StatusPacket::parse(&reply).unwrap().id, 9);
    }

    /// 中断路径：另一个克隆广播写 + 关总线后，原句柄看到总线已关
    #[test]
    fn test_close_from_clone_is_visible() {
        let mock = MockBus::silent();
        let log = mock.sent_log();
        let mut bus = SharedBus::new(mock);
        let mut interrupt_handle = bus.clone();

        interrupt_handle.write_only(&[0xFF, 0xFF, 0xFE, 0x04, 0x03, 0x28, 0x00, 0xD2]).unwrap();
        interrupt_handle.close();

        assert!(!bus.is_open());
        assert!(matches!(bus.transaction(&[0xFF]), Err(BusError::Closed)));
        assert_eq!(log.lock().len(), 1);
    }
}
