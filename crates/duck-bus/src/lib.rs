//! # Duck Bus
//!
//! 舵机总线传输抽象层。
//!
//! 总线是半双工 UART：一次只允许一个在途事务（请求/应答），
//! 串行化由持有 `BusTransport` 的上层负责。本层只承诺四件事：
//! 打开、设波特率、收发一个完整帧、关闭。

use std::time::Duration;

use thiserror::Error;

pub mod serial;
pub mod shared;

#[cfg(any(feature = "mock", test))]
pub mod mock;

pub use serial::SerialBus;
pub use shared::SharedBus;

#[cfg(any(feature = "mock", test))]
pub use mock::MockBus;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum BusError {
    /// 端口打开 / 波特率设置失败（启动期致命，不重试）
    #[error("Failed to open serial port {port}: {message}")]
    Open { port: String, message: String },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    /// 单次事务超时（舵机缺席时的常规信号，由调用方决定重试）
    #[error("Response timeout")]
    Timeout,

    /// 应答帧损坏（校验和 / 帧头）
    #[error("Corrupt response: {0}")]
    Corrupt(#[from] duck_protocol::ProtocolError),

    #[error("Transport already closed")]
    Closed,
}

impl BusError {
    /// 是否属于单事务级、可由调用方重试的失败
    pub fn is_comm(&self) -> bool {
        matches!(self, BusError::Timeout | BusError::Corrupt(_) | BusError::Io(_))
    }
}

/// 一条共享串行总线
///
/// 实现者承诺 `transaction` 是阻塞的单次请求/应答交换，
/// 除传输自身的读超时外不做任何截止时间逻辑。
pub trait BusTransport: Send {
    /// 发送一个指令帧并读回一个完整状态帧（原始字节）
    fn transaction(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError>;

    /// 只发送，不等待应答（广播写）
    fn write_only(&mut self, request: &[u8]) -> Result<(), BusError>;

    /// 设置单次读超时
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), BusError>;

    /// 释放底层端口。幂等：重复调用无副作用。
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comm_classification() {
        assert!(BusError::Timeout.is_comm());
        assert!(!BusError::Closed.is_comm());
        assert!(
            !BusError::Open {
                port: "/dev/ttyACM0".into(),
                message: "no such device".into()
            }
            .is_comm()
        );
    }
}
