//! `serialport` 后端
//!
//! 读取策略：逐块读入接收缓冲，扫描帧头并按声明长度判断帧完整。
//! 总线是回显型半双工，发送后缓冲里可能先出现自己的回波，
//! 帧头扫描由协议层解析时负责跳过。

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::{BusError, BusTransport};

/// 默认单次应答读超时
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10);

/// 基于 `serialport` 的真实总线
pub struct SerialBus {
    port: Option<Box<dyn serialport::SerialPort>>,
    port_name: String,
    timeout: Duration,
}

impl SerialBus {
    /// 打开端口并设置波特率，任一步失败立刻报错
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, BusError> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(DEFAULT_TIMEOUT)
            .open()
            .map_err(|e| BusError::Open {
                port: port_name.to_string(),
                message: e.to_string(),
            })?;

        debug!(port = port_name, baud_rate, "serial port opened");

        Ok(Self {
            port: Some(port),
            port_name: port_name.to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, BusError> {
        self.port.as_mut().ok_or(BusError::Closed)
    }

    /// 读满一个状态帧：帧头 + 长度字节决定总长
    fn read_frame(&mut self) -> Result<Vec<u8>, BusError> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = Vec::with_capacity(16);
        let mut chunk = [0u8; 32];

        loop {
            if let Some(total) = frame_total_len(&buf) {
                if buf.len() >= total {
                    trace!(bytes = buf.len(), "frame complete");
                    return Ok(buf);
                }
            }
            if Instant::now() >= deadline {
                return Err(BusError::Timeout);
            }

            let port = self.port_mut()?;
            match port.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    return Err(BusError::Timeout);
                }
                Err(e) => return Err(BusError::Io(e)),
            }
        }
    }
}

/// 从已收字节推断完整帧所需的总长（含帧头前的垃圾字节）
fn frame_total_len(buf: &[u8]) -> Option<usize> {
    let start = buf.windows(2).position(|w| w == [0xFF, 0xFF])?;
    let len = *buf.get(start + 3)? as usize;
    Some(start + 4 + len)
}

impl BusTransport for SerialBus {
    fn transaction(&mut self, request: &[u8]) -> Result<Vec<u8>, BusError> {
        let port = self.port_mut()?;
        // 清掉上一事务可能残留的字节，当前事务的应答才对得上号
        let _ = port.clear(serialport::ClearBuffer::Input);
        port.write_all(request)?;
        port.flush()?;
        self.read_frame()
    }

    fn write_only(&mut self, request: &[u8]) -> Result<(), BusError> {
        let port = self.port_mut()?;
        port.write_all(request)?;
        port.flush()?;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), BusError> {
        self.timeout = timeout;
        let port = self.port_mut()?;
        port.set_timeout(timeout).map_err(|e| BusError::Open {
            port: self.port_name.clone(),
            message: e.to_string(),
        })
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!(port = %self.port_name, "serial port closed");
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialBus {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_total_len() {
        // 垃圾 2 字节 + ping 应答（LEN=2）→ 总长 2 + 4 + 2
        let buf = [0x00, 0x17, 0xFF, 0xFF, 0x01, 0x02, 0x00, 0xFC];
        assert_eq!(frame_total_len(&buf), Some(8));
        // 帧头未到
        assert_eq!(frame_total_len(&[0x00, 0xFF]), None);
        // 帧头到了但长度字节未到
        assert_eq!(frame_total_len(&[0xFF, 0xFF, 0x01]), None);
    }
}
