//! 驱动层错误类型定义
//!
//! 传播策略：传输/配置错误立即中止（后续什么都做不了）；
//! 单舵机通信错误从不挂掉跨关节的批量操作，只降级该关节并继续。
//! 面向用户的失败永远带上关节名和舵机 ID。

use duck_bus::BusError;
use thiserror::Error;

use crate::config::ConfigError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 端口打开 / 波特率设置失败（启动期致命）
    #[error("Serial transport unavailable: {0}")]
    TransportUnavailable(#[source] BusError),

    /// 配置缺失或非法（在任何硬件访问之前浮出）
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 单个关节的一次总线事务失败
    #[error("Communication with joint '{joint}' (servo {servo_id}) failed: {source}")]
    Comm {
        joint: String,
        servo_id: u8,
        #[source]
        source: BusError,
    },

    /// 批量读取失败（全有或全无：任一关节读不到，整个调用失败）
    #[error("Reading joint '{joint}' (servo {servo_id}) failed after {attempts} attempts: {source}")]
    ReadFailed {
        joint: String,
        servo_id: u8,
        attempts: u32,
        #[source]
        source: BusError,
    },

    /// 按名访问的单关节操作遇到未配置的关节名
    #[error("Unknown joint name: '{0}'")]
    UnknownJoint(String),

    /// HWI 会话已关闭
    #[error("Hardware interface already closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_failed_names_joint_and_servo() {
        let err = DriverError::ReadFailed {
            joint: "left_knee".to_string(),
            servo_id: 23,
            attempts: 3,
            source: BusError::Timeout,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("left_knee"));
        assert!(msg.contains("23"));
        assert!(msg.contains("3 attempts"));
    }
}
