//! # Duck Client
//!
//! 驱动之上、策略之下的运维层：
//!
//! - `calibration`: 两阶段标定流水线（记录中位读数 → 合并进配置）
//! - `check`: 上电前的诊断/运动测试状态机（操作员监督）
//! - `imu`: 姿态传感器后台轮询（单槽最新值，消费端永不阻塞）
//! - `shutdown`: 任何退出路径上的尽力而为力矩关断
//!
//! 控制策略在这些全部通过之前不该碰硬件。

pub mod calibration;
pub mod check;
pub mod imu;
pub mod shutdown;

use thiserror::Error;

pub use calibration::{CalibrationRecord, MergeReport, RecordOptions};
pub use check::{
    CheckOutcome, CheckReport, DiagnosticMachine, MovementOutcome, Operator, ServoHealth,
    TestDecision,
};
pub use imu::{ImuFrame, ImuPoller, ImuSource, LatestImu};

/// 运维层错误类型
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Driver(#[from] duck_driver::DriverError),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IMU stream error: {0}")]
    Imu(String),
}
