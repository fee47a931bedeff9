//! # Duck Driver
//!
//! 本模块提供 duck 机器人的关节空间硬件接口，包括：
//! - 协议适配器（SC / ST 两个家族，打开时选定一次）
//! - 统一 HWI（按关节名读写位置/速度、力矩开关、总线扫描）
//! - 配置加载与校验（`duck_config.json`）
//!
//! # 分层
//!
//! ```text
//! duck-client (标定 / 诊断状态机)
//!     ↓
//! duck-driver (此 crate: ServoAdapter + Hwi + DuckConfig)
//!     ↓
//! duck-bus (串口事务)
//!     ↓
//! duck-protocol (帧编解码)
//! ```

pub mod adapter;
pub mod config;
mod error;
mod hwi;

pub use adapter::{DiagnosticRegister, ScAdapter, ServoAdapter, StAdapter, adapter_for};
pub use config::{ConfigError, DuckConfig, JointSpec};
pub use error::DriverError;
pub use hwi::Hwi;
