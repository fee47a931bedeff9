//! 命令定义和实现

pub mod calibrate;
pub mod check;
pub mod configure;
pub mod imu;
pub mod merge;
pub mod scan;

pub use calibrate::CalibrateCommand;
pub use check::CheckCommand;
pub use configure::ConfigureCommand;
pub use imu::ImuCommand;
pub use merge::MergeCommand;
pub use scan::ScanCommand;
