//! 寄存器地址表
//!
//! 两个家族的控制表布局不同，按家族分模块。地址来自固件手册，
//! 与原厂 SDK 保持一致。

/// SC 家族（SCSCL）控制表
pub mod sc {
    pub const ID: u8 = 0x05;
    pub const MIN_ANGLE_LIMIT: u8 = 0x09;
    pub const MAX_ANGLE_LIMIT: u8 = 0x0B;
    pub const TORQUE_ENABLE: u8 = 0x28;
    pub const GOAL_POSITION: u8 = 0x2A;
    /// 运动时长（ms），SC 家族用时长而不是加速度参数
    pub const GOAL_TIME: u8 = 0x2C;
    pub const GOAL_SPEED: u8 = 0x2E;
    pub const LOCK: u8 = 0x30;
    pub const PRESENT_POSITION: u8 = 0x38;
    pub const PRESENT_SPEED: u8 = 0x3A;
    pub const MOVING: u8 = 0x42;
}

/// ST/SMS 家族（STS）控制表
pub mod st {
    pub const ID: u8 = 0x05;
    pub const MIN_ANGLE_LIMIT: u8 = 0x09;
    pub const MAX_ANGLE_LIMIT: u8 = 0x0B;
    pub const TORQUE_ENABLE: u8 = 0x28;
    /// 加速度寄存器紧邻目标位置之前，WritePosEx 一次写入
    /// acc + position + time + speed 共 7 字节
    pub const GOAL_ACC: u8 = 0x29;
    pub const GOAL_POSITION: u8 = 0x2A;
    pub const GOAL_TIME: u8 = 0x2C;
    pub const GOAL_SPEED: u8 = 0x2E;
    pub const LOCK: u8 = 0x37;
    pub const PRESENT_POSITION: u8 = 0x38;
    pub const PRESENT_SPEED: u8 = 0x3A;
    pub const MOVING: u8 = 0x42;
}

/// EPROM 解锁 / 上锁时写入 LOCK 寄存器的值
pub const EPROM_UNLOCK: u8 = 0;
pub const EPROM_LOCK: u8 = 1;
