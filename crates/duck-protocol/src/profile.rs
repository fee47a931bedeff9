//! 协议档案与单位转换
//!
//! 两个家族都把 ±π 弧度映射到以中位值为中心的整个可寻址计数范围：
//! `count = round(rad / π * half_resolution) + center`，反向为精确逆运算。
//! 超出范围的输入做钳位而不是报错，机械安全余量由调用方负责。

use std::f64::consts::PI;

use crate::ProtocolError;

/// 协议家族选择器
///
/// 在打开总线时根据配置选择一次，之后不再做逐调用探测。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolKind {
    /// SC 家族（SCSCL，1024 计数 / 全行程）
    Sc,
    /// ST/SMS 家族（STS，2048 计数 / 全行程）
    St,
}

impl ProtocolKind {
    /// 从配置字符串解析（`"sc"` / `"st"`，兼容原始配置里的
    /// `"scscl"` / `"sms_sts"` 写法）
    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        match s {
            "sc" | "scscl" => Ok(Self::Sc),
            "st" | "sms_sts" | "sts" => Ok(Self::St),
            other => Err(ProtocolError::UnknownProtocol(other.to_string())),
        }
    }

    /// 该家族的默认档案
    pub fn profile(self) -> ProtocolProfile {
        match self {
            Self::Sc => ProtocolProfile::new(self, 1024),
            Self::St => ProtocolProfile::new(self, 2048),
        }
    }

    /// 16 位寄存器是否高位在前（SC 家族的固件怪癖）
    pub fn word_big_endian(self) -> bool {
        matches!(self, Self::Sc)
    }
}

/// 协议档案：分辨率与中位值
///
/// 不变式：`center_count` 在未应用标定偏移前恒映射到 0 弧度。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolProfile {
    pub kind: ProtocolKind,
    /// 全行程计数数（1024 或 2048）
    pub resolution: u16,
}

impl ProtocolProfile {
    pub fn new(kind: ProtocolKind, resolution: u16) -> Self {
        Self { kind, resolution }
    }

    /// 中位值计数（= resolution / 2，映射 0 弧度）
    pub fn center_count(&self) -> u16 {
        self.resolution / 2
    }

    fn half_resolution(&self) -> f64 {
        f64::from(self.resolution) / 2.0
    }

    /// 弧度 → 舵机计数
    ///
    /// 超出可表示范围的输入被钳位到 `[0, resolution - 1]`，永不失败。
    pub fn angle_to_count(&self, rad: f64) -> u16 {
        let raw = (rad / PI * self.half_resolution()).round() + f64::from(self.center_count());
        let max = f64::from(self.resolution - 1);
        raw.clamp(0.0, max) as u16
    }

    /// 舵机计数 → 弧度（`angle_to_count` 的精确逆运算）
    pub fn count_to_angle(&self, count: u16) -> f64 {
        (f64::from(count) - f64::from(self.center_count())) / self.half_resolution() * PI
    }

    /// 单个计数对应的角度（弧度），即转换往返的最大误差
    pub fn angle_per_count(&self) -> f64 {
        PI / self.half_resolution()
    }

    /// 原始速度单位 → rad/s 的近似换算系数
    ///
    /// 固件不提供标定过的速度单位；这里按"每秒一个位置计数"近似，
    /// 是待实测的标定常数而非物理定律。
    pub fn speed_unit_rad_s(&self) -> f64 {
        self.angle_per_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_selectors() {
        assert_eq!(ProtocolKind::parse("sc").unwrap(), ProtocolKind::Sc);
        assert_eq!(ProtocolKind::parse("scscl").unwrap(), ProtocolKind::Sc);
        assert_eq!(ProtocolKind::parse("st").unwrap(), ProtocolKind::St);
        assert_eq!(ProtocolKind::parse("sms_sts").unwrap(), ProtocolKind::St);
        assert!(ProtocolKind::parse("dynamixel").is_err());
    }

    #[test]
    fn test_center_maps_to_zero() {
        for kind in [ProtocolKind::Sc, ProtocolKind::St] {
            let p = kind.profile();
            assert_eq!(p.angle_to_count(0.0), p.center_count());
            assert_eq!(p.count_to_angle(p.center_count()), 0.0);
        }
    }

    /// 固定算例：SC、1024 分辨率，1.368 rad → 735 计数
    #[test]
    fn test_sc_worked_example() {
        let p = ProtocolKind::Sc.profile();
        assert_eq!(p.angle_to_count(1.368), 735);
        let back = p.count_to_angle(735);
        assert!((back - 1.368).abs() <= p.angle_per_count());
    }

    #[test]
    fn test_clamping_far_out_of_range() {
        let p = ProtocolKind::Sc.profile();
        assert_eq!(p.angle_to_count(100.0), 1023);
        assert_eq!(p.angle_to_count(-100.0), 0);
        let st = ProtocolKind::St.profile();
        assert_eq!(st.angle_to_count(1e9), 2047);
    }

    proptest! {
        /// 往返误差不超过一个计数对应的角度
        #[test]
        fn prop_roundtrip_within_one_count(rad in -3.0f64..3.0) {
            for kind in [ProtocolKind::Sc, ProtocolKind::St] {
                let p = kind.profile();
                let count = p.angle_to_count(rad);
                let back = p.count_to_angle(count);
                prop_assert!((back - rad).abs() <= p.angle_per_count());
            }
        }

        /// angle_to_count 单调不减，且永远落在 [0, resolution-1]
        #[test]
        fn prop_monotonic_and_bounded(a in -10.0f64..10.0, b in -10.0f64..10.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            for kind in [ProtocolKind::Sc, ProtocolKind::St] {
                let p = kind.profile();
                let ca = p.angle_to_count(lo);
                let cb = p.angle_to_count(hi);
                prop_assert!(ca <= cb);
                prop_assert!(cb < p.resolution);
            }
        }
    }
}
