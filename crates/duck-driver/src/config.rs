//! 配置加载与校验
//!
//! `duck_config.json` 由构建机器人的人维护，驱动只读不写
//! （唯一的例外是标定合并步骤，见 `duck-client`）。
//!
//! 安全相关字段（`protocol`、`joint_map`）缺失是致命错误，
//! 必须在任何硬件访问之前报出，绝不静默代入默认值。

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use duck_protocol::{ProtocolError, ProtocolKind, ProtocolProfile};

/// 写目标位置时的默认速度（原始速度单位）
pub const DEFAULT_SPEED: u16 = 500;
/// 写目标位置时的默认加速度（ST 家族）
pub const DEFAULT_ACC: u8 = 30;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// 必填字段缺失（致命，不代默认值）
    #[error("Missing required config field: '{0}'")]
    MissingField(&'static str),

    /// 一个舵机 ID 只允许属于一个关节
    #[error("Servo id {id} is mapped to both '{first}' and '{second}'")]
    DuplicateServoId { id: u8, first: String, second: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// 一个关节的静态描述
#[derive(Debug, Clone, PartialEq)]
pub struct JointSpec {
    /// 逻辑关节名（唯一键）
    pub name: String,
    /// 物理舵机 ID（总线内唯一，随机器人整个生命周期稳定）
    pub servo_id: u8,
    /// 初始姿态（弧度）
    pub home_position: f64,
    /// 标定偏移（弧度）：关节空间 0 弧度对应的机械中立位修正
    pub calibration_offset: f64,
}

/// 反序列化用的原始形态：所有字段先按可缺失处理，再显式校验
#[derive(Debug, Deserialize)]
struct RawDuckConfig {
    protocol: Option<String>,
    joint_map: Option<BTreeMap<String, u8>>,
    #[serde(default)]
    init_pos: BTreeMap<String, f64>,
    #[serde(default)]
    calibration_offset: BTreeMap<String, f64>,
    counts_per_pi: Option<u16>,
    default_speed: Option<u16>,
    default_acc: Option<u8>,
}

/// 校验过的机器人配置
#[derive(Debug, Clone)]
pub struct DuckConfig {
    pub protocol: ProtocolKind,
    pub profile: ProtocolProfile,
    /// 按关节名排序的关节表
    pub joints: Vec<JointSpec>,
    pub default_speed: u16,
    pub default_acc: u8,
}

impl DuckConfig {
    /// 从 `duck_config.json` 加载并校验
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text, &path.display().to_string())
    }

    /// 从 JSON 文本解析并校验（`path` 仅用于报错）
    pub fn from_json_str(text: &str, path: &str) -> Result<Self, ConfigError> {
        let raw: RawDuckConfig =
            serde_json::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;
        raw.validate()
    }

    /// 按名查关节
    pub fn joint(&self, name: &str) -> Option<&JointSpec> {
        self.joints.iter().find(|j| j.name == name)
    }

    /// 覆盖协议家族（台架命令行用），profile 重置为该家族默认
    pub fn override_protocol(&mut self, name: &str) -> Result<(), ConfigError> {
        let protocol = ProtocolKind::parse(name)?;
        self.protocol = protocol;
        self.profile = protocol.profile();
        Ok(())
    }
}

impl RawDuckConfig {
    fn validate(self) -> Result<DuckConfig, ConfigError> {
        let protocol_str = self.protocol.ok_or(ConfigError::MissingField("protocol"))?;
        let protocol = ProtocolKind::parse(&protocol_str)?;

        let joint_map = self.joint_map.ok_or(ConfigError::MissingField("joint_map"))?;

        // servo_id 必须唯一：同一个舵机不能被两个关节引用
        let mut seen: BTreeMap<u8, &String> = BTreeMap::new();
        for (name, &id) in &joint_map {
            if let Some(first) = seen.insert(id, name) {
                return Err(ConfigError::DuplicateServoId {
                    id,
                    first: first.clone(),
                    second: name.clone(),
                });
            }
        }

        let profile = match self.counts_per_pi {
            Some(resolution) => ProtocolProfile::new(protocol, resolution),
            None => protocol.profile(),
        };

        // BTreeMap 迭代给出按名排序的稳定关节顺序
        let joints = joint_map
            .into_iter()
            .map(|(name, servo_id)| JointSpec {
                home_position: self.init_pos.get(&name).copied().unwrap_or(0.0),
                calibration_offset: self.calibration_offset.get(&name).copied().unwrap_or(0.0),
                name,
                servo_id,
            })
            .collect();

        Ok(DuckConfig {
            protocol,
            profile,
            joints,
            default_speed: self.default_speed.unwrap_or(DEFAULT_SPEED),
            default_acc: self.default_acc.unwrap_or(DEFAULT_ACC),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "protocol": "sc",
        "joint_map": {"left_knee": 23, "right_knee": 13},
        "init_pos": {"left_knee": 1.368},
        "calibration_offset": {"left_knee": 0.05}
    }"#;

    #[test]
    fn test_minimal_config() {
        let cfg = DuckConfig::from_json_str(MINIMAL, "test").unwrap();
        assert_eq!(cfg.protocol, ProtocolKind::Sc);
        assert_eq!(cfg.profile.resolution, 1024);
        assert_eq!(cfg.joints.len(), 2);

        let knee = cfg.joint("left_knee").unwrap();
        assert_eq!(knee.servo_id, 23);
        assert_eq!(knee.home_position, 1.368);
        assert_eq!(knee.calibration_offset, 0.05);

        // 未出现在 init_pos / calibration_offset 里的关节取 0
        let right = cfg.joint("right_knee").unwrap();
        assert_eq!(right.home_position, 0.0);
        assert_eq!(right.calibration_offset, 0.0);
    }

    #[test]
    fn test_missing_protocol_is_fatal() {
        let err = DuckConfig::from_json_str(r#"{"joint_map": {}}"#, "test").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("protocol")));
    }

    #[test]
    fn test_missing_joint_map_is_fatal() {
        let err = DuckConfig::from_json_str(r#"{"protocol": "st"}"#, "test").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("joint_map")));
    }

    #[test]
    fn test_duplicate_servo_id_rejected() {
        let text = r#"{
            "protocol": "st",
            "joint_map": {"a": 7, "b": 7}
        }"#;
        let err = DuckConfig::from_json_str(text, "test").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateServoId { id: 7, .. }));
    }

    #[test]
    fn test_counts_per_pi_override() {
        let text = r#"{
            "protocol": "st",
            "joint_map": {"a": 1},
            "counts_per_pi": 4096
        }"#;
        let cfg = DuckConfig::from_json_str(text, "test").unwrap();
        assert_eq!(cfg.profile.resolution, 4096);
        assert_eq!(cfg.profile.center_count(), 2048);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("duck_config.json");
        std::fs::write(&path, MINIMAL).unwrap();
        let cfg = DuckConfig::load(&path).unwrap();
        assert_eq!(cfg.joints.len(), 2);

        let err = DuckConfig::load(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_legacy_protocol_selectors() {
        let text = r#"{"protocol": "sms_sts", "joint_map": {"a": 1}}"#;
        let cfg = DuckConfig::from_json_str(text, "test").unwrap();
        assert_eq!(cfg.protocol, ProtocolKind::St);
        assert_eq!(cfg.profile.resolution, 2048);
    }
}
