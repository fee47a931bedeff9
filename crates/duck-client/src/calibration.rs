//! 两阶段标定流水线
//!
//! 阶段 1（记录）把每个在位舵机开到协议中位并读回实际计数；
//! 阶段 2（合并）把这些读数换算成弧度偏移写进配置。两个阶段
//! 显式分开：阶段 1 之后需要人工断电、在机械中立位装舵盘，
//! 阶段 2 才可信。
//!
//! 核心不变式：标定绝不把未经确认的数据套到它没有实际观测过的
//! 关节上。记录里缺席的关节保留原有偏移，原配置先备份再改写。

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use duck_bus::BusTransport;
use duck_driver::adapter::ServoAdapter;
use duck_driver::config::DuckConfig;

use crate::ClientError;

/// 一次标定运行的观测结果：舵机 ID → 读到的原始计数
///
/// JSON 形态是 `{"21": 512, ...}`（对象键总是字符串，数字键
/// 由 serde 在解析时还原），与旧脚本产出的工件互相兼容。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationRecord {
    entries: BTreeMap<u8, u16>,
}

impl CalibrationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, servo_id: u8, count: u16) {
        self.entries.insert(servo_id, count);
    }

    pub fn get(&self, servo_id: u8) -> Option<u16> {
        self.entries.get(&servo_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, u16)> + '_ {
        self.entries.iter().map(|(&id, &count)| (id, count))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ClientError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClientError> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self).expect("record serialization is infallible");
        std::fs::write(path, text).map_err(|source| ClientError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// 阶段 1 的运行参数
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// 扫描的 ID 范围
    pub id_range: std::ops::RangeInclusive<u8>,
    /// 开到中位后的安全速度 / 加速度
    pub safe_speed: u16,
    pub safe_acc: u8,
    /// 写入后等舵机到位的固定时间
    pub settle: Duration,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            id_range: 1..=50,
            safe_speed: 500,
            safe_acc: 30,
            settle: Duration::from_millis(800),
        }
    }
}

/// 阶段 1：发现在位舵机，逐个开到中位并记录读回的计数
///
/// 单个 ID 的写或读失败只记日志并把该 ID 略去，不做全局中止。
/// 标定直接在适配器层工作，与 HWI 会话无关（不需要关节表）。
pub fn record(
    adapter: &dyn ServoAdapter,
    bus: &mut dyn BusTransport,
    opts: &RecordOptions,
) -> CalibrationRecord {
    let center = adapter.profile().center_count();

    let mut present = Vec::new();
    for id in opts.id_range.clone() {
        if adapter.read_position(bus, id).is_ok() {
            present.push(id);
        }
    }
    info!(found = present.len(), "bus scan complete");

    let mut record = CalibrationRecord::new();
    for id in present {
        if let Err(e) = adapter.write_goal(bus, id, center, opts.safe_speed, opts.safe_acc) {
            warn!(servo_id = id, error = %e, "center write failed, omitting from record");
            continue;
        }
        spin_sleep::sleep(opts.settle);
        match adapter.read_position(bus, id) {
            Ok(count) => {
                info!(servo_id = id, count, "observed center");
                record.insert(id, count);
            }
            Err(e) => warn!(servo_id = id, error = %e, "readback failed, omitting from record"),
        }
    }
    record
}

/// 阶段 2 的结果
#[derive(Debug)]
pub struct MergeReport {
    /// 偏移被改写的关节
    pub updated: Vec<String>,
    /// 记录里没出现、保留原值的关节
    pub preserved: Vec<String>,
    pub backup_path: PathBuf,
}

/// 阶段 2：把记录合并进 `duck_config.json`
///
/// 原配置先写一份后缀备份再改动。只有 `servo_id` 出现在记录里的
/// 关节才会得到新的 `calibration_offset`；其余关节原样保留
/// （标定不完整按关节级处理，不是致命错误）。合并是幂等的。
pub fn merge_into_config(
    config_path: impl AsRef<Path>,
    record: &CalibrationRecord,
) -> Result<MergeReport, ClientError> {
    let config_path = config_path.as_ref();
    let text = std::fs::read_to_string(config_path).map_err(|source| ClientError::Io {
        path: config_path.display().to_string(),
        source,
    })?;

    // 完整校验一遍：拿协议档案和关节表，也顺带在改文件前把配置
    // 错误暴露出来
    let config = DuckConfig::from_json_str(&text, &config_path.display().to_string())
        .map_err(duck_driver::DriverError::Config)?;

    // 非破坏性备份（后缀标记副本）
    let backup_path = backup_path_for(config_path);
    std::fs::write(&backup_path, &text).map_err(|source| ClientError::Io {
        path: backup_path.display().to_string(),
        source,
    })?;

    let mut doc: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| ClientError::Parse {
            path: config_path.display().to_string(),
            source,
        })?;

    let mut updated = Vec::new();
    let mut preserved = Vec::new();
    {
        let root = doc
            .as_object_mut()
            .expect("validated config is a JSON object");
        let slot = root
            .entry("calibration_offset")
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if !slot.is_object() {
            // 旧配置里的脏数据，整块换掉
            *slot = serde_json::Value::Object(Default::default());
        }
        let offsets = slot.as_object_mut().expect("just ensured object");

        for joint in &config.joints {
            match record.get(joint.servo_id) {
                Some(count) => {
                    let offset = config.profile.count_to_angle(count);
                    offsets.insert(joint.name.clone(), serde_json::json!(offset));
                    updated.push(joint.name.clone());
                }
                None => {
                    info!(joint = %joint.name, servo_id = joint.servo_id,
                        "absent from calibration record, keeping previous offset");
                    preserved.push(joint.name.clone());
                }
            }
        }
    }

    let out = serde_json::to_string_pretty(&doc).expect("config serialization is infallible");
    std::fs::write(config_path, out).map_err(|source| ClientError::Io {
        path: config_path.display().to_string(),
        source,
    })?;

    info!(
        updated = updated.len(),
        preserved = preserved.len(),
        backup = %backup_path.display(),
        "calibration merged"
    );
    Ok(MergeReport { updated, preserved, backup_path })
}

fn backup_path_for(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".bak");
    PathBuf::from(os)
}
