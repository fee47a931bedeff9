//! 标定流水线端到端测试（mock 总线，无硬件）
//!
//! 阶段 1 记录 + 阶段 2 合并走完整条链：适配器 → 总线 → 记录 →
//! 配置改写，模拟两个到位有残差的舵机和一个缺席的关节。

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use duck_bus::BusError;
use duck_bus::mock::{MockBus, request_addr, request_id, request_instruction, status_frame};
use duck_client::calibration::{self, CalibrationRecord, RecordOptions};
use duck_driver::{DuckConfig, adapter_for};
use duck_protocol::ProtocolKind;
use duck_protocol::packet::{INST_READ, word_to_bytes};
use duck_protocol::registers::st;

const CONFIG: &str = r#"{
    "protocol": "st",
    "joint_map": {"left_knee": 1, "right_knee": 2, "neck": 9},
    "calibration_offset": {"neck": 0.25}
}"#;

/// 两个舵机（ID 1、2），各带固定的到位残差；其余 ID 缺席
fn bench_bus() -> MockBus {
    let mut goals: BTreeMap<u8, u16> = BTreeMap::new();
    MockBus::new(move |req| {
        let id = request_id(req);
        let residual: i32 = match id {
            1 => 3,
            2 => -5,
            _ => return Err(BusError::Timeout),
        };
        if request_instruction(req) == INST_READ {
            let base = goals.get(&id).copied().unwrap_or(900);
            let pos = (i32::from(base) + residual) as u16;
            Ok(status_frame(id, 0, &word_to_bytes(ProtocolKind::St, pos)))
        } else {
            if request_addr(req) == st::GOAL_ACC {
                goals.insert(id, u16::from_le_bytes([req[7], req[8]]));
            }
            Ok(status_frame(id, 0, &[]))
        }
    })
}

fn write_config(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("duck_config.json");
    std::fs::write(&path, CONFIG).unwrap();
    path
}

#[test]
fn test_record_then_merge_updates_observed_joints_only() {
    let config = DuckConfig::from_json_str(CONFIG, "test").unwrap();
    let adapter = adapter_for(config.profile);
    let mut bus = bench_bus();

    let opts = RecordOptions {
        id_range: 1..=10,
        safe_speed: 500,
        safe_acc: 30,
        settle: Duration::ZERO,
    };
    let record = calibration::record(adapter.as_ref(), &mut bus, &opts);

    // 中位指令 1024，残差 +3 / -5
    assert_eq!(record.get(1), Some(1027));
    assert_eq!(record.get(2), Some(1019));
    assert_eq!(record.len(), 2);

    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(&dir);
    let report = calibration::merge_into_config(&config_path, &record).unwrap();

    assert_eq!(report.updated, vec!["left_knee".to_string(), "right_knee".to_string()]);
    assert_eq!(report.preserved, vec!["neck".to_string()]);
    assert!(report.backup_path.exists());

    // 合并后的配置仍然可加载，偏移等于观测读数对应的角度
    let merged = DuckConfig::load(&config_path).unwrap();
    let expected = config.profile.count_to_angle(1027);
    let knee = merged.joint("left_knee").unwrap();
    assert!((knee.calibration_offset - expected).abs() < 1e-9);
    // 记录里没有的关节保留手工维护的偏移
    assert_eq!(merged.joint("neck").unwrap().calibration_offset, 0.25);
}

#[test]
fn test_record_round_trips_through_json_artifact() {
    let config = DuckConfig::from_json_str(CONFIG, "test").unwrap();
    let adapter = adapter_for(config.profile);
    let mut bus = bench_bus();

    let opts = RecordOptions {
        id_range: 1..=5,
        safe_speed: 500,
        safe_acc: 30,
        settle: Duration::ZERO,
    };
    let record = calibration::record(adapter.as_ref(), &mut bus, &opts);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offsets.json");
    record.save(&path).unwrap();
    let loaded = CalibrationRecord::load(&path).unwrap();
    assert_eq!(loaded.get(1), record.get(1));
    assert_eq!(loaded.len(), record.len());
}
