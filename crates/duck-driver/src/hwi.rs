//! 统一硬件接口（HWI）
//!
//! 关节空间 API：按关节名读写位置/速度、力矩开关、总线扫描。
//! 一个会话独占一个已打开的传输句柄和一个选定的协议适配器；
//! 总线一次只允许一个在途事务，传输句柄放在互斥锁后面。
//!
//! # 批量语义
//!
//! - 写（`set_joint_positions`）：未知关节名静默跳过，单关节通信
//!   失败记日志后继续，其余关节不受影响。
//! - 读（`get_joint_positions` / `get_joint_velocities`）：全有或全无。
//!   控制环消费半新不旧的状态比收到一次明确的失败更糟。
//! - 力矩开关：尽力而为地扫过所有关节，单关节失败不会中断收尾。

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use duck_bus::{BusError, BusTransport, SerialBus};

use crate::adapter::{DiagnosticRegister, ServoAdapter, adapter_for};
use crate::config::{DuckConfig, JointSpec};
use crate::error::DriverError;

/// 批量读取时每个关节的读重试预算（首次 + 重试）
pub const READ_ATTEMPTS: u32 = 3;
/// 重试间隔
const RETRY_DELAY: Duration = Duration::from_millis(5);

/// 统一硬件接口会话
///
/// 所有方法都取 `&self`（传输在内部互斥锁后面），
/// 可以放进 `Arc` 交给中断处理线程做收尾力矩关断。
pub struct Hwi {
    bus: Mutex<Box<dyn BusTransport>>,
    adapter: Box<dyn ServoAdapter>,
    joints: Vec<JointSpec>,
    default_speed: u16,
    default_acc: u8,
    closed: AtomicBool,
}

impl Hwi {
    /// 打开串口并按配置选定协议适配器，任一步失败立即报错
    pub fn open(config: &DuckConfig, port: &str, baud_rate: u32) -> Result<Self, DriverError> {
        let bus = SerialBus::open(port, baud_rate).map_err(DriverError::TransportUnavailable)?;
        info!(port, baud_rate, protocol = ?config.protocol, "hardware interface opened");
        Ok(Self::with_transport(config, Box::new(bus)))
    }

    /// 用外部传入的传输构建（测试注入 mock 用）
    pub fn with_transport(config: &DuckConfig, bus: Box<dyn BusTransport>) -> Self {
        Self {
            bus: Mutex::new(bus),
            adapter: adapter_for(config.profile),
            joints: config.joints.clone(),
            default_speed: config.default_speed,
            default_acc: config.default_acc,
            closed: AtomicBool::new(false),
        }
    }

    /// 关节表（按名排序）
    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    /// 按名查关节
    pub fn joint(&self, name: &str) -> Option<&JointSpec> {
        self.joints.iter().find(|j| j.name == name)
    }

    fn joint_or_err(&self, name: &str) -> Result<&JointSpec, DriverError> {
        self.joint(name)
            .ok_or_else(|| DriverError::UnknownJoint(name.to_string()))
    }

    fn ensure_open(&self) -> Result<(), DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Closed);
        }
        Ok(())
    }

    /// 设置一批关节的目标位置（弧度）
    ///
    /// 标定偏移在转换前加到目标角上。未知关节名不是错误，
    /// 调用方可以传部分映射。
    pub fn set_joint_positions(&self, targets: &BTreeMap<String, f64>) -> Result<(), DriverError> {
        self.ensure_open()?;
        let mut bus = self.bus.lock();
        for (name, &rad) in targets {
            let Some(spec) = self.joint(name) else {
                debug!(joint = %name, "unknown joint name, skipping");
                continue;
            };
            let count = self
                .adapter
                .profile()
                .angle_to_count(rad + spec.calibration_offset);
            if let Err(e) = self.adapter.write_goal(
                bus.as_mut(),
                spec.servo_id,
                count,
                self.default_speed,
                self.default_acc,
            ) {
                warn!(joint = %name, servo_id = spec.servo_id, error = %e, "goal write failed");
            }
        }
        Ok(())
    }

    /// 单关节目标位置（弧度）
    pub fn set_joint_position(&self, name: &str, rad: f64) -> Result<(), DriverError> {
        self.ensure_open()?;
        let spec = self.joint_or_err(name)?;
        let count = self
            .adapter
            .profile()
            .angle_to_count(rad + spec.calibration_offset);
        let mut bus = self.bus.lock();
        self.adapter
            .write_goal(
                bus.as_mut(),
                spec.servo_id,
                count,
                self.default_speed,
                self.default_acc,
            )
            .map_err(|source| DriverError::Comm {
                joint: name.to_string(),
                servo_id: spec.servo_id,
                source,
            })
    }

    /// 读所有未排除关节的当前位置（弧度），全有或全无
    pub fn get_joint_positions(
        &self,
        exclude: &[&str],
    ) -> Result<BTreeMap<String, f64>, DriverError> {
        self.read_all(exclude, |adapter, bus, spec| {
            adapter
                .read_position(bus, spec.servo_id)
                .map(|count| adapter.profile().count_to_angle(count) - spec.calibration_offset)
        })
    }

    /// 读所有未排除关节的当前速度（rad/s，按协议近似系数换算）
    pub fn get_joint_velocities(
        &self,
        exclude: &[&str],
    ) -> Result<BTreeMap<String, f64>, DriverError> {
        let unit = self.adapter.profile().speed_unit_rad_s();
        self.read_all(exclude, move |adapter, bus, spec| {
            adapter
                .read_speed(bus, spec.servo_id)
                .map(|raw| f64::from(raw) * unit)
        })
    }

    fn read_all(
        &self,
        exclude: &[&str],
        mut read_one: impl FnMut(&dyn ServoAdapter, &mut dyn BusTransport, &JointSpec) -> Result<f64, BusError>,
    ) -> Result<BTreeMap<String, f64>, DriverError> {
        self.ensure_open()?;
        let mut bus = self.bus.lock();
        let mut out = BTreeMap::new();
        for spec in &self.joints {
            if exclude.contains(&spec.name.as_str()) {
                continue;
            }
            let mut last_err = None;
            let mut value = None;
            for attempt in 0..READ_ATTEMPTS {
                match read_one(self.adapter.as_ref(), bus.as_mut(), spec) {
                    Ok(v) => {
                        value = Some(v);
                        break;
                    }
                    Err(e) => {
                        debug!(joint = %spec.name, attempt, error = %e, "read retry");
                        last_err = Some(e);
                        std::thread::sleep(RETRY_DELAY);
                    }
                }
            }
            match value {
                Some(v) => {
                    out.insert(spec.name.clone(), v);
                }
                // 一个关节读不到，整个调用失败：不返回部分数据
                None => {
                    return Err(DriverError::ReadFailed {
                        joint: spec.name.clone(),
                        servo_id: spec.servo_id,
                        attempts: READ_ATTEMPTS,
                        source: last_err.unwrap_or(BusError::Timeout),
                    });
                }
            }
        }
        Ok(out)
    }

    /// 单关节单发位置读取（弧度），重试由调用方决定
    pub fn read_joint_position(&self, name: &str) -> Result<f64, DriverError> {
        self.ensure_open()?;
        let spec = self.joint_or_err(name)?;
        let mut bus = self.bus.lock();
        self.adapter
            .read_position(bus.as_mut(), spec.servo_id)
            .map(|count| {
                self.adapter.profile().count_to_angle(count) - spec.calibration_offset
            })
            .map_err(|source| DriverError::Comm {
                joint: name.to_string(),
                servo_id: spec.servo_id,
                source,
            })
    }

    /// 单关节力矩开关
    pub fn set_joint_torque(&self, name: &str, enabled: bool) -> Result<(), DriverError> {
        self.ensure_open()?;
        let spec = self.joint_or_err(name)?;
        let mut bus = self.bus.lock();
        self.adapter
            .set_torque(bus.as_mut(), spec.servo_id, enabled)
            .map_err(|source| DriverError::Comm {
                joint: name.to_string(),
                servo_id: spec.servo_id,
                source,
            })
    }

    /// 单关节诊断寄存器组（仅在运动验证失败后调用）
    pub fn read_joint_diagnostics(
        &self,
        name: &str,
    ) -> Result<Vec<DiagnosticRegister>, DriverError> {
        self.ensure_open()?;
        let spec = self.joint_or_err(name)?;
        let mut bus = self.bus.lock();
        Ok(self.adapter.read_diagnostics(bus.as_mut(), spec.servo_id))
    }

    /// 全关节力矩使能（尽力而为），返回失败的 (关节名, 舵机 ID) 列表
    pub fn enable_torque(&self) -> Vec<(String, u8)> {
        self.torque_sweep(true)
    }

    /// 全关节力矩关断（尽力而为）
    ///
    /// 收尾动作绝不能因为一个舵机没插而卡住，单关节失败只记录。
    pub fn disable_torque(&self) -> Vec<(String, u8)> {
        self.torque_sweep(false)
    }

    fn torque_sweep(&self, enabled: bool) -> Vec<(String, u8)> {
        if self.closed.load(Ordering::Acquire) {
            return self
                .joints
                .iter()
                .map(|j| (j.name.clone(), j.servo_id))
                .collect();
        }
        let mut bus = self.bus.lock();
        let mut failed = Vec::new();
        for spec in &self.joints {
            if let Err(e) = self.adapter.set_torque(bus.as_mut(), spec.servo_id, enabled) {
                warn!(joint = %spec.name, servo_id = spec.servo_id, error = %e, "torque write failed");
                failed.push((spec.name.clone(), spec.servo_id));
            }
        }
        failed
    }

    /// 扫描总线上在位的舵机 ID（与关节表无关，能发现未映射的舵机）
    pub fn scan_bus(&self, range: RangeInclusive<u8>) -> Vec<u8> {
        if self.closed.load(Ordering::Acquire) {
            return Vec::new();
        }
        let mut bus = self.bus.lock();
        let mut found = Vec::new();
        for id in range {
            if self.adapter.read_position(bus.as_mut(), id).is_ok() {
                found.push(id);
            }
        }
        found
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// 幂等地释放传输
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.bus.lock().close();
            info!("hardware interface closed");
        }
    }
}

impl Drop for Hwi {
    fn drop(&mut self) {
        self.close();
    }
}
