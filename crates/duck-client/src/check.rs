//! 诊断/运动测试状态机
//!
//! 操作员监督的上电前检查序列：
//!
//! ```text
//! Connecting → TorqueEnable → PerMotorCheck → ResponsivenessCheck
//!     → [操作员关卡] → MovementTest(逐关节，可确认/跳过/退出)
//!     → TorqueDisable → Done
//! ```
//!
//! 任何状态都可经操作员拒绝进入 `Aborted` 终态。每条中止路径
//! （包括进程中断，由 CLI 的信号处理负责）都会对仍健康的关节做
//! 一次尽力而为的力矩关断：中止绝不允许留下带力矩的关节或
//! 失控运动。
//!
//! 单关节失败从不中止整台机器：坏关节降级为 `Unresponsive`
//! 并在后续所有状态中被排除（本次运行内不再自动重试）。

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{info, warn};

use duck_driver::Hwi;

/// 单个舵机的健康状态
///
/// `Unknown → Responsive`（一次成功读取）；
/// `Unknown → Unresponsive`（重试预算耗尽）。
/// `Unresponsive` 在整个诊断运行期间是粘性的。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoHealth {
    Unknown,
    Responsive,
    Unresponsive,
}

/// 操作员对单关节运动测试的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestDecision {
    Test,
    Skip,
    /// 跳过剩余所有关节的运动测试
    Quit,
}

/// 操作员关卡
///
/// 控制台实现在 CLI 里；测试用脚本化实现。
pub trait Operator {
    /// 有关节不应答时：true = 带伤继续，false = 中止
    fn continue_with_unresponsive(&mut self, unresponsive: &[(String, u8)]) -> bool;

    /// 运动测试阶段开始前的确认；false = 整段跳过
    fn begin_movement_tests(&mut self) -> bool;

    /// 逐关节确认
    fn confirm_joint_test(&mut self, joint: &str, servo_id: u8) -> TestDecision;
}

/// 一个关节运动测试的结果
#[derive(Debug)]
pub struct MovementOutcome {
    pub joint: String,
    pub servo_id: u8,
    /// 测试起点（弧度），读失败则为 None
    pub before: Option<f64>,
    /// 指令后读回的位置
    pub after: Option<f64>,
    pub ok: bool,
}

/// 整次运行的终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed,
    Aborted,
}

/// 诊断运行报告
#[derive(Debug)]
pub struct CheckReport {
    pub outcome: CheckOutcome,
    pub health: BTreeMap<String, ServoHealth>,
    pub movements: Vec<MovementOutcome>,
}

/// 诊断状态机
pub struct DiagnosticMachine<'a, O: Operator> {
    hwi: &'a Hwi,
    operator: O,
    /// 运动测试的位置增量（弧度）
    pub delta: f64,
    /// 指令后的固定等待
    pub settle: Duration,
    /// 响应性检查的读尝试次数
    pub read_attempts: u32,
    health: BTreeMap<String, ServoHealth>,
}

impl<'a, O: Operator> DiagnosticMachine<'a, O> {
    pub fn new(hwi: &'a Hwi, operator: O) -> Self {
        let health = hwi
            .joints()
            .iter()
            .map(|j| (j.name.clone(), ServoHealth::Unknown))
            .collect();
        Self {
            hwi,
            operator,
            delta: 0.1,
            settle: Duration::from_secs(1),
            read_attempts: 3,
            health,
        }
    }

    fn mark(&mut self, joint: &str, health: ServoHealth) {
        self.health.insert(joint.to_string(), health);
    }

    fn is_healthy(&self, joint: &str) -> bool {
        self.health.get(joint) != Some(&ServoHealth::Unresponsive)
    }

    fn healthy_joints(&self) -> Vec<(String, u8)> {
        self.hwi
            .joints()
            .iter()
            .filter(|j| self.is_healthy(&j.name))
            .map(|j| (j.name.clone(), j.servo_id))
            .collect()
    }

    fn unresponsive_joints(&self) -> Vec<(String, u8)> {
        self.hwi
            .joints()
            .iter()
            .filter(|j| !self.is_healthy(&j.name))
            .map(|j| (j.name.clone(), j.servo_id))
            .collect()
    }

    /// 对每个仍健康的关节恰好做一次力矩关断（不应答的关节零次）
    fn torque_disable_healthy(&self) {
        for (name, servo_id) in self.healthy_joints() {
            match self.hwi.set_joint_torque(&name, false) {
                Ok(()) => info!(joint = %name, servo_id, "torque disabled"),
                Err(e) => warn!(joint = %name, servo_id, error = %e, "torque disable failed"),
            }
        }
    }

    fn finish(self, outcome: CheckOutcome, movements: Vec<MovementOutcome>) -> CheckReport {
        CheckReport {
            outcome,
            health: self.health,
            movements,
        }
    }

    /// 跑完整个序列
    pub fn run(mut self) -> CheckReport {
        // TorqueEnable：全总线尽力而为
        let failed = self.hwi.enable_torque();
        for (name, servo_id) in &failed {
            warn!(joint = %name, servo_id, "torque enable failed");
        }

        // PerMotorCheck：逐关节单独写一次力矩使能，早期暴露坏关节
        for spec in self.hwi.joints().to_vec() {
            if let Err(e) = self.hwi.set_joint_torque(&spec.name, true) {
                warn!(joint = %spec.name, servo_id = spec.servo_id, error = %e,
                    "per-motor torque write failed");
                self.mark(&spec.name, ServoHealth::Unresponsive);
            }
        }

        // ResponsivenessCheck：有限重试的位置读取
        for spec in self.hwi.joints().to_vec() {
            if !self.is_healthy(&spec.name) {
                info!(joint = %spec.name, "skipping known-unresponsive joint");
                continue;
            }
            let mut responsive = false;
            for attempt in 0..self.read_attempts {
                match self.hwi.read_joint_position(&spec.name) {
                    Ok(pos) => {
                        info!(joint = %spec.name, servo_id = spec.servo_id, pos, "responsive");
                        responsive = true;
                        break;
                    }
                    Err(e) => {
                        warn!(joint = %spec.name, attempt, error = %e, "position read failed");
                    }
                }
            }
            self.mark(
                &spec.name,
                if responsive { ServoHealth::Responsive } else { ServoHealth::Unresponsive },
            );
        }

        // 操作员关卡：有不应答关节时必须显式决定继续还是中止
        let unresponsive = self.unresponsive_joints();
        if !unresponsive.is_empty() {
            warn!(count = unresponsive.len(), "unresponsive joints detected");
            if !self.operator.continue_with_unresponsive(&unresponsive) {
                info!("operator chose to abort");
                self.torque_disable_healthy();
                return self.finish(CheckOutcome::Aborted, Vec::new());
            }
        }

        // MovementTest：逐关节小幅运动并读回
        let mut movements = Vec::new();
        if self.operator.begin_movement_tests() {
            for (name, servo_id) in self.healthy_joints() {
                match self.operator.confirm_joint_test(&name, servo_id) {
                    TestDecision::Quit => break,
                    TestDecision::Skip => continue,
                    TestDecision::Test => {
                        movements.push(self.test_one_joint(&name, servo_id));
                    }
                }
            }
        }

        // TorqueDisable：无论从哪条路走到收尾，健康关节都关断一次
        self.torque_disable_healthy();
        self.finish(CheckOutcome::Completed, movements)
    }

    /// 单关节运动测试：读 → 指令 +delta → 等 → 读回 → 指令回原位 → 等
    ///
    /// 任一步失败只结束这个关节的测试，其余关节继续。
    fn test_one_joint(&self, name: &str, servo_id: u8) -> MovementOutcome {
        let before = match self.hwi.read_joint_position(name) {
            Ok(pos) => pos,
            Err(e) => {
                warn!(joint = %name, servo_id, error = %e, "could not read start position");
                self.dump_diagnostics(name);
                return MovementOutcome {
                    joint: name.to_string(),
                    servo_id,
                    before: None,
                    after: None,
                    ok: false,
                };
            }
        };

        let target = before + self.delta;
        info!(joint = %name, servo_id, before, target, "commanding test move");
        if let Err(e) = self.hwi.set_joint_position(name, target) {
            warn!(joint = %name, servo_id, error = %e, "test move command failed");
            self.dump_diagnostics(name);
            return MovementOutcome {
                joint: name.to_string(),
                servo_id,
                before: Some(before),
                after: None,
                ok: false,
            };
        }
        spin_sleep::sleep(self.settle);

        let after = self.hwi.read_joint_position(name).ok();
        let ok = match after {
            Some(pos) => {
                info!(joint = %name, servo_id, pos, "position after test move");
                // 到没到 delta 的一半就算动了：传动间隙和负载让精确比较没意义
                (pos - before).abs() >= self.delta / 2.0
            }
            None => false,
        };
        if !ok {
            warn!(joint = %name, servo_id, "movement not confirmed");
            self.dump_diagnostics(name);
        }

        // 回原位；失败也只是记录
        if let Err(e) = self.hwi.set_joint_position(name, before) {
            warn!(joint = %name, servo_id, error = %e, "return command failed");
        }
        spin_sleep::sleep(self.settle);

        MovementOutcome {
            joint: name.to_string(),
            servo_id,
            before: Some(before),
            after,
            ok,
        }
    }

    /// 失败后的诊断寄存器转储（正常路径不产生这部分总线流量）
    fn dump_diagnostics(&self, name: &str) {
        match self.hwi.read_joint_diagnostics(name) {
            Ok(regs) => {
                for reg in regs {
                    match reg.value {
                        Ok(v) => info!(joint = %name, register = reg.name, value = v, "diag"),
                        Err(e) => warn!(joint = %name, register = reg.name, error = %e, "diag read failed"),
                    }
                }
            }
            Err(e) => warn!(joint = %name, error = %e, "diagnostics unavailable"),
        }
    }
}
