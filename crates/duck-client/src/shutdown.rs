//! 退出路径上的力矩关断
//!
//! 正常退出、错误退出和 Ctrl-C 共用同一条收尾路径：对全部关节做
//! 尽力而为的力矩关断再关总线。失败只记录，收尾绝不能卡在一个
//! 没插的舵机上。

use tracing::{info, warn};

use duck_driver::Hwi;

/// 全关节力矩关断 + 关总线
///
/// 可重复调用；`Hwi::close` 本身幂等。
pub fn torque_disable_sweep(hwi: &Hwi) {
    info!("disabling torque on all joints");
    let failed = hwi.disable_torque();
    if failed.is_empty() {
        info!("all joints torque-disabled");
    } else {
        for (name, servo_id) in &failed {
            warn!(joint = %name, servo_id, "torque disable failed");
        }
    }
    hwi.close();
}
