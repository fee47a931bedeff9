//! 控制台操作员
//!
//! 诊断状态机的交互实现：确认走 inquire，提示失败（终端被关、
//! 提示里按 Ctrl-C）一律当拒绝处理，宁可中止也不带伤继续。

use duck_client::{Operator, TestDecision};

pub struct ConsoleOperator;

impl Operator for ConsoleOperator {
    fn continue_with_unresponsive(&mut self, unresponsive: &[(String, u8)]) -> bool {
        println!("\n⚠️  以下关节不应答：");
        for (name, servo_id) in unresponsive {
            println!("  {name} (ID {servo_id})");
        }
        inquire::Confirm::new("跳过这些关节继续？")
            .with_default(false)
            .prompt()
            .unwrap_or(false)
    }

    fn begin_movement_tests(&mut self) -> bool {
        inquire::Confirm::new("开始逐关节运动测试？机器人会小幅动作")
            .with_default(true)
            .prompt()
            .unwrap_or(false)
    }

    fn confirm_joint_test(&mut self, joint: &str, servo_id: u8) -> TestDecision {
        let prompt = format!("测试 {joint} (ID {servo_id})？");
        match inquire::Select::new(&prompt, vec!["测试", "跳过", "结束运动测试"]).prompt() {
            Ok("测试") => TestDecision::Test,
            Ok("跳过") => TestDecision::Skip,
            _ => TestDecision::Quit,
        }
    }
}
