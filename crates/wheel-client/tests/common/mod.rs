//! 测试共用工具

#![allow(dead_code)]

use std::thread;
use std::time::{Duration, Instant};
use wheel_client::{PidConfig, SettleConfig, WheelBuilder, WheelClient};
use wheel_driver::HeartbeatConfig;
use wheel_link::mock::MockController;

/// 使用快速节拍连接模拟控制器
pub fn connect(sim: &MockController) -> WheelClient {
    WheelBuilder::new()
        .pid(PidConfig::default().with_tick(Duration::from_millis(5)))
        .heartbeat(HeartbeatConfig {
            interval: Duration::from_millis(20),
            fast_interval: Duration::from_millis(5),
        })
        .settle(SettleConfig {
            timeout: Duration::from_secs(1),
            stable_reads: 5,
            poll_interval: Duration::from_millis(1),
        })
        .connect_with(sim.connector())
        .expect("mock controller should accept connections")
}

/// 轮询直到条件成立或超时
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// 去掉心跳产生的位置查询后的命令序列
pub fn commands_without_polls(sim: &MockController) -> Vec<String> {
    sim.commands().into_iter().filter(|c| c != "RUe1").collect()
}
