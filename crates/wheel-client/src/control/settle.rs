//! 静止检测
//!
//! 寻零等固件运动没有完成通知，只能轮询位置直到连续若干次读数相同。

use crate::error::{ClientError, Result};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use wheel_driver::Driver;

/// 静止检测参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleConfig {
    /// 总超时
    pub timeout: Duration,
    /// 连续相同读数的次数
    pub stable_reads: u32,
    /// 轮询间隔
    pub poll_interval: Duration,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            stable_reads: 5,
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// 轮询位置直到静止，返回最终位置
pub(crate) fn wait_until_settled(driver: &Driver, config: &SettleConfig) -> Result<i64> {
    let deadline = Instant::now() + config.timeout;
    let mut last = None;
    let mut stable = 0u32;

    loop {
        let position = driver.refresh_position()?;
        if last == Some(position) {
            stable += 1;
        } else {
            stable = 1;
            last = Some(position);
        }
        if stable >= config.stable_reads {
            debug!("Settled at {} after {} stable reads", position, stable);
            return Ok(position);
        }
        if Instant::now() >= deadline {
            return Err(ClientError::Timeout {
                phase: "settle".to_string(),
                timeout_ms: config.timeout.as_millis() as u64,
            });
        }
        thread::sleep(config.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wheel_link::mock::MockController;

    fn fast(timeout_ms: u64) -> SettleConfig {
        SettleConfig {
            timeout: Duration::from_millis(timeout_ms),
            stable_reads: 5,
            poll_interval: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_settles_on_still_position() {
        let sim = MockController::new();
        sim.set_position(1234);
        let driver = Driver::new(sim.connector());
        driver.connect().unwrap();

        assert_eq!(wait_until_settled(&driver, &fast(1_000)).unwrap(), 1234);
        assert_eq!(sim.count("RUe1"), 5);
    }

    #[test]
    fn test_moving_position_times_out() {
        let sim = MockController::new();
        let driver = Driver::new(sim.connector());
        driver.connect().unwrap();

        let mover = {
            let sim = sim.clone();
            thread::spawn(move || {
                for i in 0..400 {
                    sim.set_position(i);
                    thread::sleep(Duration::from_micros(500));
                }
            })
        };
        let result = wait_until_settled(&driver, &fast(50));
        mover.join().unwrap();
        assert!(matches!(result, Err(ClientError::Timeout { ref phase, .. }) if phase == "settle"));
    }

    #[test]
    fn test_unreadable_position_is_fault() {
        let sim = MockController::new();
        sim.set_garbage(wheel_protocol::Register::Position, true);
        let driver = Driver::new(sim.connector());
        driver.connect().unwrap();
        assert!(matches!(
            wait_until_settled(&driver, &fast(100)),
            Err(ClientError::Fault { .. })
        ));
    }
}
