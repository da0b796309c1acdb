//! 模式管理与客户端接口集成测试（模拟控制器）

mod common;

use common::{commands_without_polls, connect, eventually};
use std::time::Duration;
use wheel_client::{ClientError, Direction, Mode};
use wheel_link::mock::MockController;
use wheel_protocol::{ProtocolError, Register};

#[test]
fn test_jog_sets_direction_then_starts() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.start_jog().unwrap();
    assert_eq!(wheel.mode(), Mode::Jogging);
    assert!(sim.is_jogging());
    assert_eq!(commands_without_polls(&sim), ["DI100", "CJ"]);

    wheel.stop_jog().unwrap();
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!sim.is_jogging());

    sim.clear_log();
    wheel.start_jog_in(Direction::Reverse).unwrap();
    assert_eq!(commands_without_polls(&sim), ["DI-100", "CJ"]);
    wheel.stop_jog().unwrap();
}

#[test]
fn test_jog_and_sweep_are_exclusive() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.start_jog().unwrap();
    assert!(matches!(
        wheel.start_sweep(),
        Err(ClientError::ModeConflict {
            active: Mode::Jogging,
            requested: Mode::Sweeping
        })
    ));
    assert!(!sim.is_sweeping());
    wheel.stop_jog().unwrap();

    wheel.start_sweep().unwrap();
    assert!(sim.is_sweeping());
    assert!(matches!(
        wheel.start_jog(),
        Err(ClientError::ModeConflict {
            active: Mode::Sweeping,
            requested: Mode::Jogging
        })
    ));
    assert!(wheel.move_to_mod_position(0, 1, 5).is_err());
    wheel.stop_sweep().unwrap();
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!sim.is_sweeping());
}

#[test]
fn test_locking_refuses_other_modes() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    let handle = wheel.start_lock(100).unwrap();
    assert!(wheel.start_jog().is_err());
    assert!(wheel.start_sweep().is_err());
    assert!(wheel.move_to_mod_position(200, 1, 5).is_err());
    let err = wheel.seek_home().unwrap_err();
    assert!(matches!(err, ClientError::Busy { active: Mode::Locking, .. }), "{err:?}");
    assert_eq!(err.command(), Some("seek home"));
    let err = wheel.set_move_distance(10).unwrap_err();
    assert!(matches!(err, ClientError::Busy { active: Mode::Locking, .. }), "{err:?}");
    assert!(err.to_string().starts_with("write move_distance"), "{err}");
    assert!(matches!(
        wheel.set_encoder_position(0),
        Err(ClientError::InvalidParameter { .. })
    ));
    assert_eq!(wheel.mode(), Mode::Locking);
    assert!(!sim.is_jogging() && !sim.is_sweeping());

    wheel.stop_lock().unwrap();
    assert!(handle.is_finished());
    assert_eq!(wheel.mode(), Mode::Idle);
}

#[test]
fn test_stop_always_sends_command() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.stop_jog().unwrap();
    wheel.stop_sweep().unwrap();
    assert_eq!(sim.count("SJ"), 1);
    assert_eq!(sim.count("SK"), 1);
    assert_eq!(wheel.mode(), Mode::Idle);

    // 停止扫描不会影响点动
    wheel.start_jog().unwrap();
    wheel.stop_sweep().unwrap();
    assert_eq!(wheel.mode(), Mode::Jogging);
    wheel.stop_jog().unwrap();
}

#[test]
fn test_refused_start_leaves_idle() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    sim.set_nack_writes(true);
    let err = wheel.start_jog().unwrap_err();
    assert!(matches!(err, ClientError::Protocol(ProtocolError::Nack { .. })), "{err:?}");
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!sim.is_jogging());
}

#[test]
fn test_disconnect_stops_everything() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.start_jog().unwrap();
    wheel.disconnect();
    assert!(!wheel.is_connected());
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!sim.is_jogging());

    wheel.reconnect().unwrap();
    sim.set_stuck(true);
    let handle = wheel.move_to_mod_position(3000, 1, -1).unwrap();
    wheel.disconnect();
    assert!(handle.is_finished());
    assert_eq!(wheel.mode(), Mode::Idle);
    wheel.disconnect();
}

#[test]
fn test_link_loss_stops_jog_locally() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.start_jog().unwrap();
    assert!(wheel.is_fast_polling());
    sim.refuse_connections(true);
    sim.fail_next_exchanges(100);

    let err = wheel.refresh_position().unwrap_err();
    assert!(matches!(err, ClientError::Connection { .. }), "{err:?}");
    assert!(!wheel.is_connected());
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!wheel.is_fast_polling());

    // 停掉的点动不再阻挡新的模式
    sim.refuse_connections(false);
    sim.fail_next_exchanges(0);
    wheel.reconnect().unwrap();
    wheel.start_sweep().unwrap();
    assert_eq!(wheel.mode(), Mode::Sweeping);
    wheel.stop_sweep().unwrap();
}

#[test]
fn test_link_loss_seen_by_heartbeat_stops_sweep() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    wheel.start_sweep().unwrap();
    sim.refuse_connections(true);
    sim.fail_next_exchanges(100);

    assert!(eventually(Duration::from_secs(2), || !wheel.is_connected()));
    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!wheel.is_fast_polling());
    assert_eq!(wheel.driver().link_losses(), 1);
}

#[test]
fn test_seek_home_picks_nearer_side_and_settles() {
    let sim = MockController::new();
    sim.set_position(3 * 8192 + 100);
    let wheel = connect(&sim);

    wheel.seek_home().unwrap();
    assert_eq!(commands_without_polls(&sim), ["DI-100", "SHX0H"]);
    assert_eq!(wheel.wait_until_settled().unwrap(), 3 * 8192);
    assert_eq!(wheel.mod_position(), Some(0));

    sim.set_position(8000);
    sim.clear_log();
    wheel.seek_home().unwrap();
    assert_eq!(commands_without_polls(&sim), ["DI100", "SHX0H"]);
}

#[test]
fn test_reset_stops_sweep_and_homes() {
    let sim = MockController::new();
    sim.set_position(200);
    let wheel = connect(&sim);

    wheel.start_sweep().unwrap();
    sim.clear_log();
    wheel.reset().unwrap();

    assert_eq!(wheel.mode(), Mode::Idle);
    assert!(!sim.is_sweeping());
    assert_eq!(commands_without_polls(&sim), ["SK", "RE", "DI-100", "SHX0H"]);
    assert!(eventually(Duration::from_secs(1), || sim.position() == 0));
}

#[test]
fn test_setters_validate_and_update_cache() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    assert!(matches!(
        wheel.set_velocity(500.0),
        Err(ClientError::InvalidParameter { .. })
    ));
    assert_eq!(sim.count_prefix("VE"), 0);

    assert_eq!(wheel.set_jog_speed(2.54).unwrap(), 2.5);
    assert_eq!(wheel.state().jog_speed(), Some(2.5));
    assert_eq!(sim.value(Register::JogSpeed), 2.5);

    assert_eq!(wheel.set_sweep_mask(0b1010).unwrap(), 10);
    assert_eq!(wheel.state().sweep_mask(), Some(10));

    assert!(matches!(
        wheel.set(Register::Temperature, 20.0),
        Err(ClientError::InvalidParameter { .. })
    ));

    wheel.set_encoder_position(0).unwrap();
    assert_eq!(sim.count("EP0"), 1);
}

#[test]
fn test_nacked_write_keeps_cache() {
    let sim = MockController::new();
    let wheel = connect(&sim);
    wheel.refresh_all().unwrap();
    assert_eq!(wheel.state().velocity(), Some(10.0));

    sim.set_nack_writes(true);
    let err = wheel.set_velocity(5.0).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(wheel.state().velocity(), Some(10.0));
}

#[test]
fn test_send_raw_goes_through_whitelist() {
    let sim = MockController::new();
    sim.set_position(42);
    let wheel = connect(&sim);

    assert_eq!(wheel.send_raw("RUe1").unwrap(), "RUe1=42");
    assert!(matches!(
        wheel.send_raw("ZZ"),
        Err(ClientError::Protocol(ProtocolError::Rejected { .. }))
    ));
    assert!(wheel.send_raw("AC12x").is_err());
    assert_eq!(sim.count("ZZ"), 0);
}

#[test]
fn test_refresh_all_marks_unparsable_fields() {
    let sim = MockController::new();
    sim.set_position(-5);
    sim.set_garbage(Register::Temperature, true);
    let wheel = connect(&sim);

    let state = wheel.refresh_all().unwrap();
    assert_eq!(state.position(), Some(-5));
    assert_eq!(state.mod_position(), Some(8187));
    assert_eq!(state.temperature(), None);
    assert_eq!(wheel.revolutions(), Some(-5.0 / 8192.0));
}

#[test]
fn test_heartbeat_keeps_position_fresh() {
    let sim = MockController::new();
    let wheel = connect(&sim);

    sim.set_position(777);
    assert!(eventually(Duration::from_secs(1), || wheel.position() == Some(777)));
    assert!(wheel.is_link_fresh());
}
