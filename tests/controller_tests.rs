//! Integration tests for the controller

use rs_ramps::{
    hal::MockBoard, Actuator, Command, Config, Controller, DeviceState, ErrorCode, ReplyStatus,
};

fn setup() -> (Controller<MockBoard>, MockBoard) {
    let mut board = MockBoard::new();
    let controller = Controller::new(&Config::default(), &mut board);
    (controller, board)
}

fn send(controller: &mut Controller<MockBoard>, line: &str, now: u64) -> String {
    let cmd: Command = line.parse().unwrap();
    controller.dispatch(&cmd, now).encode()
}

fn run(controller: &mut Controller<MockBoard>, from: u64, to: u64) {
    for t in from..to {
        controller.update(t);
    }
}

#[test]
fn stepper_move_completes() {
    let (mut c, _) = setup();

    assert_eq!(send(&mut c, ">X enable", 0), "X enable OK");
    assert_eq!(send(&mut c, ">X position 3.14", 0), "X position 3.14 OK");
    assert_eq!(c.device("X").unwrap().state(), DeviceState::Active);

    run(&mut c, 0, 8000);

    let x = c.device("X").unwrap();
    assert_eq!(x.state(), DeviceState::Idle);
    assert!(x.as_stepper().unwrap().is_at_target());
    assert_eq!(send(&mut c, ">X position?", 8000), "X position 3.140");
    assert_eq!(send(&mut c, ">X velocity?", 8000), "X velocity 0.000");
}

#[test]
fn huge_position_moves_toward_the_far_end() {
    let (mut c, _) = setup();
    send(&mut c, ">X enable", 0);
    send(&mut c, ">X position 1", 0);
    run(&mut c, 0, 200);
    let before = c.device("X").unwrap().as_stepper().unwrap().position_steps();
    assert!(before > 0);

    assert_eq!(send(&mut c, ">X position -1e30", 200), "X position -1e30 OK");
    run(&mut c, 200, 1200);

    let x = c.device("X").unwrap();
    assert_eq!(x.state(), DeviceState::Active);
    assert!(x.as_stepper().unwrap().position_steps() < before);
}

#[test]
fn stop_twice_is_idempotent() {
    let (mut c, _) = setup();
    send(&mut c, ">Y enable", 0);

    assert_eq!(send(&mut c, ">Y stop", 0), "Y stop OK");
    let first = c.state(0).devices[1].clone();
    assert_eq!(send(&mut c, ">Y stop", 1), "Y stop OK");
    let second = c.state(1).devices[1].clone();

    assert_eq!(first, second);
    assert_eq!(second.state, DeviceState::Idle);
}

#[test]
fn emergency_stop_halts_everything_until_reset() {
    let (mut c, board) = setup();
    let fan = board.pwm("FAN").unwrap();
    let gripper = board.servo("GRIPPER").unwrap();

    send(&mut c, ">X enable", 0);
    send(&mut c, ">X velocity 2", 0);
    send(&mut c, ">GRIPPER position 0", 0);
    send(&mut c, ">FAN ON", 0);
    run(&mut c, 0, 500);
    assert!(c.device("GRIPPER").unwrap().as_servo().unwrap().is_moving());
    let held = c.device("GRIPPER").unwrap().as_servo().unwrap().angle();
    let held_pulse = gripper.angle();

    assert_eq!(send(&mut c, ">ESTOP", 500), "CONTROLLER ESTOP OK");
    assert!(c.is_emergency_stopped());

    let x = c.device("X").unwrap().as_stepper().unwrap();
    assert_eq!(x.motion().target_velocity, 0.0);
    assert_eq!(x.motion().current_velocity, 0.0);
    assert!(!c.device("GRIPPER").unwrap().as_servo().unwrap().is_moving());
    assert_eq!(fan.duty(), 0);

    // servos hold where they were while the latch is set
    run(&mut c, 500, 1500);
    assert_eq!(c.device("GRIPPER").unwrap().as_servo().unwrap().angle(), held);
    assert_eq!(gripper.angle(), held_pulse);

    let rejected = c.dispatch(&">FAN ON".parse().unwrap(), 1501);
    assert_eq!(rejected.error, Some(ErrorCode::DeviceBusy));
    let rejected = c.dispatch(&">PING".parse().unwrap(), 1501);
    assert_eq!(rejected.error, Some(ErrorCode::DeviceBusy));

    assert_eq!(send(&mut c, ">RESET", 1502), "CONTROLLER reset OK");
    assert!(!c.is_emergency_stopped());
    assert_eq!(send(&mut c, ">FAN ON", 1503), "FAN state ON OK");
    assert_eq!(fan.duty(), 255);
}

#[test]
fn status_reports_estop() {
    let (mut c, _) = setup();
    c.emergency_stop_all();
    let text = c.system_status(3_500);
    assert!(text.contains("E-Stop: ACTIVE"));
    assert!(text.ends_with("Uptime: 3 seconds"));
}

#[test]
fn outputs_off_turns_every_output_off() {
    let (mut c, board) = setup();
    for name in ["LIGHT", "FAN", "PUMP"] {
        send(&mut c, &format!(">{name} ON"), 0);
        assert_eq!(board.pwm(name).unwrap().duty(), 255);
    }

    let reply = c.dispatch(&">OUTPUTS OFF".parse().unwrap(), 1);
    assert_eq!(reply.status, ReplyStatus::Ok);
    assert_eq!(reply.device, "OUTPUTS");

    for name in ["LIGHT", "FAN", "PUMP"] {
        assert_eq!(board.pwm(name).unwrap().duty(), 0);
    }
}

#[test]
fn steppers_velocity_zero_reaches_every_axis() {
    let (mut c, _) = setup();
    for axis in ["X", "Y", "Z"] {
        send(&mut c, &format!(">{axis} enable"), 0);
        send(&mut c, &format!(">{axis} velocity 1"), 0);
    }
    run(&mut c, 0, 100);

    assert_eq!(send(&mut c, ">STEPPERS velocity 0", 100), "STEPPERS velocity OK");
    for axis in ["X", "Y", "Z"] {
        let stepper = c.device(axis).unwrap().as_stepper().unwrap();
        assert_eq!(stepper.motion().target_velocity, 0.0);
    }
}

#[test]
fn unknown_device_and_unknown_command() {
    let (mut c, _) = setup();

    let ghost = c.dispatch(&">GHOST position 1".parse().unwrap(), 0);
    assert_eq!(ghost.error, Some(ErrorCode::UnknownDevice));

    let frob = c.dispatch(&">X frobnicate".parse().unwrap(), 0);
    assert_eq!(frob.error, Some(ErrorCode::UnknownCommand));

    // device names are case-sensitive
    let lower = c.dispatch(&">fan ON".parse().unwrap(), 0);
    assert_eq!(lower.error, Some(ErrorCode::UnknownDevice));
}

#[test]
fn servo_moves_to_position() {
    let (mut c, board) = setup();
    let pulses = board.servo("CAMERA").unwrap();

    assert_eq!(send(&mut c, ">CAMERA position 3.1416", 0), "CAMERA position 3.1416 OK");
    run(&mut c, 0, 3000);

    assert_eq!(pulses.angle(), 180);
    assert_eq!(send(&mut c, ">CAMERA position?", 3000), "CAMERA position 3.142");
}

#[test]
fn output_fade_with_velocity() {
    let (mut c, board) = setup();
    let light = board.pwm("LIGHT").unwrap();

    assert_eq!(send(&mut c, ">LIGHT velocity 0.5", 0), "LIGHT velocity 0.5 OK");
    run(&mut c, 0, 1001);
    assert!((i32::from(light.duty()) - 127).abs() <= 1);

    run(&mut c, 1001, 2500);
    assert_eq!(light.duty(), 255);
}

#[test]
fn thermistor_reads_room_temperature() {
    let (mut c, board) = setup();
    // 100k NTC against a 4.7k pullup sits near 46 counts at 25 °C
    board.adc("TEMP").unwrap().set(46);

    let reply = c.dispatch(&">TEMP read".parse().unwrap(), 0);
    assert_eq!(reply.status, ReplyStatus::Value);
    let celsius: f32 = reply.value.parse().unwrap();
    assert!(celsius > 20.0 && celsius < 30.0, "{celsius}");
}

#[test]
fn switch_debounce_yields_one_event() {
    let (mut c, board) = setup();
    let pin = board.input("Z_MIN").unwrap();

    // chatter shorter than the debounce window
    for t in 0..40 {
        pin.set(t % 2 == 0);
        c.update(t);
    }
    pin.set_low();
    run(&mut c, 40, 200);
    assert_eq!(c.pending_events(), 0);

    pin.set_high();
    run(&mut c, 200, 400);
    let events: Vec<String> = c.drain_events().map(|e| e.encode()).collect();
    assert_eq!(events, ["Z_MIN state 1 EVENT"]);
    assert_eq!(send(&mut c, ">Z_MIN state?", 400), "Z_MIN state 1");
}

#[test]
fn list_names_every_device() {
    let (mut c, _) = setup();
    let list = send(&mut c, ">CONTROLLER LIST", 0);
    for name in [
        "X", "Y", "Z", "GRIPPER", "CAMERA", "LIGHT", "FAN", "PUMP", "X_MIN", "Y_MIN", "Z_MIN",
        "TEMP", "PRESSURE",
    ] {
        assert!(list.contains(&format!("- {name} (")), "{name} missing");
    }
}
