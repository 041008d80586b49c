//! Session scenarios driven through the scripted `MockConnector`.
//!
//! The reader thread is real, so assertions on reports go through
//! `poll_until`, which polls the session until the condition holds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pump_core::mocks::MockConnector;
use pump_core::{EventKind, PumpError, PumpSession, PumpState, SessionSettings};
use pump_traits::clock::test_clock::TestClock;
use rstest::rstest;

const PORT: &str = "COM3";

fn session(mock: &MockConnector, clock: &TestClock) -> PumpSession {
    PumpSession::new(
        "Pump 1",
        Arc::new(mock.clone()),
        Arc::new(clock.clone()),
        SessionSettings::default(),
    )
}

fn connected(mock: &MockConnector) -> PumpSession {
    let mut s = session(mock, &TestClock::new());
    s.connect(PORT).unwrap();
    s.take_events();
    s
}

fn dispensing(mock: &MockConnector) -> PumpSession {
    let mut s = connected(mock);
    s.start_dispense(5.0, 10.0).unwrap();
    s.take_events();
    s
}

fn kinds(s: &mut PumpSession) -> Vec<EventKind> {
    s.take_events().into_iter().map(|e| e.kind).collect()
}

fn poll_until(s: &mut PumpSession, mut done: impl FnMut(&PumpSession) -> bool) {
    let start = Instant::now();
    loop {
        s.poll();
        if done(s) {
            return;
        }
        assert!(
            start.elapsed() < Duration::from_secs(2),
            "condition not reached; status: {}",
            s.status_text()
        );
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn connect_applies_settle_delay_and_emits_connect() {
    let mock = MockConnector::new();
    let clock = TestClock::new();
    let mut s = session(&mock, &clock);
    s.connect(PORT).unwrap();
    assert_eq!(s.state(), PumpState::Idle);
    assert_eq!(s.port(), Some(PORT));
    assert_eq!(clock.slept(), Duration::from_millis(2_000));
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::Connect {
            port: PORT.to_string()
        }]
    );
}

#[rstest]
#[case("")]
#[case("   ")]
fn blank_port_is_a_connection_error(#[case] port: &str) {
    let mock = MockConnector::new();
    let mut s = session(&mock, &TestClock::new());
    assert!(matches!(s.connect(port), Err(PumpError::Connection(_))));
    assert_eq!(s.state(), PumpState::Disconnected);
    assert!(s.take_events().is_empty());
}

#[test]
fn open_failure_leaves_session_disconnected() {
    let mock = MockConnector::new();
    mock.fail_open(PORT);
    let mut s = session(&mock, &TestClock::new());
    match s.connect(PORT) {
        Err(PumpError::Connection(msg)) => assert!(msg.contains(PORT), "{msg}"),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(s.state(), PumpState::Disconnected);
    assert!(s.take_events().is_empty());
}

#[test]
fn second_connect_is_a_state_error() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    assert!(matches!(s.connect("COM4"), Err(PumpError::State(_))));
    assert_eq!(s.port(), Some(PORT));
    assert_eq!(mock.opened("COM4"), 0);
}

#[test]
fn start_requires_connection() {
    let mock = MockConnector::new();
    let mut s = session(&mock, &TestClock::new());
    assert!(matches!(
        s.start_dispense(5.0, 10.0),
        Err(PumpError::State(_))
    ));
    assert!(mock.written(PORT).is_empty());
}

#[rstest]
#[case(0.0, 10.0)]
#[case(-1.0, 10.0)]
#[case(5.0, 0.0)]
#[case(f64::NAN, 10.0)]
fn invalid_request_writes_nothing(#[case] volume: f64, #[case] rate: f64) {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    assert!(matches!(
        s.start_dispense(volume, rate),
        Err(PumpError::Validation(_))
    ));
    assert_eq!(s.state(), PumpState::Idle);
    assert!(mock.written(PORT).is_empty());
    assert!(s.take_events().is_empty());
}

#[test]
fn text_input_must_be_numeric() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    assert!(matches!(
        s.start_dispense_text("abc", "10"),
        Err(PumpError::Validation(_))
    ));
    s.start_dispense_text("2.5", "7").unwrap();
    assert_eq!(mock.written(PORT), vec!["DISPENSE:2.5,7.0"]);
}

#[test]
fn full_dispense_cycle() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);

    s.start_dispense(5.0, 10.0).unwrap();
    assert_eq!(mock.written(PORT), vec!["DISPENSE:5.0,10.0"]);
    assert_eq!(s.state(), PumpState::Dispensing);
    match kinds(&mut s).as_slice() {
        [EventKind::DispenseStart { request: Some(req) }] => {
            assert_eq!(req.volume_ml(), 5.0);
            assert_eq!(req.rate_ml_min(), 10.0);
        }
        other => panic!("unexpected events: {other:?}"),
    }

    mock.push_line(PORT, "PROGRESS_DETAILED:50.0,2.5,2.5,0.25,0.25,10.0");
    poll_until(&mut s, |s| s.snapshot().percent == 50.0);
    assert_eq!(s.snapshot().dispensed_ml, 2.5);
    assert_eq!(s.display_percent(), 50.0);
    assert_eq!(s.status_text(), "Progress: 50.0%");

    mock.push_line(PORT, "DISPENSE_COMPLETE");
    poll_until(&mut s, |s| s.state() == PumpState::Idle);
    assert_eq!(s.display_percent(), 100.0);
    assert!(s.snapshot().is_zero());
    assert_eq!(s.status_text(), "Dispense Complete");
    assert_eq!(kinds(&mut s), vec![EventKind::DispenseComplete]);
}

#[test]
fn cancel_then_device_confirms() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);

    s.cancel_dispense().unwrap();
    assert_eq!(mock.written(PORT).last().map(String::as_str), Some("CANCEL"));
    assert_eq!(s.state(), PumpState::Dispensing);
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::DispenseCancel { confirmed: false }]
    );

    mock.push_line(PORT, "DISPENSE_CANCELLED");
    poll_until(&mut s, |s| s.state() == PumpState::Idle);
    assert_eq!(s.display_percent(), 0.0);
    assert_eq!(s.status_text(), "Dispense Cancelled");
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::DispenseCancel { confirmed: true }]
    );
}

#[test]
fn cancel_when_idle_is_a_no_op() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    s.cancel_dispense().unwrap();
    assert!(mock.written(PORT).is_empty());
    assert!(s.take_events().is_empty());
}

#[test]
fn cancel_when_never_connected_is_a_no_op() {
    let mock = MockConnector::new();
    let mut s = session(&mock, &TestClock::new());
    assert_eq!(s.cancel_dispense(), Ok(()));
    assert_eq!(s.state(), PumpState::Disconnected);
    assert_eq!(mock.opened(PORT), 0);
    assert!(mock.written(PORT).is_empty());
    assert!(s.take_events().is_empty());
    assert!(s.comm_log().is_empty());
}

#[test]
fn malformed_progress_keeps_previous_snapshot() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.push_line(PORT, "PROGRESS_DETAILED:20,1,4,0.1,0.4,10");
    poll_until(&mut s, |s| s.snapshot().percent == 20.0);
    let before = *s.snapshot();

    mock.push_line(PORT, "PROGRESS_DETAILED:30,abc,3.5,0.15,0.35,10");
    mock.push_line(PORT, "STATUS:PRIMING");
    poll_until(&mut s, |s| s.status_text() == "Status: PRIMING");
    assert_eq!(*s.snapshot(), before);
    assert_eq!(s.state(), PumpState::Dispensing);
}

#[test]
fn legacy_progress_updates_display_percent() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.push_line(PORT, "PROGRESS: 2.0 mL 40.0%");
    poll_until(&mut s, |s| s.display_percent() == 40.0);
    assert_eq!(s.status_text(), "Progress: 2.0 mL 40.0%");
}

#[test]
fn device_reported_error_aborts_dispense() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.push_line(PORT, "STATUS:ERROR");
    poll_until(&mut s, |s| s.state() == PumpState::Idle);
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::DispenseAbort {
            status: "ERROR".to_string()
        }]
    );
}

#[test]
fn status_query_round_trip() {
    let mock = MockConnector::new();
    mock.respond(PORT, "STATUS", &["STATUS:IDLE"]);
    let mut s = connected(&mock);
    s.get_status().unwrap();
    assert_eq!(mock.written(PORT), vec!["STATUS"]);
    poll_until(&mut s, |s| s.status_text() == "Status: IDLE");
    assert_eq!(s.state(), PumpState::Idle);
}

#[test]
fn status_query_requires_connection() {
    let mock = MockConnector::new();
    let mut s = session(&mock, &TestClock::new());
    assert!(matches!(s.get_status(), Err(PumpError::State(_))));
}

#[test]
fn device_hang_up_forces_disconnect() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.hang_up(PORT);
    poll_until(&mut s, |s| s.state() == PumpState::Disconnected);
    assert!(s.snapshot().is_zero());
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::Disconnect {
            reason: Some("device closed the connection".to_string())
        }]
    );
}

#[test]
fn write_failure_forces_disconnect() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    mock.fail_write(PORT, true);
    assert!(matches!(
        s.start_dispense(5.0, 10.0),
        Err(PumpError::Connection(_))
    ));
    assert_eq!(s.state(), PumpState::Disconnected);
    match kinds(&mut s).as_slice() {
        [EventKind::Disconnect { reason: Some(_) }] => {}
        other => panic!("unexpected events: {other:?}"),
    }
}

#[test]
fn disconnect_is_idempotent_and_resets_progress() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.push_line(PORT, "PROGRESS_DETAILED:60,3,2,0.3,0.2,10");
    poll_until(&mut s, |s| s.display_percent() == 60.0);

    s.disconnect();
    assert_eq!(s.state(), PumpState::Disconnected);
    assert_eq!(s.display_percent(), 0.0);
    assert!(s.snapshot().is_zero());
    assert_eq!(s.status_text(), "Ready");
    assert_eq!(kinds(&mut s), vec![EventKind::Disconnect { reason: None }]);

    s.disconnect();
    assert!(s.take_events().is_empty());
}

#[test]
fn reconnect_after_disconnect() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    s.disconnect();
    s.connect(PORT).unwrap();
    assert_eq!(mock.opened(PORT), 2);
    assert_eq!(s.state(), PumpState::Idle);
}

#[test]
fn rename_ignores_blank_and_unchanged_names() {
    let mock = MockConnector::new();
    let mut s = session(&mock, &TestClock::new());
    s.rename("  ");
    s.rename("Pump 1");
    assert!(s.take_events().is_empty());
    s.rename(" Left ");
    assert_eq!(s.name(), "Left");
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::Rename {
            old_name: "Pump 1".to_string(),
            new_name: "Left".to_string()
        }]
    );
}

#[test]
fn close_disconnects_then_announces() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    s.close();
    assert_eq!(
        kinds(&mut s),
        vec![EventKind::Disconnect { reason: None }, EventKind::Close]
    );
}

#[test]
fn configured_params_are_used() {
    let mock = MockConnector::new();
    let mut s = connected(&mock);
    assert!(matches!(
        s.set_dispense_params(0.0, 1.0),
        Err(PumpError::Validation(_))
    ));
    s.set_dispense_params(1.5, 3.0).unwrap();
    s.start_dispense_configured().unwrap();
    assert_eq!(mock.written(PORT), vec!["DISPENSE:1.5,3.0"]);
}

#[test]
fn comm_log_records_traffic() {
    let mock = MockConnector::new();
    let mut s = dispensing(&mock);
    mock.push_line(PORT, "STATUS:DISPENSING");
    poll_until(&mut s, |s| s.status_text() == "Dispensing: DISPENSING");
    let lines: Vec<&str> = s.comm_log().lines().collect();
    assert!(lines.iter().any(|l| l.ends_with("Sent: DISPENSE:5.0,10.0")));
    assert!(lines.iter().any(|l| l.ends_with("Received: STATUS:DISPENSING")));
    s.clear_comm_log();
    assert!(s.comm_log().is_empty());
}
