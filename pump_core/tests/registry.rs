use std::sync::Arc;
use std::time::{Duration, Instant};

use pump_core::mocks::MockConnector;
use pump_core::{EventKind, PumpError, PumpEvent, PumpId, PumpRegistry, PumpState, SessionSettings};
use pump_traits::clock::test_clock::TestClock;

fn registry(mock: &MockConnector) -> PumpRegistry {
    PumpRegistry::new(
        Arc::new(mock.clone()),
        Arc::new(TestClock::new()),
        SessionSettings::default(),
    )
}

/// Add and connect one pump per port.
fn with_pumps(mock: &MockConnector, ports: &[&str]) -> (PumpRegistry, Vec<PumpId>) {
    let mut reg = registry(mock);
    let ids: Vec<PumpId> = ports
        .iter()
        .map(|port| {
            let id = reg.add("");
            reg.get_mut(id).unwrap().connect(port).unwrap();
            id
        })
        .collect();
    reg.poll();
    (reg, ids)
}

fn poll_until(
    reg: &mut PumpRegistry,
    mut done: impl FnMut(&PumpRegistry) -> bool,
) -> Vec<PumpEvent> {
    let start = Instant::now();
    let mut events = Vec::new();
    loop {
        events.extend(reg.poll());
        if done(reg) {
            return events;
        }
        assert!(start.elapsed() < Duration::from_secs(2), "condition not reached");
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn blank_names_get_sequential_defaults() {
    let mock = MockConnector::new();
    let mut reg = registry(&mock);
    let a = reg.add("");
    let b = reg.add("Left");
    let c = reg.add("  ");
    assert_eq!(reg.get(a).unwrap().name(), "Pump 1");
    assert_eq!(reg.get(b).unwrap().name(), "Left");
    assert_eq!(reg.get(c).unwrap().name(), "Pump 3");
    assert_eq!(reg.ids(), vec![a, b, c]);
}

#[test]
fn unknown_ids_are_reported() {
    let mock = MockConnector::new();
    let mut reg = registry(&mock);
    let id = reg.add("x");
    reg.remove(id).unwrap();
    assert_eq!(reg.remove(id), Err(PumpError::UnknownPump(id)));
    assert!(matches!(reg.get(id), Err(PumpError::UnknownPump(_))));
}

#[test]
fn remove_closes_the_session_and_drops_the_row() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1", "COM2"]);
    reg.remove(ids[0]).unwrap();
    let kinds: Vec<&'static str> = reg.poll().iter().map(PumpEvent::event_type).collect();
    assert_eq!(kinds, vec!["disconnect", "close"]);
    assert_eq!(reg.ids(), vec![ids[1]]);
    assert_eq!(reg.rows().len(), 1);
}

#[test]
fn rows_follow_events() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1"]);
    {
        let rows = reg.rows();
        let (_, row) = rows[0];
        assert_eq!(row.name, "Pump 1");
        assert_eq!(row.status, "Connected");
        assert_eq!(row.port, "COM1");
        assert_eq!(row.activity, "Ready");
    }

    reg.start_all();
    assert_eq!(reg.rows()[0].1.activity, "Dispensing 5.0mL");
    assert_eq!(reg.rows()[0].1.status, "Dispensing");

    mock.push_line("COM1", "DISPENSE_COMPLETE");
    poll_until(&mut reg, |r| {
        r.get(ids[0]).unwrap().state() == PumpState::Idle
    });
    assert_eq!(reg.rows()[0].1.activity, "Complete");
    assert_eq!(reg.rows()[0].1.status, "Connected");

    reg.get_mut(ids[0]).unwrap().rename("Left");
    reg.poll();
    assert_eq!(reg.rows()[0].1.name, "Left");
}

#[test]
fn start_all_uses_each_pumps_parameters() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1", "COM2"]);
    reg.get_mut(ids[1]).unwrap().set_dispense_params(2.5, 4.0).unwrap();
    let out = reg.start_all();
    assert!(out.all_ok());
    assert_eq!(out.succeeded, ids);
    assert_eq!(mock.written("COM1"), vec!["DISPENSE:5.0,10.0"]);
    assert_eq!(mock.written("COM2"), vec!["DISPENSE:2.5,4.0"]);
    assert!(reg.any_dispensing());
}

#[test]
fn start_all_skips_disconnected_and_continues_past_failures() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1", "COM2", "COM3"]);
    let offline = reg.add("offline");
    mock.fail_write("COM2", true);

    let out = reg.start_all();
    assert_eq!(out.attempted(), 3);
    assert_eq!(out.succeeded, vec![ids[0], ids[2]]);
    assert_eq!(out.failed.len(), 1);
    assert_eq!(out.failed[0].0, ids[1]);
    assert!(matches!(out.failed[0].1, PumpError::Connection(_)));
    assert_eq!(reg.get(ids[1]).unwrap().state(), PumpState::Disconnected);
    assert_eq!(reg.get(offline).unwrap().state(), PumpState::Disconnected);
    assert!(
        reg.system_log()
            .lines()
            .any(|l| l.contains("1 failed"))
    );
}

#[test]
fn stop_all_cancels_only_dispensing_pumps() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1", "COM2"]);
    reg.get_mut(ids[0]).unwrap().start_dispense(1.0, 1.0).unwrap();
    let out = reg.stop_all();
    assert_eq!(out.succeeded, vec![ids[0]]);
    assert_eq!(mock.written("COM1").last().map(String::as_str), Some("CANCEL"));
    assert!(mock.written("COM2").is_empty());

    let events = reg.poll();
    assert!(events.iter().any(|e| e.pump_id == ids[0]
        && e.kind == EventKind::DispenseCancel { confirmed: false }));
}

#[test]
fn shutdown_disconnects_everything() {
    let mock = MockConnector::new();
    let (mut reg, ids) = with_pumps(&mock, &["COM1", "COM2"]);
    reg.start_all();
    reg.shutdown();
    for id in &ids {
        assert_eq!(reg.get(*id).unwrap().state(), PumpState::Disconnected);
    }
    let disconnects = reg
        .poll()
        .iter()
        .filter(|e| e.event_type() == "disconnect")
        .count();
    assert_eq!(disconnects, 2);
    assert!(reg.rows().iter().all(|(_, r)| r.status == "Disconnected"));
}

#[test]
fn system_log_can_be_cleared() {
    let mock = MockConnector::new();
    let mut reg = registry(&mock);
    reg.add("");
    assert!(!reg.system_log().is_empty());
    reg.clear_system_log();
    assert!(reg.system_log().is_empty());
}
