//! Subcommand implementations. Each returns `eyre::Result` so `main` can
//! humanize the error and pick the exit code in one place.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use pump_core::{
    DispenseRequest, EventKind, PumpEvent, PumpId, PumpRegistry, PumpSession, Report, Runner,
    RunnerSettings, SessionSettings, Tick,
};
use pump_core::{RunOutcome, conversions::request_for};
use pump_hardware::SerialConnector;
use pump_traits::{Clock, Connector, MonotonicClock};
use pump_ui::{PumpView, render_table};
use serde_json::json;

use crate::cli::json_mode;
use crate::error_fmt::RunError;

const BAR_WIDTH: usize = 30;

/// Pumps that reported `dispense_complete` at least once during a `run`.
/// A repeated completion from the same pump counts once.
#[derive(Debug, Default)]
struct Completions {
    done: HashSet<PumpId>,
}

impl Completions {
    fn record(&mut self, ev: &PumpEvent) {
        if ev.kind == EventKind::DispenseComplete {
            self.done.insert(ev.pump_id);
        }
    }

    fn count(&self) -> usize {
        self.done.len()
    }

    /// Pumps out of `total` that never completed.
    fn missing(&self, total: usize) -> usize {
        total.saturating_sub(self.done.len())
    }
}

/// Ctrl-C counter plus the flag the runner watches. The first interrupt is
/// left to the command to interpret; the second raises the flag.
struct Interrupts {
    hits: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
}

impl Interrupts {
    fn install() -> eyre::Result<Self> {
        let hits = Arc::new(AtomicUsize::new(0));
        let stop = Arc::new(AtomicBool::new(false));
        let (h, s) = (hits.clone(), stop.clone());
        ctrlc::set_handler(move || {
            let n = h.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= 2 {
                s.store(true, Ordering::SeqCst);
            }
        })
        .wrap_err("failed to install Ctrl-C handler")?;
        Ok(Self { hits, stop })
    }

    fn interrupted(&self) -> bool {
        self.hits.load(Ordering::SeqCst) > 0
    }
}

fn serial_stack(cfg: &pump_config::Config) -> (Arc<dyn Connector>, Arc<dyn Clock>) {
    let connector = SerialConnector::new(Duration::from_millis(cfg.serial.read_timeout_ms));
    (Arc::new(connector), Arc::new(MonotonicClock::new()))
}

fn emit(value: &serde_json::Value) {
    println!("{value}");
}

fn event_json(name: &str, ev: &PumpEvent) -> serde_json::Value {
    let mut v = json!({ "event": ev.event_type(), "pump": name });
    match &ev.kind {
        EventKind::Connect { port } => v["port"] = json!(port),
        EventKind::Disconnect { reason } => v["reason"] = json!(reason),
        EventKind::DispenseStart { request: Some(req) } => {
            v["volume_ml"] = json!(req.volume_ml());
            v["rate_ml_min"] = json!(req.rate_ml_min());
        }
        EventKind::DispenseCancel { confirmed } => v["confirmed"] = json!(confirmed),
        EventKind::DispenseAbort { status } => v["status"] = json!(status),
        EventKind::Rename { old_name, new_name } => {
            v["old_name"] = json!(old_name);
            v["new_name"] = json!(new_name);
        }
        EventKind::DispenseStart { request: None }
        | EventKind::DispenseComplete
        | EventKind::Close => {}
    }
    v
}

pub fn ports() -> eyre::Result<()> {
    let ports = pump_hardware::list_ports().wrap_err("failed to enumerate serial ports")?;
    if json_mode() {
        let list: Vec<_> = ports
            .iter()
            .map(|p| json!({ "name": p.name, "description": p.description }))
            .collect();
        emit(&json!({ "ports": list }));
        return Ok(());
    }
    if ports.is_empty() {
        println!("no serial ports found");
    }
    for p in &ports {
        println!("{}\t{}", p.name, p.description);
    }
    Ok(())
}

/// Connect, send one DISPENSE and follow the device until the cycle ends.
pub fn dispense(
    cfg: &pump_config::Config,
    port: &str,
    volume: Option<f64>,
    rate: Option<f64>,
    name: Option<&str>,
) -> eyre::Result<()> {
    // Reject bad parameters before the port is touched.
    let req = DispenseRequest::new(
        volume.unwrap_or(cfg.defaults.volume_ml),
        rate.unwrap_or(cfg.defaults.rate_ml_min),
    )?;
    let settings = SessionSettings::try_from(cfg)?;
    let (connector, clock) = serial_stack(cfg);
    let name = name.unwrap_or(port);
    let mut session = PumpSession::new(name, connector, clock.clone(), settings);

    session.connect(port)?;
    let interrupts = Interrupts::install()?;
    session.start_request(req)?;
    tracing::info!(
        pump = name,
        port,
        volume_ml = req.volume_ml(),
        rate_ml_min = req.rate_ml_min(),
        "dispense start"
    );

    let runner = Runner::new(clock, RunnerSettings::from(cfg));
    let mut result: Option<Result<(), RunError>> = None;
    let mut cancel_sent = false;
    let mut last_line = String::new();

    let outcome = runner.run(&mut session, &interrupts.stop, |s, events| {
        if interrupts.interrupted() && !cancel_sent {
            cancel_sent = true;
            if let Err(e) = s.cancel_dispense() {
                tracing::warn!(error = %e, "cancel failed");
            }
        }
        for ev in events {
            if json_mode() {
                emit(&event_json(s.name(), ev));
            }
            match &ev.kind {
                EventKind::DispenseComplete => result = Some(Ok(())),
                EventKind::DispenseCancel { confirmed: true } => {
                    result = Some(Err(RunError::Cancelled));
                }
                EventKind::DispenseAbort { status } => {
                    result = Some(Err(RunError::DeviceStopped(status.clone())));
                }
                EventKind::Disconnect { reason } => {
                    let reason = reason.clone().unwrap_or_else(|| "disconnected".into());
                    result = Some(Err(RunError::LinkLost(reason)));
                }
                _ => {}
            }
        }
        if !json_mode() {
            let line = PumpView::new(s.name(), s.model()).summary(BAR_WIDTH);
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
        }
        if result.is_some() { Tick::Done } else { Tick::Continue }
    });

    if json_mode() {
        let view = PumpView::new(session.name(), session.model());
        emit(&json!({ "pump": session.name(), "view": view }));
    }
    session.disconnect();

    match (outcome, result) {
        (RunOutcome::Finished, Some(Ok(()))) => {
            tracing::info!(pump = name, "dispense complete");
            Ok(())
        }
        (RunOutcome::Finished, Some(Err(e))) => Err(e.into()),
        // Second Ctrl-C: we dropped the link without waiting for the device.
        _ => Err(RunError::Cancelled.into()),
    }
}

/// Connect, send STATUS and print the first status report.
pub fn status(cfg: &pump_config::Config, port: &str, wait_ms: u64) -> eyre::Result<()> {
    let settings = SessionSettings::try_from(cfg)?;
    let (connector, clock) = serial_stack(cfg);
    let mut session = PumpSession::new(port, connector, clock.clone(), settings);
    session.connect(port)?;
    session.get_status()?;

    let stop = AtomicBool::new(false);
    let outcome = Runner::new(clock, RunnerSettings::from(cfg))
        .with_deadline(Duration::from_millis(wait_ms))
        .run(&mut session, &stop, |s, _| {
            match s.last_report() {
                Some(Report::Status(_) | Report::StatusDispensing(_)) => Tick::Done,
                _ => Tick::Continue,
            }
        });

    let raw = match session.last_report() {
        Some(Report::Status(st)) => Some(st.as_str().to_string()),
        Some(Report::StatusDispensing(text)) => Some(text.clone()),
        _ => None,
    };
    let view = PumpView::new(session.name(), session.model());
    session.disconnect();

    let Some(raw) = raw.filter(|_| outcome == RunOutcome::Finished) else {
        return Err(RunError::NoStatus(wait_ms).into());
    };
    if json_mode() {
        emit(&json!({ "port": port, "status": raw, "view": view }));
    } else {
        println!("{port}: {raw}");
        println!("{}", view.summary(BAR_WIDTH));
    }
    Ok(())
}

/// Dispense on every pump in the plan (or `[[pumps]]`) at once.
pub fn run(cfg: &pump_config::Config, plan: Option<&std::path::Path>) -> eyre::Result<()> {
    let entries = match plan {
        Some(path) => pump_config::load_plan_csv(path)?,
        None => cfg.pumps.clone(),
    };
    if entries.is_empty() {
        eyre::bail!("no pumps configured: add [[pumps]] to the config or pass --plan");
    }

    let settings = SessionSettings::try_from(cfg)?;
    let (connector, clock) = serial_stack(cfg);
    let mut registry = PumpRegistry::new(connector, clock.clone(), settings);

    for entry in &entries {
        let req = request_for(entry, &cfg.defaults)
            .wrap_err_with(|| format!("pumps[{}] has invalid dispense parameters", entry.name))?;
        let id = registry.add(&entry.name);
        let session = registry.get_mut(id)?;
        session.set_dispense_params(req.volume_ml(), req.rate_ml_min())?;
        if let Err(e) = session.connect(&entry.port) {
            tracing::warn!(pump = %entry.name, port = %entry.port, error = %e, "connect failed");
            if !json_mode() {
                eprintln!("{}: {e}", entry.name);
            }
        }
    }

    let total = registry.len();
    let started = registry.start_all();
    if started.succeeded.is_empty() {
        registry.shutdown();
        return Err(RunError::Incomplete { failed: total, total }.into());
    }

    let interrupts = Interrupts::install()?;
    let mut stop_sent = false;
    let mut completions = Completions::default();
    let outcome = Runner::new(clock, RunnerSettings::from(cfg)).run(
        &mut registry,
        &interrupts.stop,
        |reg, events| {
            if interrupts.interrupted() && !stop_sent {
                stop_sent = true;
                let out = reg.stop_all();
                tracing::info!(
                    stopped = out.succeeded.len(),
                    failed = out.failed.len(),
                    "stop all"
                );
            }
            for ev in events {
                let name = reg.get(ev.pump_id).map(|s| s.name().to_string()).unwrap_or_default();
                if json_mode() {
                    emit(&event_json(&name, ev));
                } else if !matches!(ev.kind, EventKind::Connect { .. }) {
                    println!("{name}: {}", ev.event_type());
                }
                completions.record(ev);
            }
            if reg.any_dispensing() { Tick::Continue } else { Tick::Done }
        },
    );
    if outcome == RunOutcome::Shutdown {
        tracing::warn!("second interrupt: disconnecting without waiting");
    }

    if json_mode() {
        let views: Vec<_> = registry
            .ids()
            .into_iter()
            .filter_map(|id| registry.get(id).ok())
            .map(|s| PumpView::new(s.name(), s.model()))
            .collect();
        emit(&json!({
            "pumps": views,
            "completed": completions.count(),
            "total": total,
        }));
    } else {
        let rows = registry.rows();
        print!("{}", render_table(rows.iter().map(|(_, r)| *r)));
    }
    registry.shutdown();

    match completions.missing(total) {
        0 => Ok(()),
        failed => Err(RunError::Incomplete { failed, total }.into()),
    }
}

/// Print a one-line summary of a config that already passed validation.
pub fn check(cfg: &pump_config::Config) -> eyre::Result<()> {
    if json_mode() {
        emit(&json!({
            "ok": true,
            "pumps": cfg.pumps.len(),
            "baud": cfg.serial.baud,
        }));
    } else {
        println!("config OK: {} pumps, baud {}", cfg.pumps.len(), cfg.serial.baud);
    }
    Ok(())
}
