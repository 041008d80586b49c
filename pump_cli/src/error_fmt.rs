//! Human-readable error descriptions, exit codes and structured JSON errors.

use pump_core::PumpError;
use thiserror::Error;

/// How a command ended when the device, not our code, had the last word.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("dispense stopped by the device (status {0})")]
    DeviceStopped(String),
    #[error("dispense cancelled")]
    Cancelled,
    #[error("connection lost during dispense: {0}")]
    LinkLost(String),
    #[error("no status report within {0} ms")]
    NoStatus(u64),
    #[error("{failed} of {total} pumps did not complete")]
    Incomplete { failed: usize, total: usize },
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::Connection(msg) => format!(
                "What happened: Could not talk to the pump ({msg}).\nLikely causes: Wrong port name, USB cable unplugged, or the port is open in another program (e.g. a serial monitor).\nHow to fix: Run `pump ports` to list ports, reconnect the cable, and close other programs using the port."
            ),
            PumpError::Validation(msg) => format!(
                "What happened: Invalid dispense parameters ({msg}).\nLikely causes: Volume or rate is zero, negative, or not a number.\nHow to fix: Pass positive numbers, e.g. `pump dispense --port COM3 --volume 5.0 --rate 10.0`."
            ),
            PumpError::State(msg) => format!(
                "What happened: The pump is not in a state that allows this ({msg}).\nLikely causes: Not connected yet, or a dispense is already running.\nHow to fix: Wait for the current dispense to finish or cancel it, then retry."
            ),
            PumpError::Parse(e) => format!(
                "What happened: The pump sent a report that could not be decoded ({e}).\nLikely causes: Firmware version mismatch or line noise.\nHow to fix: Check the baud rate in [serial] and the firmware version."
            ),
            PumpError::UnknownPump(id) => format!(
                "What happened: No pump with id {id}.\nLikely causes: The pump was removed.\nHow to fix: Re-add the pump."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RunError>() {
        return match re {
            RunError::DeviceStopped(status) => format!(
                "What happened: The pump stopped before finishing (device status {status}).\nLikely causes: Syringe empty, end stop reached, or a firmware error.\nHow to fix: Check the syringe and mechanics, then start a new dispense."
            ),
            RunError::Cancelled => {
                "What happened: The dispense was cancelled before completion.\nLikely causes: Ctrl-C or a cancel from the device panel.\nHow to fix: Start a new dispense when ready.".to_string()
            }
            RunError::LinkLost(msg) => format!(
                "What happened: The connection dropped mid-dispense ({msg}).\nLikely causes: USB cable unplugged or the board reset.\nHow to fix: Reconnect and check the pump before dispensing again; the delivered volume is unknown."
            ),
            RunError::NoStatus(ms) => format!(
                "What happened: The pump did not answer STATUS within {ms} ms.\nLikely causes: Wrong baud rate, the board is still booting, or the wrong port.\nHow to fix: Increase --wait-ms or serial.settle_ms and check [serial] baud."
            ),
            RunError::Incomplete { failed, total } => format!(
                "What happened: {failed} of {total} pumps did not complete.\nLikely causes: See the table above and the log for each pump.\nHow to fix: Fix the failing pumps and rerun them individually with `pump dispense`."
            ),
        };
    }

    // String-based heuristics for errors coming from config loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("plan csv must have headers") {
        return "Invalid headers in dispense plan CSV. Expected 'name,port,volume_ml,rate_ml_min'."
            .to_string();
    }

    if lower.contains("config") || lower.contains("serial.") || lower.contains("pumps[") {
        let detail = err
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ");
        return format!(
            "What happened: Configuration is invalid ({detail}).\nLikely causes: Out-of-range or misspelled values in the TOML.\nHow to fix: Edit the config file and run `pump check`."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: connection 3, validation 4, state 5, device stop 6, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::Connection(_) => 3,
            PumpError::Validation(_) => 4,
            PumpError::State(_) => 5,
            PumpError::Parse(_) | PumpError::UnknownPump(_) => 1,
        };
    }
    if let Some(re) = err.downcast_ref::<RunError>() {
        return match re {
            RunError::LinkLost(_) => 3,
            RunError::DeviceStopped(_) | RunError::Cancelled => 6,
            RunError::NoStatus(_) | RunError::Incomplete { .. } => 1,
        };
    }
    1
}

/// Stable reason name for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::Connection(_) => "Connection",
            PumpError::Validation(_) => "Validation",
            PumpError::State(_) => "State",
            PumpError::Parse(_) => "Parse",
            PumpError::UnknownPump(_) => "UnknownPump",
        };
    }
    if let Some(re) = err.downcast_ref::<RunError>() {
        return match re {
            RunError::DeviceStopped(_) => "DeviceStopped",
            RunError::Cancelled => "Cancelled",
            RunError::LinkLost(_) => "LinkLost",
            RunError::NoStatus(_) => "NoStatus",
            RunError::Incomplete { .. } => "Incomplete",
        };
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
