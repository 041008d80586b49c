//! Maps `Box<dyn Error>` from trait boundaries to typed `PumpError`.
//!
//! The traits in `pump_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those into `PumpError::Connection`, with an optional feature-gated
//! path for `pump_hardware::HwError` downcasting that produces clearer text.

use crate::error::PumpError;

/// Map a transport error raised while opening `port`.
pub fn map_open_error(port: &str, e: &(dyn std::error::Error + 'static)) -> PumpError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(pump_hardware::error::HwError::Open { source, .. }) =
            e.downcast_ref::<pump_hardware::error::HwError>()
        {
            return PumpError::Connection(format!("failed to open {port}: {source}"));
        }
    }
    PumpError::Connection(format!("failed to open {port}: {e}"))
}

/// Map a transport error raised by an established link.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> PumpError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<pump_hardware::error::HwError>() {
            return match hw {
                pump_hardware::error::HwError::Eof => {
                    PumpError::Connection("device closed the connection".to_string())
                }
                other => PumpError::Connection(other.to_string()),
            };
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("eof") {
        PumpError::Connection("device closed the connection".to_string())
    } else {
        PumpError::Connection(s)
    }
}

/// Text for a failed link, without the `connection error:` prefix.
pub fn link_failure_text(e: &(dyn std::error::Error + 'static)) -> String {
    match map_hw_error(e) {
        PumpError::Connection(msg) => msg,
        other => other.to_string(),
    }
}
