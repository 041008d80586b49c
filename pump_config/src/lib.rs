#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and dispense-plan parsing for the pump controller.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a valid config.
//! - The dispense-plan CSV loader enforces exact headers and validates each
//!   row before handing it to the registry.
use serde::Deserialize;
use serde::de::Deserializer;

/// Baud rates the pump firmware has shipped with. 9600 is the older sketch.
pub const SUPPORTED_BAUD: [u32; 2] = [9_600, 115_200];

/// Upper bound for `serial.read_timeout_ms`.
pub const MAX_READ_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SerialCfg {
    pub baud: u32,
    /// Wait after opening the port before traffic is trusted (the Arduino
    /// resets when the port opens).
    pub settle_ms: u64,
    /// Per-read timeout on the background reader (ms). Also accepts alias "timeout_ms".
    /// A disconnected port stays open until the reader's current read times
    /// out, so this is also how long a reconnect to the same port may see it busy.
    #[serde(alias = "timeout_ms")]
    pub read_timeout_ms: u64,
}

impl Default for SerialCfg {
    fn default() -> Self {
        Self {
            baud: 115_200,
            settle_ms: 2_000,
            read_timeout_ms: 100,
        }
    }
}

/// What the reader does when the report queue is full.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackpressureCfg {
    /// Reader waits until the control thread drains the queue.
    #[default]
    Block,
    /// Reader evicts the oldest queued report.
    DropOldest,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    /// Control loop tick (ms).
    pub poll_ms: u64,
    /// Bounded report queue per pump.
    pub queue_capacity: usize,
    pub backpressure: BackpressureCfg,
    /// Lines kept in each pump's communication log.
    pub comm_log_lines: usize,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            queue_capacity: 256,
            backpressure: BackpressureCfg::Block,
            comm_log_lines: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DispenseDefaults {
    pub volume_ml: f64,
    pub rate_ml_min: f64,
}

impl Default for DispenseDefaults {
    fn default() -> Self {
        Self {
            volume_ml: 5.0,
            rate_ml_min: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// One pump to manage. Volume and rate fall back to `[defaults]`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PumpEntry {
    pub name: String,
    pub port: String,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub volume_ml: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_number")]
    pub rate_ml_min: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub serial: SerialCfg,
    pub session: SessionCfg,
    pub defaults: DispenseDefaults,
    pub logging: Logging,
    pub pumps: Vec<PumpEntry>,
}

/// Accept integers as well as floats (`volume_ml = 5`), and empty CSV cells.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberToml {
    Float(f64),
    Int(i64),
    Text(String),
}

fn de_opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<NumberToml> = Option::deserialize(deserializer)?;
    match opt {
        None => Ok(None),
        Some(NumberToml::Float(v)) => Ok(Some(v)),
        Some(NumberToml::Int(v)) => Ok(Some(v as f64)),
        Some(NumberToml::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(NumberToml::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("expected a number, got {s:?}"))),
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl PumpEntry {
    /// Effective volume, falling back to the config defaults.
    pub fn volume_or(&self, defaults: &DispenseDefaults) -> f64 {
        self.volume_ml.unwrap_or(defaults.volume_ml)
    }

    /// Effective rate, falling back to the config defaults.
    pub fn rate_or(&self, defaults: &DispenseDefaults) -> f64 {
        self.rate_ml_min.unwrap_or(defaults.rate_ml_min)
    }

    fn validate(&self, idx: usize) -> eyre::Result<()> {
        if self.name.trim().is_empty() {
            eyre::bail!("pumps[{idx}].name must not be empty");
        }
        if self.port.trim().is_empty() {
            eyre::bail!("pumps[{idx}].port must not be empty");
        }
        if let Some(v) = self.volume_ml
            && !(v.is_finite() && v > 0.0)
        {
            eyre::bail!("pumps[{idx}].volume_ml must be > 0");
        }
        if let Some(r) = self.rate_ml_min
            && !(r.is_finite() && r > 0.0)
        {
            eyre::bail!("pumps[{idx}].rate_ml_min must be > 0");
        }
        Ok(())
    }
}

/// Load a dispense plan: one pump per row.
///
/// Expected headers:
/// name,port,volume_ml,rate_ml_min
///
/// Example:
/// name,port,volume_ml,rate_ml_min
/// Buffer A,/dev/ttyACM0,5.0,10.0
/// Buffer B,/dev/ttyACM1,,
pub fn load_plan_csv(path: &std::path::Path) -> eyre::Result<Vec<PumpEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open plan CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["name", "port", "volume_ml", "rate_ml_min"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "plan CSV must have headers 'name,port,volume_ml,rate_ml_min', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<PumpEntry>().enumerate() {
        match rec {
            Ok(row) => {
                row.validate(idx)
                    .map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("plan CSV {:?} has no pumps", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Serial
        if !SUPPORTED_BAUD.contains(&self.serial.baud) {
            eyre::bail!(
                "serial.baud must be one of {:?}, got {}",
                SUPPORTED_BAUD,
                self.serial.baud
            );
        }
        if self.serial.settle_ms > 60 * 1000 {
            eyre::bail!("serial.settle_ms is unreasonably large (>60s)");
        }
        if self.serial.read_timeout_ms == 0 {
            eyre::bail!("serial.read_timeout_ms must be >= 1");
        }
        if self.serial.read_timeout_ms > MAX_READ_TIMEOUT_MS {
            eyre::bail!("serial.read_timeout_ms must be <= {MAX_READ_TIMEOUT_MS}");
        }

        // Session
        if self.session.poll_ms == 0 {
            eyre::bail!("session.poll_ms must be >= 1");
        }
        if self.session.queue_capacity == 0 {
            eyre::bail!("session.queue_capacity must be >= 1");
        }
        if self.session.comm_log_lines == 0 {
            eyre::bail!("session.comm_log_lines must be >= 1");
        }

        // Defaults
        if !(self.defaults.volume_ml.is_finite() && self.defaults.volume_ml > 0.0) {
            eyre::bail!("defaults.volume_ml must be > 0");
        }
        if !(self.defaults.rate_ml_min.is_finite() && self.defaults.rate_ml_min > 0.0) {
            eyre::bail!("defaults.rate_ml_min must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Pumps
        for (idx, p) in self.pumps.iter().enumerate() {
            p.validate(idx)?;
        }
        for (i, a) in self.pumps.iter().enumerate() {
            if self.pumps[i + 1..].iter().any(|b| b.port == a.port) {
                eyre::bail!("pumps[{i}].port {:?} is used by more than one pump", a.port);
            }
        }

        Ok(())
    }
}
