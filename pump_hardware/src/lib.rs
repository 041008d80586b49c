//! Serial transport for Arduino syringe pumps.
//!
//! `SerialConnector` implements `pump_traits::Connector` on top of the
//! `serialport` crate. The opened port is cloned so the write half stays with
//! the control thread while the read half moves to the background reader.
pub mod error;
pub mod util;

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use pump_traits::{Connector, LineReader, LineWriter, Link};
use serialport::{SerialPort, SerialPortType};

use crate::error::HwError;
use crate::util::LineBuffer;

/// Default per-read timeout. Bounds how long the reader takes to notice a
/// stop request.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Opens real serial ports.
#[derive(Debug, Clone, Copy)]
pub struct SerialConnector {
    read_timeout: Duration,
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(DEFAULT_READ_TIMEOUT)
    }
}

impl SerialConnector {
    pub fn new(read_timeout: Duration) -> Self {
        Self {
            read_timeout: if read_timeout.is_zero() {
                DEFAULT_READ_TIMEOUT
            } else {
                read_timeout
            },
        }
    }

    /// Open `port` and split it into write/read halves.
    pub fn open_serial(
        &self,
        port: &str,
        baud: u32,
    ) -> error::Result<(SerialLineWriter, SerialLineReader)> {
        let handle = serialport::new(port, baud)
            .timeout(self.read_timeout)
            .open()
            .map_err(|source| HwError::Open {
                port: port.to_string(),
                source,
            })?;
        let read_half = handle.try_clone()?;
        let timeout_ms = u64::try_from(self.read_timeout.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(port, baud, timeout_ms, "serial port opened");
        Ok((
            SerialLineWriter { port: handle },
            SerialLineReader {
                port: read_half,
                framer: LineBuffer::default(),
            },
        ))
    }
}

impl Connector for SerialConnector {
    fn open(
        &self,
        port: &str,
        baud: u32,
    ) -> Result<Link, Box<dyn std::error::Error + Send + Sync>> {
        let (writer, reader) = self.open_serial(port, baud)?;
        Ok(Link {
            writer: Box::new(writer),
            reader: Box::new(reader),
        })
    }
}

/// Write half of an open serial port.
pub struct SerialLineWriter {
    port: Box<dyn SerialPort>,
}

impl LineWriter for SerialLineWriter {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');
        self.port.write_all(&buf).map_err(HwError::from)?;
        self.port.flush().map_err(HwError::from)?;
        Ok(())
    }
}

/// Read half of an open serial port with newline framing.
pub struct SerialLineReader {
    port: Box<dyn SerialPort>,
    framer: LineBuffer,
}

impl SerialLineReader {
    fn fill(&mut self) -> error::Result<()> {
        let mut chunk = [0u8; 256];
        match self.port.read(&mut chunk) {
            Ok(0) => Err(HwError::Eof),
            Ok(n) => {
                self.framer.push(&chunk[..n]);
                Ok(())
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => Ok(()),
            Err(e) => Err(HwError::Io(e)),
        }
    }
}

impl LineReader for SerialLineReader {
    fn read_line(&mut self) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }
        self.fill()?;
        Ok(self.framer.next_line())
    }
}

/// A serial port visible to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub description: String,
}

/// Enumerate serial ports the user can pick from.
pub fn list_ports() -> error::Result<Vec<PortInfo>> {
    let ports = serialport::available_ports()?;
    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|p| PortInfo {
            description: describe(&p.port_type),
            name: p.port_name,
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.as_deref().unwrap_or("USB serial");
            match usb.manufacturer.as_deref() {
                Some(m) => format!("{product} ({m}) [{:04x}:{:04x}]", usb.vid, usb.pid),
                None => format!("{product} [{:04x}:{:04x}]", usb.vid, usb.pid),
            }
        }
        SerialPortType::PciPort => "PCI serial".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth serial".to_string(),
        SerialPortType::Unknown => "serial".to_string(),
    }
}
