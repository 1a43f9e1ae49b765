#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Serial transport for the bench.
//!
//! `SerialLink` wraps a `serialport` handle behind `bench_traits::Transport`.
//! A read timeout is reported as an empty read (`Ok(0)`), matching the
//! control loop's contract: no reply this iteration is not a link fault.

pub mod error;

use bench_traits::Transport;
use error::LinkError;
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    /// Open `port_name` at the given baud rate with a per-read timeout.
    pub fn open(port_name: &str, baud: u32, read_timeout: Duration) -> Result<Self, LinkError> {
        let port = serialport::new(port_name, baud)
            .timeout(read_timeout)
            .open()
            .map_err(|source| LinkError::Open {
                port: port_name.to_string(),
                source,
            })?;
        tracing::debug!(port = port_name, baud, "serial port opened");
        Ok(Self { port })
    }
}

impl Transport for SerialLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        self.port
            .write_all(bytes)
            .map_err(|e| Box::new(LinkError::Write(e)) as BoxError)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            // An expired read timeout means the controller had nothing to
            // say yet; the loop skips the sample rather than disconnecting.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Box::new(LinkError::Read(e)) as BoxError),
        }
    }

    fn clear_buffers(&mut self) -> Result<(), BoxError> {
        self.port
            .clear(ClearBuffer::All)
            .map_err(|e| Box::new(e) as BoxError)
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        self.port.flush().map_err(|e| Box::new(e) as BoxError)
    }
}

/// Ordered list of visible serial device names. Pure query, callable at any
/// time (including while a port is open).
pub fn list_ports() -> Result<Vec<String>, LinkError> {
    let ports = serialport::available_ports().map_err(LinkError::Enumerate)?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
