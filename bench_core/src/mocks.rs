//! Test doubles for the transport.
//!
//! Exported unconditionally so downstream crates' integration tests can
//! drive the worker without hardware.

use bench_proto::{Message, Values};
use bench_traits::Transport;
use std::sync::{Arc, Mutex, PoisonError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// In-memory controller: answers every `GetValues` with the configured
/// reading and records each decoded setpoint command.
pub struct SimulatedVesc {
    values: Arc<Mutex<Values>>,
    sent: Arc<Mutex<Vec<Message>>>,
    pending: Vec<u8>,
}

/// Test-side view into a [`SimulatedVesc`] that was moved into a worker.
#[derive(Clone)]
pub struct SimHandles {
    pub values: Arc<Mutex<Values>>,
    pub sent: Arc<Mutex<Vec<Message>>>,
}

impl SimHandles {
    pub fn set_reading(&self, rpm: f64, current: f64) {
        let mut v = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        v.rpm = rpm;
        v.avg_motor_current = current;
    }

    #[must_use]
    pub fn commands(&self) -> Vec<Message> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SimulatedVesc {
    #[must_use]
    pub fn new(values: Values) -> (Self, SimHandles) {
        let values = Arc::new(Mutex::new(values));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let handles = SimHandles {
            values: Arc::clone(&values),
            sent: Arc::clone(&sent),
        };
        (
            Self {
                values,
                sent,
                pending: Vec::new(),
            },
            handles,
        )
    }
}

impl Transport for SimulatedVesc {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), BoxError> {
        let mut rest = bytes;
        while !rest.is_empty() {
            let (msg, consumed) = bench_proto::decode(rest)?;
            match msg {
                Some(Message::GetValues) => {
                    let reply = self
                        .values
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .encode();
                    self.pending.extend_from_slice(&reply);
                }
                Some(other) => self
                    .sent
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(other),
                None => break,
            }
            rest = &rest[consumed..];
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, BoxError> {
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    fn clear_buffers(&mut self) -> Result<(), BoxError> {
        self.pending.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Link whose reads and writes all fail, for fault-path tests.
#[derive(Debug, Default)]
pub struct FailingLink;

impl Transport for FailingLink {
    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), BoxError> {
        Err(Box::new(std::io::Error::other("link dropped")))
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BoxError> {
        Err(Box::new(std::io::Error::other("link dropped")))
    }

    fn clear_buffers(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Link that accepts everything and never replies.
#[derive(Debug, Default)]
pub struct SilentLink;

impl Transport for SilentLink {
    fn write_all(&mut self, _bytes: &[u8]) -> Result<(), BoxError> {
        Ok(())
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, BoxError> {
        Ok(0)
    }

    fn clear_buffers(&mut self) -> Result<(), BoxError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// One-shot opener handing out a pre-built transport on first call.
pub fn single_port_opener(
    link: impl Transport + 'static,
) -> impl Fn(&str) -> Result<Box<dyn Transport>, BoxError> + Send + Sync {
    let slot: Mutex<Option<Box<dyn Transport>>> = Mutex::new(Some(Box::new(link)));
    move |_name| {
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| "port already taken".into())
    }
}

/// Opener that always refuses, for connect-failure tests.
pub fn refusing_opener() -> impl Fn(&str) -> Result<Box<dyn Transport>, BoxError> + Send + Sync {
    |name: &str| Err(format!("no such port: {name}").into())
}
