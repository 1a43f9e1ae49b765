pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Byte-oriented link to the motor controller.
///
/// Implementations wrap a serial handle (or a simulated one). A read that
/// times out must return `Ok(0)` rather than an error: the control loop
/// treats an empty read as "no reply this iteration" and any `Err` as a
/// link fault that tears the connection down.
pub trait Transport: Send {
    fn write_all(
        &mut self,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Read whatever is available into `buf`, up to the link's read timeout.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, Box<dyn std::error::Error + Send + Sync>>;

    /// Discard any pending input/output. Best-effort; callers ignore failures.
    fn clear_buffers(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
