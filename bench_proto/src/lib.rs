#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! VESC serial protocol codec.
//!
//! Framing: a short frame starts with 0x02 and an 8-bit payload length, a
//! long frame with 0x03 and a 16-bit length; both carry the payload, a
//! CRC16-XMODEM over the payload, and a 0x03 terminator. The first payload
//! byte is the command id.
//!
//! Only the three messages the bench needs are modelled: `SetDutyCycle`,
//! `SetRpm` (electrical RPM) and the `GetValues` request/reply. The reply
//! decoder also encodes, so the simulated controller in `bench_core::mocks`
//! can answer requests with real frames.

pub mod crc;
pub mod frame;
pub mod messages;

pub use frame::{ProtoError, decode, encode_frame};
pub use messages::{Command, Message, Request, Values, encode, encode_request};
