//! Message payloads: command ids, field packing and the `GetValues` reply.

use crate::frame::{ProtoError, encode_frame};

const COMM_GET_VALUES: u8 = 4;
const COMM_SET_DUTY: u8 = 5;
const COMM_SET_RPM: u8 = 8;

/// Fixed-point scale for the duty command payload.
const DUTY_SCALE: f64 = 100_000.0;

/// Setpoint commands the bench issues.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Fractional duty cycle, clamped by the caller to [0, 1].
    SetDutyCycle(f64),
    /// Electrical RPM.
    SetRpm(i32),
}

/// Poll requests. Only telemetry for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    GetValues,
}

/// Any message recovered from the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    GetValues,
    SetDutyCycle(f64),
    SetRpm(i32),
    Values(Values),
}

/// `GetValues` reply. Field order and scaling follow the VESC firmware;
/// payload bytes past the fault code are tolerated and ignored so newer
/// firmware revisions still decode.
#[derive(Debug, Clone, PartialEq)]
pub struct Values {
    pub temp_fet: f64,
    pub temp_motor: f64,
    pub avg_motor_current: f64,
    pub avg_input_current: f64,
    pub avg_id: f64,
    pub avg_iq: f64,
    pub duty_cycle_now: f64,
    /// Electrical RPM as reported by the controller.
    pub rpm: f64,
    pub v_in: f64,
    pub amp_hours: f64,
    pub amp_hours_charged: f64,
    pub watt_hours: f64,
    pub watt_hours_charged: f64,
    pub tachometer: i32,
    pub tachometer_abs: i32,
    pub fault_code: u8,
}

impl Default for Values {
    fn default() -> Self {
        Self {
            temp_fet: 0.0,
            temp_motor: 0.0,
            avg_motor_current: 0.0,
            avg_input_current: 0.0,
            avg_id: 0.0,
            avg_iq: 0.0,
            duty_cycle_now: 0.0,
            rpm: 0.0,
            v_in: 0.0,
            amp_hours: 0.0,
            amp_hours_charged: 0.0,
            watt_hours: 0.0,
            watt_hours_charged: 0.0,
            tachometer: 0,
            tachometer_abs: 0,
            fault_code: 0,
        }
    }
}

/// Encode a setpoint command into a complete frame.
#[must_use]
pub fn encode(cmd: &Command) -> Vec<u8> {
    let mut payload = Vec::with_capacity(5);
    match *cmd {
        Command::SetDutyCycle(duty) => {
            payload.push(COMM_SET_DUTY);
            let scaled = (duty * DUTY_SCALE).round() as i32;
            payload.extend_from_slice(&scaled.to_be_bytes());
        }
        Command::SetRpm(erpm) => {
            payload.push(COMM_SET_RPM);
            payload.extend_from_slice(&erpm.to_be_bytes());
        }
    }
    encode_frame(&payload)
}

/// Encode a poll request into a complete frame.
#[must_use]
pub fn encode_request(req: Request) -> Vec<u8> {
    match req {
        Request::GetValues => encode_frame(&[COMM_GET_VALUES]),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    id: u8,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], ProtoError> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(ProtoError::TruncatedPayload(self.id))?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn i16_scaled(&mut self, scale: f64) -> Result<f64, ProtoError> {
        Ok(f64::from(i16::from_be_bytes(self.take::<2>()?)) / scale)
    }

    fn i32_scaled(&mut self, scale: f64) -> Result<f64, ProtoError> {
        Ok(f64::from(i32::from_be_bytes(self.take::<4>()?)) / scale)
    }

    fn i32_raw(&mut self) -> Result<i32, ProtoError> {
        Ok(i32::from_be_bytes(self.take::<4>()?))
    }
}

impl Message {
    pub(crate) fn from_payload(payload: &[u8]) -> Result<Self, ProtoError> {
        let (&id, body) = payload.split_first().ok_or(ProtoError::EmptyPayload)?;
        match id {
            COMM_GET_VALUES if body.is_empty() => Ok(Message::GetValues),
            COMM_GET_VALUES => Values::from_body(body).map(Message::Values),
            COMM_SET_DUTY => {
                let mut r = Reader { buf: body, pos: 0, id };
                Ok(Message::SetDutyCycle(f64::from(r.i32_raw()?) / DUTY_SCALE))
            }
            COMM_SET_RPM => {
                let mut r = Reader { buf: body, pos: 0, id };
                Ok(Message::SetRpm(r.i32_raw()?))
            }
            other => Err(ProtoError::UnsupportedId(other)),
        }
    }
}

impl Values {
    fn from_body(body: &[u8]) -> Result<Self, ProtoError> {
        let mut r = Reader {
            buf: body,
            pos: 0,
            id: COMM_GET_VALUES,
        };
        Ok(Self {
            temp_fet: r.i16_scaled(10.0)?,
            temp_motor: r.i16_scaled(10.0)?,
            avg_motor_current: r.i32_scaled(100.0)?,
            avg_input_current: r.i32_scaled(100.0)?,
            avg_id: r.i32_scaled(100.0)?,
            avg_iq: r.i32_scaled(100.0)?,
            duty_cycle_now: r.i16_scaled(1000.0)?,
            rpm: r.i32_scaled(1.0)?,
            v_in: r.i16_scaled(10.0)?,
            amp_hours: r.i32_scaled(10_000.0)?,
            amp_hours_charged: r.i32_scaled(10_000.0)?,
            watt_hours: r.i32_scaled(10_000.0)?,
            watt_hours_charged: r.i32_scaled(10_000.0)?,
            tachometer: r.i32_raw()?,
            tachometer_abs: r.i32_raw()?,
            fault_code: r.take::<1>()?[0],
            // Trailing firmware-specific fields, if any, are ignored.
        })
    }

    /// Encode this reply into a complete frame (simulated controller path).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        fn push_i16(out: &mut Vec<u8>, v: f64, scale: f64) {
            out.extend_from_slice(&(((v * scale).round()) as i16).to_be_bytes());
        }
        fn push_i32(out: &mut Vec<u8>, v: f64, scale: f64) {
            out.extend_from_slice(&(((v * scale).round()) as i32).to_be_bytes());
        }
        let mut payload = Vec::with_capacity(55);
        payload.push(COMM_GET_VALUES);
        push_i16(&mut payload, self.temp_fet, 10.0);
        push_i16(&mut payload, self.temp_motor, 10.0);
        push_i32(&mut payload, self.avg_motor_current, 100.0);
        push_i32(&mut payload, self.avg_input_current, 100.0);
        push_i32(&mut payload, self.avg_id, 100.0);
        push_i32(&mut payload, self.avg_iq, 100.0);
        push_i16(&mut payload, self.duty_cycle_now, 1000.0);
        push_i32(&mut payload, self.rpm, 1.0);
        push_i16(&mut payload, self.v_in, 10.0);
        push_i32(&mut payload, self.amp_hours, 10_000.0);
        push_i32(&mut payload, self.amp_hours_charged, 10_000.0);
        push_i32(&mut payload, self.watt_hours, 10_000.0);
        push_i32(&mut payload, self.watt_hours_charged, 10_000.0);
        payload.extend_from_slice(&self.tachometer.to_be_bytes());
        payload.extend_from_slice(&self.tachometer_abs.to_be_bytes());
        payload.push(self.fault_code);
        encode_frame(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decode;

    #[test]
    fn duty_command_scales_by_100k() {
        let f = encode(&Command::SetDutyCycle(0.35));
        // payload: id + i32
        assert_eq!(f[2], COMM_SET_DUTY);
        assert_eq!(i32::from_be_bytes([f[3], f[4], f[5], f[6]]), 35_000);
    }

    #[test]
    fn get_values_request_is_bare_id() {
        let f = encode_request(Request::GetValues);
        assert_eq!(f[1], 1);
        assert_eq!(f[2], COMM_GET_VALUES);
        let (msg, _) = decode(&f).unwrap();
        assert_eq!(msg, Some(Message::GetValues));
    }

    #[test]
    fn values_reply_survives_the_wire() {
        let v = Values {
            rpm: 7000.0,
            avg_motor_current: 12.34,
            duty_cycle_now: 0.42,
            v_in: 48.2,
            temp_fet: 33.5,
            ..Values::default()
        };
        let (msg, consumed) = decode(&v.encode()).unwrap();
        let Some(Message::Values(back)) = msg else {
            panic!("expected a Values reply, got {msg:?}");
        };
        assert_eq!(consumed, v.encode().len());
        assert!((back.rpm - 7000.0).abs() < f64::EPSILON);
        assert!((back.avg_motor_current - 12.34).abs() < 1e-9);
        assert!((back.duty_cycle_now - 0.42).abs() < 1e-9);
        assert!((back.v_in - 48.2).abs() < 1e-9);
    }

    #[test]
    fn values_reply_tolerates_trailing_fields() {
        let mut frameless = Values {
            rpm: -250.0,
            ..Values::default()
        }
        .encode();
        // Rebuild the frame with four extra payload bytes (newer firmware).
        let payload_len = frameless[1] as usize;
        let mut payload = frameless[2..2 + payload_len].to_vec();
        payload.extend_from_slice(&[0, 0, 0, 9]);
        frameless = crate::frame::encode_frame(&payload);
        let (msg, _) = decode(&frameless).unwrap();
        let Some(Message::Values(v)) = msg else {
            panic!("expected Values");
        };
        assert!((v.rpm + 250.0).abs() < f64::EPSILON);
    }

    #[test]
    fn truncated_values_body_is_rejected() {
        let full = Values::default().encode();
        let payload_len = full[1] as usize;
        let short = crate::frame::encode_frame(&full[2..2 + payload_len - 4]);
        assert!(matches!(
            decode(&short),
            Err(ProtoError::TruncatedPayload(COMM_GET_VALUES))
        ));
    }

    #[test]
    fn negative_rpm_command_roundtrip() {
        let (msg, _) = decode(&encode(&Command::SetRpm(-3500))).unwrap();
        assert_eq!(msg, Some(Message::SetRpm(-3500)));
    }
}
