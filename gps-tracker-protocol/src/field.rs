//! Decoders for the individual fields of a frame.
//!
//! None of these fail. If a field can't be read, or its value is implausible,
//! the decoder returns a [`Field::Fallback`] with the substitute value and the
//! reason.

use bytes::Buf;
use chrono::{
    DateTime,
    Utc,
};
use gps_tracker_types::Imei;

use crate::layout::Layout;

/// Timestamps before this (2001-09-09) are considered bogus.
pub const MIN_PLAUSIBLE_TIMESTAMP: u32 = 1_000_000_000;

/// Raw coordinates are degrees * 1e7.
pub const COORDINATE_SCALE: f64 = 10_000_000.0;

/// Raw altitude is meters * 10.
pub const ALTITUDE_SCALE: f64 = 10.0;

/// Raw speed is km/h * 10.
pub const SPEED_SCALE: f64 = 10.0;

/// Speeds below this are GPS jitter of a parked vehicle, and are reported as 0.
pub const STATIONARY_THRESHOLD_KPH: f64 = 0.5;

/// A decoded field, tagged with whether it was actually decoded or substituted.
#[derive(Clone, Debug, PartialEq)]
pub enum Field<T> {
    Valid(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Field<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Valid(value) => value,
            Self::Fallback { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Valid(value) => value,
            Self::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn fallback_reason(&self) -> Option<FallbackReason> {
        match self {
            Self::Valid(_) => None,
            Self::Fallback { reason, .. } => Some(*reason),
        }
    }

    fn from_result(result: Result<T, FallbackReason>, fallback: impl FnOnce() -> T) -> Self {
        match result {
            Ok(value) => Self::Valid(value),
            Err(reason) => {
                Self::Fallback {
                    value: fallback(),
                    reason,
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FallbackReason {
    #[error(
        "expected {width} bytes at offset {offset}, but frame is only {frame_length} bytes long"
    )]
    Truncated {
        offset: usize,
        width: usize,
        frame_length: usize,
    },

    #[error("value out of plausible range")]
    OutOfRange,
}

/// Returns the `width` bytes at `offset`, as a [`Buf`] to read from.
fn slice(frame: &[u8], offset: usize, width: usize) -> Result<&[u8], FallbackReason> {
    offset
        .checked_add(width)
        .and_then(|end| frame.get(offset..end))
        .ok_or(FallbackReason::Truncated {
            offset,
            width,
            frame_length: frame.len(),
        })
}

/// Decodes the device's timestamp.
///
/// Falls back to `now` if the timestamp is before [`MIN_PLAUSIBLE_TIMESTAMP`]
/// or after `now`.
pub fn decode_timestamp(frame: &[u8], layout: &Layout, now: DateTime<Utc>) -> Field<DateTime<Utc>> {
    let result = slice(frame, layout.timestamp, 4).and_then(|mut buffer| {
        let seconds = buffer.get_u32();
        if seconds < MIN_PLAUSIBLE_TIMESTAMP || i64::from(seconds) > now.timestamp() {
            return Err(FallbackReason::OutOfRange);
        }
        DateTime::from_timestamp(seconds.into(), 0).ok_or(FallbackReason::OutOfRange)
    });

    Field::from_result(result, || now)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Position {
    /// Degrees
    pub latitude: f64,
    /// Degrees
    pub longitude: f64,
    /// Meters
    pub altitude: Option<f64>,
}

impl Position {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// The unscaled coordinates, as sent by the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawPosition {
    pub latitude: i32,
    pub longitude: i32,
}

impl RawPosition {
    pub fn latitude_hex(&self) -> String {
        render_hex(self.latitude)
    }

    pub fn longitude_hex(&self) -> String {
        render_hex(self.longitude)
    }

    pub fn latitude_binary(&self) -> String {
        render_binary(self.latitude)
    }

    pub fn longitude_binary(&self) -> String {
        render_binary(self.longitude)
    }
}

// negative values are rendered as sign and magnitude, not two's complement.

fn render_hex(value: i32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{:X}", value.unsigned_abs())
}

fn render_binary(value: i32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    format!("{sign}{:032b}", value.unsigned_abs())
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionReading {
    /// `None` if the frame is truncated or the position is out of range.
    pub position: Field<Option<Position>>,

    /// `None` if any part of the position couldn't be read. Kept for
    /// out-of-range coordinates.
    pub raw: Option<RawPosition>,
}

/// Decodes longitude, latitude and (if the layout has it) altitude.
pub fn decode_position(frame: &[u8], layout: &Layout) -> PositionReading {
    let raw = slice(frame, layout.longitude, 4).and_then(|mut longitude| {
        let mut latitude = slice(frame, layout.latitude, 4)?;
        Ok(RawPosition {
            latitude: latitude.get_i32(),
            longitude: longitude.get_i32(),
        })
    });

    let raw = match raw {
        Ok(raw) => raw,
        Err(reason) => {
            return PositionReading {
                position: Field::Fallback {
                    value: None,
                    reason,
                },
                raw: None,
            };
        }
    };

    let altitude = layout
        .altitude
        .map(|offset| {
            slice(frame, offset, 2).map(|mut buffer| f64::from(buffer.get_u16()) / ALTITUDE_SCALE)
        })
        .transpose();

    // a read fault anywhere in the position drops all of it, renderings included
    let altitude = match altitude {
        Ok(altitude) => altitude,
        Err(reason) => {
            return PositionReading {
                position: Field::Fallback {
                    value: None,
                    reason,
                },
                raw: None,
            };
        }
    };

    let position = Position {
        latitude: f64::from(raw.latitude) / COORDINATE_SCALE,
        longitude: f64::from(raw.longitude) / COORDINATE_SCALE,
        altitude,
    };
    let position = if position.is_valid() {
        Ok(Some(position))
    }
    else {
        Err(FallbackReason::OutOfRange)
    };

    PositionReading {
        position: Field::from_result(position, || None),
        raw: Some(raw),
    }
}

/// Decodes the speed in km/h.
pub fn decode_speed(frame: &[u8], layout: &Layout) -> Field<f64> {
    let result = slice(frame, layout.speed, 2).map(|mut buffer| {
        let speed = f64::from(buffer.get_u16()) / SPEED_SCALE;
        if speed < STATIONARY_THRESHOLD_KPH {
            0.0
        }
        else {
            speed
        }
    });

    Field::from_result(result, || 0.0)
}

/// Decodes the ignition flag. Falls back to off.
pub fn decode_ignition(frame: &[u8], layout: &Layout) -> Field<bool> {
    let result = slice(frame, layout.ignition, 1).map(|mut buffer| buffer.get_u8() & 1 != 0);
    Field::from_result(result, || false)
}

/// Decodes the device identity. Falls back to [`Imei::UNKNOWN`].
pub fn decode_identity(frame: &[u8], layout: &Layout) -> Field<Imei> {
    let result =
        slice(frame, layout.identity, 8).map(|mut buffer| Imei::from_u64(buffer.get_u64()));
    Field::from_result(result, Imei::unknown)
}
