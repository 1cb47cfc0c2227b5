//! Byte layouts of the two protocol variants.
//!
//! A layout is only ever used as a whole. Moving a single offset silently
//! shifts the neighbouring fields, so offsets are never tuned individually.
//!
//! | field     | compact | extended |
//! |-----------|---------|----------|
//! | timestamp | 0       | 0        |
//! | identity  | 4..12   | 2..10    |
//! | longitude | 12      | 20       |
//! | latitude  | 16      | 24       |
//! | altitude  | -       | 28       |
//! | speed     | 20      | 18       |
//! | ignition  | 22      | 18       |
//!
//! The extended layout overlaps identity with the timestamp, and the ignition
//! byte with the high byte of the speed word. That's what devices in the field
//! send.

use std::{
    fmt::Display,
    str::FromStr,
};

/// Frames of at least this many bytes are decoded with the extended layout
/// when the variant is sniffed.
pub const EXTENDED_FRAME_LENGTH: usize = 30;

/// Offsets (in bytes) of every field inside a frame.
///
/// All multi-byte fields are big-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// `u32`, unix seconds
    pub timestamp: usize,
    /// 8 bytes, big-endian `u64`
    pub identity: usize,
    /// `i32`, degrees * 1e7
    pub longitude: usize,
    /// `i32`, degrees * 1e7
    pub latitude: usize,
    /// `u16`, meters * 10
    pub altitude: Option<usize>,
    /// `u16`, km/h * 10
    pub speed: usize,
    /// `u8`, bit 0 is the ignition flag
    pub ignition: usize,
    /// Length of a frame that contains all fields.
    pub frame_length: usize,
}

impl Layout {
    pub const COMPACT: Self = Self {
        timestamp: 0,
        identity: 4,
        longitude: 12,
        latitude: 16,
        altitude: None,
        speed: 20,
        ignition: 22,
        frame_length: 23,
    };

    pub const EXTENDED: Self = Self {
        timestamp: 0,
        identity: 2,
        longitude: 20,
        latitude: 24,
        altitude: Some(28),
        speed: 18,
        ignition: 18,
        frame_length: EXTENDED_FRAME_LENGTH,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    /// Identity, position and speed. No altitude.
    Compact,
    /// Longer frame with altitude.
    Extended,
}

impl ProtocolVariant {
    pub const fn layout(&self) -> &'static Layout {
        match self {
            Self::Compact => &Layout::COMPACT,
            Self::Extended => &Layout::EXTENDED,
        }
    }

    /// Guesses the variant from the frame length.
    ///
    /// The frame contents don't identify the variant, so this is all we can go
    /// by.
    pub fn sniff(frame: &[u8]) -> Self {
        if frame.len() >= EXTENDED_FRAME_LENGTH {
            Self::Extended
        }
        else {
            Self::Compact
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Extended => "extended",
        }
    }
}

impl Display for ProtocolVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the protocol variant is chosen for a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProtocolSelection {
    /// Sniff the variant from every frame's length.
    #[default]
    Auto,
    /// Decode every frame with the same variant.
    Fixed(ProtocolVariant),
}

impl ProtocolSelection {
    pub fn select(&self, frame: &[u8]) -> ProtocolVariant {
        match self {
            Self::Auto => ProtocolVariant::sniff(frame),
            Self::Fixed(variant) => *variant,
        }
    }
}

impl Display for ProtocolSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Fixed(variant) => write!(f, "{variant}"),
        }
    }
}

impl FromStr for ProtocolSelection {
    type Err = ProtocolSelectionFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "compact" => Ok(Self::Fixed(ProtocolVariant::Compact)),
            "extended" => Ok(Self::Fixed(ProtocolVariant::Extended)),
            _ => {
                Err(ProtocolSelectionFromStrError {
                    input: s.to_owned(),
                })
            }
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("Invalid protocol variant: {input} (expected auto, compact or extended)")]
pub struct ProtocolSelectionFromStrError {
    pub input: String,
}
