use chrono::{
    DateTime,
    Utc,
};
use gps_tracker_types::{
    DecodedRecord,
    Imei,
};

use crate::{
    field::{
        FallbackReason,
        Field,
        PositionReading,
        decode_identity,
        decode_ignition,
        decode_position,
        decode_speed,
        decode_timestamp,
    },
    identity::ConnectionContext,
    layout::{
        ProtocolSelection,
        ProtocolVariant,
    },
};

/// Decodes frames into records.
///
/// Decoding never fails. Every field that can't be decoded takes its fallback
/// value (see [`field`][crate::field]).
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameDecoder {
    selection: ProtocolSelection,
}

impl FrameDecoder {
    pub fn new(selection: ProtocolSelection) -> Self {
        Self { selection }
    }

    pub fn selection(&self) -> ProtocolSelection {
        self.selection
    }

    pub fn decode(&self, context: &mut ConnectionContext, frame: &[u8]) -> DecodedFrame {
        self.decode_at(context, frame, Utc::now())
    }

    /// Decodes a frame, with `now` as the current time.
    pub fn decode_at(
        &self,
        context: &mut ConnectionContext,
        frame: &[u8],
        now: DateTime<Utc>,
    ) -> DecodedFrame {
        let variant = self.selection.select(frame);
        let layout = variant.layout();

        // the identity must be settled before anything else, since it's fixed for
        // the rest of the connection.
        let imei = context
            .resolve_identity(|| decode_identity(frame, layout))
            .clone();

        DecodedFrame {
            variant,
            imei,
            timestamp: decode_timestamp(frame, layout, now),
            position: decode_position(frame, layout),
            speed: decode_speed(frame, layout),
            ignition: decode_ignition(frame, layout),
            raw_data: hex::encode(frame),
        }
    }
}

/// A decoded frame, with every field tagged as decoded or substituted.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFrame {
    pub variant: ProtocolVariant,
    pub imei: Field<Imei>,
    pub timestamp: Field<DateTime<Utc>>,
    pub position: PositionReading,
    /// km/h
    pub speed: Field<f64>,
    pub ignition: Field<bool>,
    /// Hex dump of the whole frame
    pub raw_data: String,
}

impl DecodedFrame {
    /// Fields that fell back, by name.
    pub fn fallbacks(&self) -> impl Iterator<Item = (&'static str, FallbackReason)> {
        [
            ("imei", self.imei.fallback_reason()),
            ("timestamp", self.timestamp.fallback_reason()),
            ("position", self.position.position.fallback_reason()),
            ("speed", self.speed.fallback_reason()),
            ("ignition", self.ignition.fallback_reason()),
        ]
        .into_iter()
        .filter_map(|(name, reason)| Some((name, reason?)))
    }

    pub fn into_record(self) -> DecodedRecord {
        let position = self.position.position.into_value();
        let raw = self.position.raw;

        DecodedRecord {
            imei: self.imei.into_value(),
            timestamp: self.timestamp.into_value(),
            latitude: position.map(|position| position.latitude),
            longitude: position.map(|position| position.longitude),
            altitude: position.and_then(|position| position.altitude),
            speed_kph: self.speed.into_value(),
            ignition_on: self.ignition.into_value(),
            latitude_hex: raw.map(|raw| raw.latitude_hex()),
            longitude_hex: raw.map(|raw| raw.longitude_hex()),
            latitude_binary: raw.map(|raw| raw.latitude_binary()),
            longitude_binary: raw.map(|raw| raw.longitude_binary()),
            raw_data: self.raw_data,
        }
    }
}
