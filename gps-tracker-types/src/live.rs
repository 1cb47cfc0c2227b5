use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    DecodedRecord,
    util::is_zero,
};

/// Events published to live subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum LiveEvent {
    GpsData(DecodedRecord),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerToClientMessage {
    Event {
        #[serde(flatten)]
        event: LiveEvent,

        /// Number of events this subscriber missed because it fell behind.
        #[serde(rename = "droppedCount", default, skip_serializing_if = "is_zero")]
        dropped_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::{
        DecodedRecord,
        Imei,
        live::{
            LiveEvent,
            ServerToClientMessage,
        },
    };

    #[test]
    fn it_uses_the_fixed_event_name() {
        let message = ServerToClientMessage::Event {
            event: LiveEvent::GpsData(DecodedRecord {
                imei: Imei::from_u64(42),
                timestamp: Utc::now(),
                latitude: Some(35.0),
                longitude: Some(-120.5),
                altitude: None,
                speed_kph: 0.0,
                ignition_on: false,
                latitude_hex: None,
                longitude_hex: None,
                latitude_binary: None,
                longitude_binary: None,
                raw_data: String::new(),
            }),
            dropped_count: 0,
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"], "gps-data");
        assert_eq!(json["data"]["imei"], "42");
        assert!(json.get("droppedCount").is_none());
    }
}
