use std::{
    fmt::{
        Debug,
        Display,
    },
    str::FromStr,
};

use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};

pub mod live;
pub(crate) mod util;

#[cfg(feature = "sqlx")]
mod sqlx;

/// Hardware identity of a tracking device.
///
/// This is the decimal rendering of the 8 byte identity block a device sends.
/// No checksum validation is done, so this is not necessarily a valid
/// 15-digit IMEI.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Imei(String);

impl Imei {
    /// Sentinel used when the identity block couldn't be read.
    pub const UNKNOWN: &'static str = "Unknown";

    pub fn from_u64(identity: u64) -> Self {
        Self(identity.to_string())
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_owned())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Imei {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Debug for Imei {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Imei({})", self.0)
    }
}

impl FromStr for Imei {
    type Err = ImeiFromStrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::UNKNOWN {
            Ok(Self::unknown())
        }
        else {
            let identity = s.parse::<u64>().map_err(|_| {
                ImeiFromStrError {
                    input: s.to_owned(),
                }
            })?;
            Ok(Self::from_u64(identity))
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("Invalid IMEI: {input}")]
pub struct ImeiFromStrError {
    pub input: String,
}

/// One decoded location report.
///
/// Every field is always present. Fields that couldn't be decoded, or were
/// implausible, carry their fallback value or are `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(::sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct DecodedRecord {
    pub imei: Imei,
    pub timestamp: DateTime<Utc>,

    /// Degrees
    pub latitude: Option<f64>,

    /// Degrees
    pub longitude: Option<f64>,

    /// Meters. Only sent by devices using the extended layout.
    pub altitude: Option<f64>,

    pub speed_kph: f64,
    pub ignition_on: bool,

    // diagnostics, these are never used to make decisions.
    pub latitude_hex: Option<String>,
    pub longitude_hex: Option<String>,
    pub latitude_binary: Option<String>,
    pub longitude_binary: Option<String>,
    pub raw_data: String,
}

#[cfg(test)]
mod tests {
    use chrono::{
        TimeZone,
        Utc,
    };

    use crate::{
        DecodedRecord,
        Imei,
    };

    #[test]
    fn it_renders_identity_in_decimal() {
        assert_eq!(Imei::from_u64(0x12d687).as_str(), "1234567");
        assert_eq!("1234567".parse::<Imei>().unwrap(), Imei::from_u64(1234567));
        assert!("Unknown".parse::<Imei>().unwrap().is_unknown());
        assert!("12ab".parse::<Imei>().is_err());
    }

    #[test]
    fn it_serializes_records_in_camel_case() {
        let record = DecodedRecord {
            imei: Imei::from_u64(1234567),
            timestamp: Utc.timestamp_opt(1699617408, 0).unwrap(),
            latitude: None,
            longitude: None,
            altitude: None,
            speed_kph: 1.0,
            ignition_on: true,
            latitude_hex: Some("7FFFFFFF".to_owned()),
            longitude_hex: None,
            latitude_binary: None,
            longitude_binary: None,
            raw_data: "00".to_owned(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["imei"], "1234567");
        assert_eq!(json["speedKph"], 1.0);
        assert_eq!(json["ignitionOn"], true);
        assert_eq!(json["latitude"], serde_json::Value::Null);
        assert_eq!(json["latitudeHex"], "7FFFFFFF");
        assert_eq!(json["timestamp"], "2023-11-10T11:56:48Z");
    }
}
