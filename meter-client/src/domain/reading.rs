use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// Longest digit string a reading may hold; keeps deltas inside `i64`.
pub const MAX_READING_DIGITS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterType {
    Water,
    Electric,
}

impl MeterType {
    pub fn as_str(self) -> &'static str {
        match self {
            MeterType::Water => "water",
            MeterType::Electric => "electric",
        }
    }
}

impl fmt::Display for MeterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown meter type '{0}', expected 'water' or 'electric'")]
pub struct UnknownMeterType(pub String);

impl FromStr for MeterType {
    type Err = UnknownMeterType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "water" => Ok(MeterType::Water),
            "electric" => Ok(MeterType::Electric),
            _ => Err(UnknownMeterType(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadingValueError {
    #[error("reading is empty")]
    Empty,
    #[error("reading contains non-digit character {0:?}")]
    NonDigit(char),
    #[error("reading has {0} digits, at most {MAX_READING_DIGITS} are supported")]
    TooLong(usize),
}

/// The digits shown on a meter face.
///
/// Stored exactly as entered so that leading zeros survive a round trip
/// through the store; arithmetic goes through [`ReadingValue::value`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadingValue(String);

impl ReadingValue {
    pub fn parse(s: &str) -> Result<Self, ReadingValueError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ReadingValueError::Empty);
        }
        if let Some(bad) = s.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ReadingValueError::NonDigit(bad));
        }
        if s.len() > MAX_READING_DIGITS {
            return Err(ReadingValueError::TooLong(s.len()));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> i64 {
        self.0
            .bytes()
            .fold(0i64, |acc, b| acc * 10 + i64::from(b - b'0'))
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ReadingValue {
    type Err = ReadingValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReadingValue::parse(s)
    }
}

impl Serialize for ReadingValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReadingValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ReadingValue::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// One (room, meter type) stream of readings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub room_identifier: String,
    pub meter_type: MeterType,
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_identifier, self.meter_type)
    }
}

/// A stored meter reading. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reading {
    pub id: i64,
    pub room_identifier: String,
    pub meter_type: MeterType,
    pub reading_value: ReadingValue,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
    pub evidence_reference: Option<String>,
    pub recorded_by: Option<String>,
}

impl Reading {
    pub fn partition(&self) -> PartitionKey {
        PartitionKey {
            room_identifier: self.room_identifier.clone(),
            meter_type: self.meter_type,
        }
    }

    pub fn in_partition(&self, key: &PartitionKey) -> bool {
        self.meter_type == key.meter_type && self.room_identifier == key.room_identifier
    }
}

/// A human-confirmed reading that has not been written yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReading {
    pub room_identifier: String,
    pub meter_type: MeterType,
    pub reading_value: ReadingValue,
    pub captured_at: OffsetDateTime,
    pub evidence_reference: Option<String>,
    pub recorded_by: Option<String>,
}

impl NewReading {
    pub fn partition(&self) -> PartitionKey {
        PartitionKey {
            room_identifier: self.room_identifier.clone(),
            meter_type: self.meter_type,
        }
    }

    pub fn into_reading(self, id: i64) -> Reading {
        Reading {
            id,
            room_identifier: self.room_identifier,
            meter_type: self.meter_type,
            reading_value: self.reading_value,
            captured_at: self.captured_at,
            evidence_reference: self.evidence_reference,
            recorded_by: self.recorded_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_value_keeps_leading_zeros() {
        let v = ReadingValue::parse("00420").unwrap();
        assert_eq!(v.as_str(), "00420");
        assert_eq!(v.value(), 420);
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"00420\"");
    }

    #[test]
    fn reading_value_rejects_garbage() {
        assert_eq!(ReadingValue::parse("  "), Err(ReadingValueError::Empty));
        assert_eq!(ReadingValue::parse("12a4"), Err(ReadingValueError::NonDigit('a')));
        assert_eq!(
            ReadingValue::parse("1234567890123456789"),
            Err(ReadingValueError::TooLong(19))
        );
    }

    #[test]
    fn meter_type_parses_case_insensitively() {
        assert_eq!("Electric".parse::<MeterType>().unwrap(), MeterType::Electric);
        assert_eq!(" water ".parse::<MeterType>().unwrap(), MeterType::Water);
        assert!("gas".parse::<MeterType>().is_err());
    }
}
