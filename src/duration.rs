use crate::error::{WmiError, WmiResult};
use crate::variant::Variant;
use serde::{de, ser};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// A wrapper type around `std::time::Duration`, which supports parsing from
/// the CIM interval format WMI uses (`ddddddddHHMMSS.mmmmmm:000`).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct WmiDuration(pub Duration);

impl FromStr for WmiDuration {
    type Err = WmiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 25 || !s.is_ascii() || &s[14..15] != "." || &s[21..] != ":000" {
            return Err(WmiError::ConvertDurationError(s.into()));
        }

        let days: u64 = s[..8].parse()?;
        let hours: u64 = s[8..10].parse()?;
        let minutes: u64 = s[10..12].parse()?;
        let seconds: u64 = s[12..14].parse()?;
        let micros: u64 = s[15..21].parse()?;

        let total_seconds = ((days * 24 + hours) * 60 + minutes) * 60 + seconds;

        let duration = Duration::from_secs(total_seconds) + Duration::from_micros(micros);

        Ok(Self(duration))
    }
}

impl TryFrom<Variant> for WmiDuration {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<Self> {
        match value {
            Variant::String(s) => s.parse(),
            other => Err(WmiError::ConvertVariantError(format!(
                "Variant {:?} cannot be turned into a WmiDuration",
                &other
            ))),
        }
    }
}

struct DurationVisitor;

impl<'de> de::Visitor<'de> for DurationVisitor {
    type Value = WmiDuration;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "an interval in WMI format or a number of microseconds")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        value.parse().map_err(|err| E::custom(format!("{}", err)))
    }

    fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WmiDuration(Duration::from_micros(value)))
    }
}

impl<'de> de::Deserialize<'de> for WmiDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }
}

impl ser::Serialize for WmiDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_u64(self.0.as_micros() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        let duration: WmiDuration = "00000001021530.500000:000".parse().unwrap();

        // 1 day, 2 hours, 15 minutes, 30.5 seconds.
        assert_eq!(duration.0.as_secs(), 94_530);
        assert_eq!(duration.0.as_micros(), 94_530_500_000);
    }

    #[test]
    fn it_fails_on_a_malformed_interval() {
        let res: Result<WmiDuration, _> = "00000001021530.500000".parse();
        assert!(res.is_err());

        let res: Result<WmiDuration, _> = "0000000102153x.500000:000".parse();
        assert!(res.is_err());
    }

    #[test]
    fn it_converts_from_a_string_variant() {
        let variant = Variant::String("00000000000001.000000:000".to_string());

        let duration = WmiDuration::try_from(variant).unwrap();

        assert_eq!(duration.0.as_secs(), 1);
    }

    #[test]
    fn it_round_trips_through_serde() {
        let duration: WmiDuration = "00000001021530.500000:000".parse().unwrap();

        let serialized = serde_json::to_string(&duration).unwrap();
        assert_eq!(serialized, "94530500000");

        let deserialized: WmiDuration = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, duration);
    }
}
