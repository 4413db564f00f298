use crate::error::{WmiError, WmiResult};
use crate::variant::Variant;
use chrono::prelude::*;
use serde::{de, ser};
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// A wrapper type around chrono's `DateTime<FixedOffset>`, which supports
/// parsing from the CIM_DATETIME string format WMI uses
/// (`yyyymmddHHMMSS.mmmmmm±UUU`, where `UUU` is the offset in minutes).
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
pub struct WmiDateTime(pub DateTime<FixedOffset>);

impl FromStr for WmiDateTime {
    type Err = WmiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 22 || !s.is_ascii() {
            return Err(WmiError::ConvertDatetimeError(s.into()));
        }

        let (datetime_part, tz_part) = s.split_at(21);

        let tz_min: i32 = tz_part.parse()?;
        let tz = FixedOffset::east_opt(tz_min * 60)
            .ok_or_else(|| WmiError::ConvertDatetimeError(s.into()))?;

        let naive = NaiveDateTime::parse_from_str(datetime_part, "%Y%m%d%H%M%S%.6f")?;
        let dt = tz
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| WmiError::ConvertDatetimeError(s.into()))?;

        Ok(Self(dt))
    }
}

impl TryFrom<Variant> for WmiDateTime {
    type Error = WmiError;

    fn try_from(value: Variant) -> WmiResult<Self> {
        match value {
            Variant::String(s) => s.parse(),
            other => Err(WmiError::ConvertVariantError(format!(
                "Variant {:?} cannot be turned into a WmiDateTime",
                &other
            ))),
        }
    }
}

struct DateTimeVisitor;

impl<'de> de::Visitor<'de> for DateTimeVisitor {
    type Value = WmiDateTime;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a timestamp in WMI format")
    }

    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        value.parse().map_err(|err| E::custom(format!("{}", err)))
    }
}

impl<'de> de::Deserialize<'de> for WmiDateTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_str(DateTimeVisitor)
    }
}

impl ser::Serialize for WmiDateTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: ser::Serializer,
    {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works_with_negative_offset() {
        let dt: WmiDateTime = "20190113200517.123456-180".parse().unwrap();

        assert_eq!(dt.0.to_rfc3339(), "2019-01-13T20:05:17.123456-03:00");
    }

    #[test]
    fn it_works_with_positive_offset() {
        let dt: WmiDateTime = "20190113200517.500000+060".parse().unwrap();

        assert_eq!(dt.0.to_rfc3339(), "2019-01-13T20:05:17.500+01:00");
    }

    #[test]
    fn it_fails_with_malformed_str() {
        let dt_res: Result<WmiDateTime, _> = "20190113200517".parse();

        assert!(dt_res.is_err());
    }

    #[test]
    fn it_fails_with_malformed_str_with_no_tz() {
        let dt_res: Result<WmiDateTime, _> = "20190113200517.000500".parse();

        assert!(dt_res.is_err());
    }

    #[test]
    fn it_converts_from_a_string_variant() {
        let variant = Variant::String("20190113200517.123456+000".to_string());

        let dt = WmiDateTime::try_from(variant).unwrap();

        assert_eq!(dt.0.to_rfc3339(), "2019-01-13T20:05:17.123456+00:00");
    }

    #[test]
    fn it_does_not_convert_from_other_tags() {
        let res = WmiDateTime::try_from(Variant::I8(0));

        assert!(res.is_err());
    }

    #[test]
    fn it_serializes_to_rfc3339() {
        let dt: WmiDateTime = "20190113200517.123456-180".parse().unwrap();

        let v = serde_json::to_string(&dt).unwrap();
        assert_eq!(v, "\"2019-01-13T20:05:17.123456-03:00\"");
    }

    #[test]
    fn it_deserializes_from_the_wmi_format() {
        let dt: WmiDateTime = serde_json::from_str("\"20190113200517.123456-180\"").unwrap();

        assert_eq!(dt.0.to_rfc3339(), "2019-01-13T20:05:17.123456-03:00");
    }
}
