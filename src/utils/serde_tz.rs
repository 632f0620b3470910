use chrono::{DateTime, FixedOffset};
use chrono_tz::{America::New_York, Tz};
use serde::{de::Error, Deserialize, Deserializer, Serializer};

// e.g. `2024-03-04 09:30:00-05:00`
const FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

pub fn deserialize<'de, D>(d: D) -> Result<DateTime<Tz>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    DateTime::<FixedOffset>::parse_from_str(&s, FORMAT)
        .map(|dt| dt.with_timezone(&New_York))
        .map_err(D::Error::custom)
}

pub fn serialize<S>(dt: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&dt.format(FORMAT))
}
