//! Lenient field deserializers for producer output.
//!
//! Several producers write the same logical field with different JSON types
//! (epoch seconds, epoch milliseconds, RFC 3339 text; numeric or string chart
//! ids). These helpers fold them into one representation.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, de};

/// Epoch values above this are treated as milliseconds.
const MILLIS_THRESHOLD: f64 = 1.0e12;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Timestamp as epoch seconds.
pub fn timestamp<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(n) => n,
        NumberOrText::Text(s) => parse_text_timestamp(&s)
            .ok_or_else(|| de::Error::custom(format!("unrecognized timestamp '{s}'")))?,
    };

    if !seconds.is_finite() {
        return Err(de::Error::custom("timestamp is not finite"));
    }

    Ok(if seconds.abs() > MILLIS_THRESHOLD {
        seconds / 1000.0
    } else {
        seconds
    })
}

fn parse_text_timestamp(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(n) = s.parse::<f64>() {
        return Some(n);
    }

    let utc = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()?
        .and_utc();

    Some(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1.0e9)
}

/// Optional identifier that may be written as a number or a string.
pub fn opt_label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<NumberOrText>::deserialize(deserializer)?.map(|v| match v {
            NumberOrText::Number(n) if n.fract() == 0.0 => format!("{n:.0}"),
            NumberOrText::Number(n) => n.to_string(),
            NumberOrText::Text(s) => s,
        }),
    )
}

/// Optional sequence index; integral floats are accepted.
pub fn opt_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(n) if n.is_finite() && n.fract() == 0.0 => Ok(Some(n as i64)),
        Some(n) => Err(de::Error::custom(format!("index {n} is not an integer"))),
    }
}
