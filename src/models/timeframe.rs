use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ParseError;

/// Window over which prices changes and price histories are requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeframe {
    Live,
    #[default]
    OneDay,
    OneWeek,
    OneMonth,
    ThreeMonths,
    OneYear,
    All,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::Live => "live",
            Timeframe::OneDay => "1d",
            Timeframe::OneWeek => "1w",
            Timeframe::OneMonth => "1m",
            Timeframe::ThreeMonths => "3m",
            Timeframe::OneYear => "1y",
            Timeframe::All => "all",
        }
    }

    /// Number of days of history covered, `None` for the full history.
    pub fn days(&self) -> Option<u32> {
        match self {
            Timeframe::Live | Timeframe::OneDay => Some(1),
            Timeframe::OneWeek => Some(7),
            Timeframe::OneMonth => Some(30),
            Timeframe::ThreeMonths => Some(90),
            Timeframe::OneYear => Some(365),
            Timeframe::All => None,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Timeframe::Live),
            "1d" => Ok(Timeframe::OneDay),
            "1w" => Ok(Timeframe::OneWeek),
            "1m" => Ok(Timeframe::OneMonth),
            "3m" => Ok(Timeframe::ThreeMonths),
            "1y" => Ok(Timeframe::OneYear),
            "all" => Ok(Timeframe::All),
            _ => Err(ParseError::Timeframe(s.to_string())),
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
