use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kline intervals supported by the Bybit v5 market API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    TwoHour,
    FourHour,
    SixHour,
    TwelveHour,
    OneDay,
    OneWeek,
    OneMonth,
}

impl Timeframe {
    /// Returns the duration of this timeframe in minutes
    ///
    /// Months are counted as 30 days.
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::ThreeMin => 3,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::TwoHour => 120,
            Timeframe::FourHour => 240,
            Timeframe::SixHour => 360,
            Timeframe::TwelveHour => 720,
            Timeframe::OneDay => 1440,
            Timeframe::OneWeek => 10_080,
            Timeframe::OneMonth => 43_200,
        }
    }

    pub fn to_millis(&self) -> i64 {
        self.to_minutes() * 60_000
    }

    /// Converts to the Bybit `interval` query value
    pub fn to_bybit_interval(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1",
            Timeframe::ThreeMin => "3",
            Timeframe::FiveMin => "5",
            Timeframe::FifteenMin => "15",
            Timeframe::ThirtyMin => "30",
            Timeframe::OneHour => "60",
            Timeframe::TwoHour => "120",
            Timeframe::FourHour => "240",
            Timeframe::SixHour => "360",
            Timeframe::TwelveHour => "720",
            Timeframe::OneDay => "D",
            Timeframe::OneWeek => "W",
            Timeframe::OneMonth => "M",
        }
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    /// Accepts Bybit codes (`15`, `D`) as well as the usual short forms (`15m`, `1h`, `1d`).
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1" | "1m" | "1min" => Ok(Timeframe::OneMin),
            "3" | "3m" | "3min" => Ok(Timeframe::ThreeMin),
            "5" | "5m" | "5min" => Ok(Timeframe::FiveMin),
            "15" | "15m" | "15min" => Ok(Timeframe::FifteenMin),
            "30" | "30m" | "30min" => Ok(Timeframe::ThirtyMin),
            "60" | "1h" | "1hour" => Ok(Timeframe::OneHour),
            "120" | "2h" | "2hour" => Ok(Timeframe::TwoHour),
            "240" | "4h" | "4hour" => Ok(Timeframe::FourHour),
            "360" | "6h" | "6hour" => Ok(Timeframe::SixHour),
            "720" | "12h" | "12hour" => Ok(Timeframe::TwelveHour),
            "d" | "1d" | "1day" => Ok(Timeframe::OneDay),
            "w" | "1w" | "1week" => Ok(Timeframe::OneWeek),
            "m" | "1mo" | "1month" => Ok(Timeframe::OneMonth),
            _ => Err(anyhow!(
                "Invalid kline interval: '{}'. Valid options: 1, 3, 5, 15, 30, 60, 120, 240, 360, 720, D, W, M",
                s
            )),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bybit_interval())
    }
}
