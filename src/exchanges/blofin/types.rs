use crate::core::errors::ExchangeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// BloFin WebSocket request envelope
#[derive(Debug, Serialize, Clone)]
pub struct BlofinWsRequest<A> {
    pub op: String,   // Operation: subscribe, unsubscribe, login
    pub args: Vec<A>, // Operation arguments
}

/// BloFin WebSocket channel argument
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlofinWsChannel {
    pub channel: String, // Channel name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inst_id: Option<String>, // Instrument ID, absent for account-wide channels
}

/// BloFin WebSocket inbound frame
#[derive(Debug, Deserialize, Clone)]
pub struct BlofinWsResponse {
    pub event: Option<String>,        // Event type on control frames
    pub arg: Option<BlofinWsChannel>, // Channel info
    pub action: Option<String>,       // snapshot / update on data frames
    pub code: Option<Value>,          // Response code, string or number
    pub msg: Option<String>,          // Response message
    pub data: Option<Value>,          // Data payload
}

impl BlofinWsResponse {
    /// Response code normalized to a string
    pub fn code(&self) -> Option<String> {
        match &self.code {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Order book channel depth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBookDepth {
    /// 200 levels, snapshot then incremental updates
    #[default]
    Full,
    /// 5 levels, full snapshot on every push
    Top5,
}

impl OrderBookDepth {
    pub fn channel(self) -> &'static str {
        match self {
            Self::Full => "books",
            Self::Top5 => "books5",
        }
    }
}

impl FromStr for OrderBookDepth {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "books" => Ok(Self::Full),
            "books5" => Ok(Self::Top5),
            other => Err(ExchangeError::InvalidParameters(format!(
                "Invalid order book depth: {} (expected books or books5)",
                other
            ))),
        }
    }
}

/// Candlestick interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandleInterval {
    OneMinute,
    ThreeMinutes,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    SixHours,
    EightHours,
    TwelveHours,
    OneDay,
    ThreeDays,
    OneWeek,
    OneMonth,
}

impl CandleInterval {
    pub const ALL: [Self; 15] = [
        Self::OneMinute,
        Self::ThreeMinutes,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::FourHours,
        Self::SixHours,
        Self::EightHours,
        Self::TwelveHours,
        Self::OneDay,
        Self::ThreeDays,
        Self::OneWeek,
        Self::OneMonth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::ThreeMinutes => "3m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1H",
            Self::TwoHours => "2H",
            Self::FourHours => "4H",
            Self::SixHours => "6H",
            Self::EightHours => "8H",
            Self::TwelveHours => "12H",
            Self::OneDay => "1D",
            Self::ThreeDays => "3D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
        }
    }

    /// Channel name, e.g. `candle1H`
    pub fn channel(self) -> String {
        format!("candle{}", self.as_str())
    }
}

impl fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = ExchangeError;

    // Case matters: "1m" is a minute, "1M" a month
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| {
                ExchangeError::InvalidParameters(format!("Invalid candle interval: {}", s))
            })
    }
}
