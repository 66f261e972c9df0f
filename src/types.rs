use crate::error::TradepulseError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Single OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn all() -> [Direction; 2] {
        [Direction::Long, Direction::Short]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

impl FromStr for Direction {
    type Err = TradepulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(Direction::Long),
            "short" => Ok(Direction::Short),
            other => Err(TradepulseError::Validation(format!(
                "Unknown direction: {}",
                other
            ))),
        }
    }
}

/// How a simulated trade resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitType {
    StopLoss,
    EarlyExit(String),
    TrailingStop,
    TimeExit,
    /// Series ended before any barrier resolved; excluded from training data
    Incomplete,
}

impl ExitType {
    pub fn as_label(&self) -> String {
        match self {
            ExitType::StopLoss => "stop_loss".to_string(),
            ExitType::EarlyExit(tier) => format!("early_exit_{}", tier),
            ExitType::TrailingStop => "trailing_stop".to_string(),
            ExitType::TimeExit => "time_exit".to_string(),
            ExitType::Incomplete => "incomplete".to_string(),
        }
    }

    pub fn from_label(s: &str) -> Result<ExitType, TradepulseError> {
        match s {
            "stop_loss" => Ok(ExitType::StopLoss),
            "trailing_stop" => Ok(ExitType::TrailingStop),
            "time_exit" => Ok(ExitType::TimeExit),
            "incomplete" => Ok(ExitType::Incomplete),
            other => match other.strip_prefix("early_exit_") {
                Some(tier) if !tier.is_empty() => Ok(ExitType::EarlyExit(tier.to_string())),
                _ => Err(TradepulseError::Validation(format!(
                    "Unknown exit type: {}",
                    other
                ))),
            },
        }
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_label())
    }
}

/// Candle timeframes the pipeline trains on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn all() -> [Timeframe; 4] {
        [Timeframe::M15, Timeframe::H1, Timeframe::H4, Timeframe::D1]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }

    /// Nominal spacing between consecutive candles
    pub fn step(&self) -> Duration {
        match self {
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }
}

impl FromStr for Timeframe {
    type Err = TradepulseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(Timeframe::M15),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(TradepulseError::Validation(format!(
                "Unsupported timeframe: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One supervised-learning target: the simulated outcome of a hypothetical
/// position opened at this candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    /// Continuous regression target; the realized return itself. Thresholding
    /// into buy/sell classes is a downstream modeling choice.
    pub score: f64,
    pub realized_return: f64,
    pub mfe: f64,
    pub mae: f64,
    pub bars_held: usize,
    pub exit_type: ExitType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_type_label_round_trip() {
        let cases = vec![
            ExitType::StopLoss,
            ExitType::EarlyExit("immediate".to_string()),
            ExitType::TrailingStop,
            ExitType::TimeExit,
            ExitType::Incomplete,
        ];

        for exit in cases {
            let parsed = ExitType::from_label(&exit.as_label()).unwrap();
            assert_eq!(parsed, exit);
        }
    }

    #[test]
    fn test_exit_type_rejects_unknown() {
        assert!(ExitType::from_label("take_profit").is_err());
        assert!(ExitType::from_label("early_exit_").is_err());
    }

    #[test]
    fn test_timeframe_parse() {
        assert_eq!("1h".parse::<Timeframe>().unwrap(), Timeframe::H1);
        assert!("3h".parse::<Timeframe>().is_err());
    }
}
