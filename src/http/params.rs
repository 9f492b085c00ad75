//! Query-string parameters of the HTTP API

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const DAY_SECONDS: i64 = 86_400;
const WEEK_SECONDS: i64 = 604_800;
const MONTH_SECONDS: i64 = 2_629_743;

/// Default number of co-occurrences returned
pub const DEFAULT_COOCCURRENCE_LIMIT: usize = 10;

/// Named popularity window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Period {
    #[default]
    Day,
    Week,
    Month,
    SixMonths,
}

impl Period {
    /// Window length in seconds
    pub fn seconds(self) -> i64 {
        match self {
            Self::Day => DAY_SECONDS,
            Self::Week => WEEK_SECONDS,
            Self::Month => MONTH_SECONDS,
            Self::SixMonths => 6 * MONTH_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPeriod(pub String);

impl fmt::Display for UnknownPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown period '{}', expected one of day, week, month, six-months",
            self.0
        )
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "six-months" | "sixmonths" => Ok(Self::SixMonths),
            _ => Err(UnknownPeriod(s.to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PopularParams {
    pub period: Option<String>,
}

impl PopularParams {
    pub fn period(&self) -> Result<Period, UnknownPeriod> {
        self.period
            .as_deref()
            .map(Period::from_str)
            .unwrap_or(Ok(Period::default()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CoOccurrenceParams {
    pub limit: Option<usize>,
}

impl CoOccurrenceParams {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_COOCCURRENCE_LIMIT)
    }
}
