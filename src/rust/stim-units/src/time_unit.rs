// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::duration::{Duration, Millisecond, milliseconds};

/// Milliseconds per unit.
pub const TIME_CONVERSION_TO_MILLIS: [(TimeUnit, f64); 4] = [
    (TimeUnit::Milliseconds, 1.0),
    (TimeUnit::Seconds, 1e3),
    (TimeUnit::Minutes, 60e3),
    (TimeUnit::Hours, 3600e3),
];

/// A user-selectable time unit.
///
/// Protocol records carry the unit next to the number, so conversions happen
/// at runtime rather than through the unit marker types of [`crate::duration`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
}

impl TimeUnit {
    pub const fn millis_factor(self) -> f64 {
        match self {
            TimeUnit::Milliseconds => TIME_CONVERSION_TO_MILLIS[0].1,
            TimeUnit::Seconds => TIME_CONVERSION_TO_MILLIS[1].1,
            TimeUnit::Minutes => TIME_CONVERSION_TO_MILLIS[2].1,
            TimeUnit::Hours => TIME_CONVERSION_TO_MILLIS[3].1,
        }
    }

    /// Convert `value` expressed in this unit to milliseconds.
    pub fn to_millis(self, value: f64) -> Duration<Millisecond> {
        milliseconds(value * self.millis_factor())
    }

    /// Express a millisecond duration in this unit.
    pub fn from_millis(self, duration: Duration<Millisecond>) -> f64 {
        duration.value() / self.millis_factor()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "milliseconds",
            TimeUnit::Seconds => "seconds",
            TimeUnit::Minutes => "minutes",
            TimeUnit::Hours => "hours",
        }
    }

    /// Short label used in plot axes and messages.
    pub const fn abbreviation(self) -> &'static str {
        match self {
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Seconds => "s",
            TimeUnit::Minutes => "min",
            TimeUnit::Hours => "hrs",
        }
    }
}

impl Display for TimeUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write!(f, "{}", self.abbreviation())
        } else {
            write!(f, "{}", self.as_str())
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown time unit '{0}'")]
pub struct ParseTimeUnitError(pub String);

impl FromStr for TimeUnit {
    type Err = ParseTimeUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "milliseconds" | "ms" => Ok(TimeUnit::Milliseconds),
            "seconds" | "s" => Ok(TimeUnit::Seconds),
            "minutes" | "min" => Ok(TimeUnit::Minutes),
            "hours" | "hrs" | "hr" => Ok(TimeUnit::Hours),
            other => Err(ParseTimeUnitError(other.to_string())),
        }
    }
}
