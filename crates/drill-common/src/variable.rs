//! The meteorological variables extracted by the drill process.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three variables sampled at every forecast hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    Temperature,
    WindSpeed,
    WindDirection,
}

impl Variable {
    /// All variables in output column order.
    pub const ALL: [Variable; 3] = [
        Variable::Temperature,
        Variable::WindSpeed,
        Variable::WindDirection,
    ];

    /// Key used in output documents and configuration.
    pub fn key(&self) -> &'static str {
        match self {
            Variable::Temperature => "temperature",
            Variable::WindSpeed => "wind_speed",
            Variable::WindDirection => "wind_direction",
        }
    }

    /// Default parameter code in the raster index.
    pub fn default_code(&self) -> &'static str {
        match self {
            Variable::Temperature => "TT",
            Variable::WindSpeed => "WSPD",
            Variable::WindDirection => "WD",
        }
    }

    pub fn units(&self) -> &'static str {
        match self {
            Variable::Temperature => "degrees C",
            Variable::WindSpeed => "m/s",
            Variable::WindDirection => "Wind direction (from which blowing) [deg true]",
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for Variable {
    type Err = VariableParseError;

    /// Accepts output keys ("wind_speed") and the default codes ("WSPD").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL
            .into_iter()
            .find(|v| v.key().eq_ignore_ascii_case(s) || v.default_code().eq_ignore_ascii_case(s))
            .ok_or_else(|| VariableParseError::Unknown(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VariableParseError {
    #[error("Unknown variable: {0}")]
    Unknown(String),
}
