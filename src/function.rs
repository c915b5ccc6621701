//! Measurement functions of the HP 34401A.
//!
//! Every function maps to exactly one `FUNC '<TYPE>'` command and to the
//! front-panel annunciators it lights. `FUNC?` responses are decoded back into
//! a [`MeasurementFunction`] through [`FromStr`].

use crate::error::DmmError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// SCPI query returning the active measurement function.
pub const FUNCTION_QUERY: &str = "FUNC?";

/// One of the ten measurement functions the meter supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementFunction {
    /// DC voltage.
    VoltageDc,
    /// AC voltage.
    VoltageAc,
    /// DC current.
    CurrentDc,
    /// AC current.
    CurrentAc,
    /// Two-wire resistance.
    Resistance2W,
    /// Four-wire resistance.
    Resistance4W,
    /// Continuity test.
    Continuity,
    /// Diode test.
    Diode,
    /// Frequency.
    Frequency,
    /// Period.
    Period,
}

impl MeasurementFunction {
    /// All functions, in command-table order.
    pub const ALL: [MeasurementFunction; 10] = [
        Self::VoltageDc,
        Self::VoltageAc,
        Self::CurrentDc,
        Self::CurrentAc,
        Self::Resistance2W,
        Self::Resistance4W,
        Self::Continuity,
        Self::Diode,
        Self::Frequency,
        Self::Period,
    ];

    /// SCPI function mnemonic placed inside `FUNC '...'`.
    pub fn scpi_type(self) -> &'static str {
        match self {
            Self::VoltageDc => "VOLT:DC",
            Self::VoltageAc => "VOLT:AC",
            Self::CurrentDc => "CURR:DC",
            Self::CurrentAc => "CURR:AC",
            Self::Resistance2W => "RES",
            Self::Resistance4W => "FRES",
            Self::Continuity => "CONT",
            Self::Diode => "DIOD",
            Self::Frequency => "FREQ",
            Self::Period => "PER",
        }
    }

    /// Full command selecting this function.
    pub fn command(self) -> String {
        format!("FUNC '{}'", self.scpi_type())
    }

    /// Front-panel caption.
    pub fn label(self) -> &'static str {
        match self {
            Self::VoltageDc => "Voltage DC",
            Self::VoltageAc => "Voltage AC",
            Self::CurrentDc => "Current DC",
            Self::CurrentAc => "Current AC",
            Self::Resistance2W => "Resistance 2W",
            Self::Resistance4W => "Resistance 4W",
            Self::Continuity => "Continuity",
            Self::Diode => "Diode",
            Self::Frequency => "Frequency",
            Self::Period => "Period",
        }
    }

    /// Annunciators lit while this function is selected.
    pub fn indicators(self) -> Indicators {
        Indicators::for_selection(Some(self))
    }
}

impl fmt::Display for MeasurementFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scpi_type())
    }
}

impl FromStr for MeasurementFunction {
    type Err = DmmError;

    /// Decode a `FUNC?` response or a user-supplied mnemonic.
    ///
    /// The meter answers with a quoted, newline-terminated mnemonic and uses
    /// the short forms `VOLT` and `CURR` for the DC functions.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mnemonic = s.trim().trim_matches('"').trim().to_ascii_uppercase();
        let function = match mnemonic.as_str() {
            "VOLT" | "VOLT:DC" => Self::VoltageDc,
            "VOLT:AC" => Self::VoltageAc,
            "CURR" | "CURR:DC" => Self::CurrentDc,
            "CURR:AC" => Self::CurrentAc,
            "RES" => Self::Resistance2W,
            "FRES" => Self::Resistance4W,
            "CONT" => Self::Continuity,
            "DIOD" => Self::Diode,
            "FREQ" => Self::Frequency,
            "PER" => Self::Period,
            _ => {
                return Err(DmmError::Parse {
                    response: s.to_string(),
                    expected: "a measurement function",
                })
            }
        };
        Ok(function)
    }
}

/// Front-panel annunciator flags derived from the selected function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicators {
    /// "4W" annunciator.
    pub four_wire: bool,
    /// Diode annunciator.
    pub diode: bool,
}

impl Indicators {
    /// Flags for a selection; no selection leaves every flag cleared.
    pub fn for_selection(selected: Option<MeasurementFunction>) -> Self {
        Self {
            four_wire: selected == Some(MeasurementFunction::Resistance4W),
            diode: selected == Some(MeasurementFunction::Diode),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        let commands: Vec<String> = MeasurementFunction::ALL
            .iter()
            .map(|f| f.command())
            .collect();
        assert_eq!(
            commands,
            vec![
                "FUNC 'VOLT:DC'",
                "FUNC 'VOLT:AC'",
                "FUNC 'CURR:DC'",
                "FUNC 'CURR:AC'",
                "FUNC 'RES'",
                "FUNC 'FRES'",
                "FUNC 'CONT'",
                "FUNC 'DIOD'",
                "FUNC 'FREQ'",
                "FUNC 'PER'",
            ]
        );
    }

    #[test]
    fn test_parse_trims_whitespace_and_quotes() {
        assert_eq!(
            "VOLT:AC ".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::VoltageAc
        );
        assert_eq!(
            "\"FRES\"\n".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::Resistance4W
        );
        assert_eq!(
            "diod".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::Diode
        );
    }

    #[test]
    fn test_parse_short_dc_forms() {
        assert_eq!(
            "\"VOLT\"".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::VoltageDc
        );
        assert_eq!(
            "\"CURR\"".parse::<MeasurementFunction>().unwrap(),
            MeasurementFunction::CurrentDc
        );
    }

    #[test]
    fn test_every_mnemonic_parses_back() {
        for function in MeasurementFunction::ALL {
            let parsed: MeasurementFunction = function.scpi_type().parse().unwrap();
            assert_eq!(parsed, function);
        }
    }

    #[test]
    fn test_unknown_function_is_parse_error() {
        let err = "TEMP".parse::<MeasurementFunction>().unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn test_indicator_flags() {
        for function in MeasurementFunction::ALL {
            let flags = function.indicators();
            assert_eq!(flags.four_wire, function == MeasurementFunction::Resistance4W);
            assert_eq!(flags.diode, function == MeasurementFunction::Diode);
        }
        assert_eq!(Indicators::for_selection(None), Indicators::default());
    }
}
