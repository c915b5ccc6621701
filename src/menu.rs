//! Front-panel key layout with the Shift toggle.
//!
//! The panel shows one of two fourteen-key option sets. Shift flips between
//! them; every other key either selects a measurement function or is a
//! front-panel action with no instrument command behind it. The math and
//! menu keys (dB, dBm, Menu On/Off, Recall) also turn off the 4W and diode
//! annunciators.

use crate::function::MeasurementFunction;
use serde::{Deserialize, Serialize};

/// A key on the front panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum PanelKey {
    // Primary set
    VoltageAc,
    CurrentAc,
    Resistance2W,
    Frequency,
    Continuity,
    Null,
    MinMax,
    Left,
    Right,
    Down,
    Up,
    AutoManual,
    Single,
    // Secondary set
    VoltageDc,
    CurrentDc,
    Resistance4W,
    Period,
    Diode,
    Db,
    Dbm,
    MenuOnOff,
    Recall,
    Digits4,
    Digits5,
    Digits6,
    AutoHold,
    // Both sets
    Shift,
}

/// Unshifted key set, in panel order.
pub const PRIMARY_KEYS: [PanelKey; 14] = [
    PanelKey::VoltageAc,
    PanelKey::CurrentAc,
    PanelKey::Resistance2W,
    PanelKey::Frequency,
    PanelKey::Continuity,
    PanelKey::Null,
    PanelKey::MinMax,
    PanelKey::Left,
    PanelKey::Right,
    PanelKey::Down,
    PanelKey::Up,
    PanelKey::AutoManual,
    PanelKey::Single,
    PanelKey::Shift,
];

/// Shifted key set, in panel order.
pub const SECONDARY_KEYS: [PanelKey; 14] = [
    PanelKey::VoltageDc,
    PanelKey::CurrentDc,
    PanelKey::Resistance4W,
    PanelKey::Period,
    PanelKey::Diode,
    PanelKey::Db,
    PanelKey::Dbm,
    PanelKey::MenuOnOff,
    PanelKey::Recall,
    PanelKey::Digits4,
    PanelKey::Digits5,
    PanelKey::Digits6,
    PanelKey::AutoHold,
    PanelKey::Shift,
];

impl PanelKey {
    /// Key caption.
    pub fn label(self) -> &'static str {
        match self.function() {
            Some(function) => function.label(),
            None => match self {
                Self::Null => "Null",
                Self::MinMax => "Min/Max",
                Self::Left => "◀",
                Self::Right => "▶",
                Self::Down => "▼",
                Self::Up => "▲",
                Self::AutoManual => "Auto/Man",
                Self::Single => "Single",
                Self::Db => "dB",
                Self::Dbm => "dBm",
                Self::MenuOnOff => "Menu On/Off",
                Self::Recall => "Recall",
                Self::Digits4 => "4 Digits",
                Self::Digits5 => "5 Digits",
                Self::Digits6 => "6 Digits",
                Self::AutoHold => "Auto/Hold",
                _ => "Shift",
            },
        }
    }

    /// Measurement function selected by this key, if any.
    pub fn function(self) -> Option<MeasurementFunction> {
        let function = match self {
            Self::VoltageDc => MeasurementFunction::VoltageDc,
            Self::VoltageAc => MeasurementFunction::VoltageAc,
            Self::CurrentDc => MeasurementFunction::CurrentDc,
            Self::CurrentAc => MeasurementFunction::CurrentAc,
            Self::Resistance2W => MeasurementFunction::Resistance2W,
            Self::Resistance4W => MeasurementFunction::Resistance4W,
            Self::Continuity => MeasurementFunction::Continuity,
            Self::Diode => MeasurementFunction::Diode,
            Self::Frequency => MeasurementFunction::Frequency,
            Self::Period => MeasurementFunction::Period,
            _ => return None,
        };
        Some(function)
    }

    /// Whether pressing this key turns off the 4W and diode annunciators.
    pub fn clears_indicators(self) -> bool {
        matches!(self, Self::Db | Self::Dbm | Self::MenuOnOff | Self::Recall)
    }
}

/// Which key set the panel currently shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Menu {
    shifted: bool,
}

impl Menu {
    /// Whether the shifted set is active.
    pub fn is_shifted(&self) -> bool {
        self.shifted
    }

    /// Flip between the primary and secondary sets.
    pub fn toggle_shift(&mut self) {
        self.shifted = !self.shifted;
    }

    /// Keys currently on the panel.
    pub fn options(&self) -> &'static [PanelKey] {
        if self.shifted {
            &SECONDARY_KEYS
        } else {
            &PRIMARY_KEYS
        }
    }

    /// Whether `key` is reachable without toggling Shift.
    pub fn offers(&self, key: PanelKey) -> bool {
        self.options().contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shift_parity() {
        let mut menu = Menu::default();
        let original = menu.options();
        for toggles in 1..=6 {
            menu.toggle_shift();
            if toggles % 2 == 0 {
                assert_eq!(menu.options(), original);
            } else {
                assert_eq!(menu.options(), &SECONDARY_KEYS[..]);
            }
        }
    }

    #[test]
    fn test_every_function_has_one_key() {
        for function in MeasurementFunction::ALL {
            let keys: Vec<PanelKey> = PRIMARY_KEYS
                .iter()
                .chain(SECONDARY_KEYS.iter())
                .copied()
                .filter(|k| k.function() == Some(function))
                .collect();
            assert_eq!(keys.len(), 1, "{function} should map to one key");
        }
    }

    #[test]
    fn test_shift_in_both_sets() {
        let mut menu = Menu::default();
        assert!(menu.offers(PanelKey::Shift));
        assert!(!menu.offers(PanelKey::Diode));
        menu.toggle_shift();
        assert!(menu.offers(PanelKey::Shift));
        assert!(menu.offers(PanelKey::Diode));
    }

    #[test]
    fn test_math_and_menu_keys_clear_indicators() {
        let clearing: Vec<PanelKey> = PRIMARY_KEYS
            .iter()
            .chain(SECONDARY_KEYS.iter())
            .copied()
            .filter(|k| k.clears_indicators())
            .collect();
        assert_eq!(
            clearing,
            vec![PanelKey::Db, PanelKey::Dbm, PanelKey::MenuOnOff, PanelKey::Recall]
        );
    }

    #[test]
    fn test_labels() {
        assert_eq!(PanelKey::Resistance4W.label(), "Resistance 4W");
        assert_eq!(PanelKey::MinMax.label(), "Min/Max");
        assert_eq!(PanelKey::Shift.label(), "Shift");
    }
}
