//! GPIB instrument address.

use crate::error::DmmError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest GPIB primary address.
pub const MAX_GPIB_ADDRESS: u8 = 30;

/// Bus address of the meter. `0` means "not set yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentAddress(u8);

impl InstrumentAddress {
    /// The unset sentinel.
    pub const UNSET: InstrumentAddress = InstrumentAddress(0);

    /// Wrap a raw address. Any value is accepted; it is checked when used.
    pub fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw address value.
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether an address has been assigned.
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    /// Check the address can be used for instrument I/O.
    pub fn validate(self) -> Result<(), DmmError> {
        if !self.is_set() {
            return Err(DmmError::config("GPIB address is not set"));
        }
        if self.0 > MAX_GPIB_ADDRESS {
            return Err(DmmError::config(format!(
                "GPIB address {} is out of range 1-{}",
                self.0, MAX_GPIB_ADDRESS
            )));
        }
        Ok(())
    }

    /// VISA resource string for this address on GPIB board `board`.
    pub fn resource_string(self, board: u8) -> Result<String, DmmError> {
        self.validate()?;
        Ok(format!("GPIB{}::{}::INSTR", board, self.0))
    }
}

impl fmt::Display for InstrumentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_set() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("unset")
        }
    }
}

impl From<u8> for InstrumentAddress {
    fn from(raw: u8) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unset() {
        let address = InstrumentAddress::default();
        assert!(!address.is_set());
        assert_eq!(address, InstrumentAddress::UNSET);
        assert_eq!(address.to_string(), "unset");
    }

    #[test]
    fn test_unset_address_is_config_error() {
        let err = InstrumentAddress::UNSET.resource_string(0).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_out_of_range_address_is_config_error() {
        assert!(InstrumentAddress::new(31).validate().is_err());
        assert!(InstrumentAddress::new(30).validate().is_ok());
    }

    #[test]
    fn test_gpib_resource_string() {
        assert_eq!(
            InstrumentAddress::new(2).resource_string(0).unwrap(),
            "GPIB0::2::INSTR"
        );
        assert_eq!(
            InstrumentAddress::new(22).resource_string(1).unwrap(),
            "GPIB1::22::INSTR"
        );
    }
}
