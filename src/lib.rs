//! Core library for the HP 34401A control panel.
//!
//! This library contains the SCPI command table, the instrument actor that
//! owns the GPIB link, the periodic poller and the session object a front end
//! drives. It is used by the `hp34401a` command-line binary.

#![cfg_attr(test, deny(missing_docs))]

pub mod adapters;
pub mod address;
pub mod config;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod function;
pub mod instrument_actor;
pub mod menu;
pub mod messages;
pub mod poller;
pub mod session;

pub use address::InstrumentAddress;
pub use error::{AppResult, ConfigError, DmmError, LinkError};
pub use function::{Indicators, MeasurementFunction};
pub use poller::PollResult;
pub use session::Session;
