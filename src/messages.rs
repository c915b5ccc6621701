//! Message types for the instrument actor
//!
//! This module defines the command type sent from the session and the poller
//! to the [`InstrumentActor`](crate::instrument_actor::InstrumentActor). Every
//! command carries a oneshot sender for its reply, so callers await a response
//! instead of touching the link directly.

use crate::address::InstrumentAddress;
use crate::error::AppResult;
use crate::function::MeasurementFunction;
use tokio::sync::oneshot;

/// Commands that can be sent to the InstrumentActor
#[derive(Debug)]
pub enum InstrumentCommand {
    /// Point the link at a new bus address. The current link is closed.
    SetAddress {
        /// New bus address
        address: InstrumentAddress,
        /// Acknowledged once the old link is released
        response: oneshot::Sender<()>,
    },

    /// Select a measurement function and confirm it with `FUNC?`
    SelectFunction {
        /// Function to select
        function: MeasurementFunction,
        /// Confirmed function or the failure
        response: oneshot::Sender<AppResult<MeasurementFunction>>,
    },

    /// Run one trigger/wait/fetch cycle
    Measure {
        /// Parsed reading or the failure
        response: oneshot::Sender<AppResult<f64>>,
    },

    /// Get the last confirmed measurement function
    CurrentFunction {
        /// Last confirmed function, if any
        response: oneshot::Sender<Option<MeasurementFunction>>,
    },

    /// Close the link and stop the actor
    Shutdown {
        /// Acknowledged after the link is closed
        response: oneshot::Sender<()>,
    },
}

impl InstrumentCommand {
    /// Helper to create a SetAddress command
    pub fn set_address(address: InstrumentAddress) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SetAddress {
                address,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a SelectFunction command
    pub fn select_function(
        function: MeasurementFunction,
    ) -> (Self, oneshot::Receiver<AppResult<MeasurementFunction>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SelectFunction {
                function,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a Measure command
    pub fn measure() -> (Self, oneshot::Receiver<AppResult<f64>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Measure { response: tx }, rx)
    }

    /// Helper to create a CurrentFunction command
    pub fn current_function() -> (Self, oneshot::Receiver<Option<MeasurementFunction>>) {
        let (tx, rx) = oneshot::channel();
        (Self::CurrentFunction { response: tx }, rx)
    }

    /// Helper to create a Shutdown command
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}
