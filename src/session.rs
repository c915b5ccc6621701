//! Front-panel session state
//!
//! A [`Session`] is the explicit context object behind the control panel. It
//! owns the instrument actor, the current address, the Shift state, the
//! selected function with its annunciators, and the lifecycle of the poller.
//!
//! Panel-facing methods log failures and carry on, returning `None` so a UI
//! simply skips the update. `try_*` variants expose the typed error.

use crate::adapters::Transport;
use crate::address::InstrumentAddress;
use crate::config::Settings;
use crate::display::DisplaySink;
use crate::error::{AppResult, DmmError};
use crate::function::{Indicators, MeasurementFunction};
use crate::instrument_actor::{InstrumentActor, InstrumentHandle};
use crate::menu::{Menu, PanelKey};
use crate::poller::{poll_once, PollResult, Poller};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What a key press did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Shift toggled; the flag is the new shifted state
    Shifted(bool),
    /// A function was requested; `None` if the meter did not confirm it
    FunctionSelected(Option<MeasurementFunction>),
    /// A panel action with no instrument command
    PanelOnly,
}

/// Explicit context for one meter
pub struct Session {
    instrument: InstrumentHandle,
    actor_task: Option<JoinHandle<()>>,
    address: InstrumentAddress,
    menu: Menu,
    selected: Option<MeasurementFunction>,
    confirmed: Option<MeasurementFunction>,
    indicators: Indicators,
    poll_period: Duration,
    poller: Option<Poller>,
}

impl Session {
    /// Spawn the instrument actor around `link` and build a session from `settings`
    pub fn start(link: Box<dyn Transport>, settings: &Settings) -> Self {
        let (instrument, actor_task) = InstrumentActor::new(link, &settings.instrument)
            .spawn(settings.instrument.command_channel_capacity);
        info!(address = %settings.instrument.address(), "Session started");

        Self {
            instrument,
            actor_task: Some(actor_task),
            address: settings.instrument.address(),
            menu: Menu::default(),
            selected: None,
            confirmed: None,
            indicators: Indicators::default(),
            poll_period: settings.poller.period(),
            poller: None,
        }
    }

    /// Handle to the instrument actor
    pub fn instrument(&self) -> &InstrumentHandle {
        &self.instrument
    }

    /// Current bus address
    pub fn address(&self) -> InstrumentAddress {
        self.address
    }

    /// Panel menu state
    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    /// Keys currently shown
    pub fn options(&self) -> &'static [PanelKey] {
        self.menu.options()
    }

    /// Function most recently requested
    pub fn selected_function(&self) -> Option<MeasurementFunction> {
        self.selected
    }

    /// Function most recently confirmed by the meter
    pub fn confirmed_function(&self) -> Option<MeasurementFunction> {
        self.confirmed
    }

    /// Annunciator flags currently lit
    pub fn indicators(&self) -> Indicators {
        self.indicators
    }

    /// Configured poll period
    pub fn poll_period(&self) -> Duration {
        self.poll_period
    }

    /// Whether the poller is running
    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(Poller::is_running)
    }

    /// Change the bus address. Any value is accepted; it is checked on use.
    pub async fn set_address(&mut self, address: impl Into<InstrumentAddress>) -> AppResult<()> {
        let address = address.into();
        info!(old = %self.address, new = %address, "Setting GPIB address");
        self.instrument.set_address(address).await?;
        self.address = address;
        self.confirmed = None;
        Ok(())
    }

    /// Request `function`, returning the confirmed function or the typed error
    ///
    /// The annunciators follow the request immediately, before any I/O.
    pub async fn try_select_function(
        &mut self,
        function: MeasurementFunction,
    ) -> AppResult<MeasurementFunction> {
        self.selected = Some(function);
        self.indicators = function.indicators();
        info!(function = function.label(), command = %function.command(), "Selecting measurement function");
        let confirmed = self.instrument.select_function(function).await?;
        if confirmed != function {
            warn!(requested = %function, confirmed = %confirmed, "Meter confirmed a different function");
        }
        self.confirmed = Some(confirmed);
        Ok(confirmed)
    }

    /// Request `function`, logging any failure
    pub async fn select_function(
        &mut self,
        function: MeasurementFunction,
    ) -> Option<MeasurementFunction> {
        match self.try_select_function(function).await {
            Ok(confirmed) => Some(confirmed),
            Err(e) => {
                log_failure("select function", &e);
                None
            }
        }
    }

    /// Flip between the primary and shifted key sets
    pub fn toggle_shift(&mut self) -> bool {
        self.menu.toggle_shift();
        self.menu.is_shifted()
    }

    /// Handle a key press
    pub async fn press(&mut self, key: PanelKey) -> KeyOutcome {
        if !self.menu.offers(key) {
            warn!(key = key.label(), shifted = self.menu.is_shifted(), "Key is not on the current panel");
        }

        if key == PanelKey::Shift {
            return KeyOutcome::Shifted(self.toggle_shift());
        }

        match key.function() {
            Some(function) => KeyOutcome::FunctionSelected(self.select_function(function).await),
            None => {
                info!(key = key.label(), "Front-panel action has no remote command");
                if key.clears_indicators() {
                    self.indicators = Indicators::default();
                }
                KeyOutcome::PanelOnly
            }
        }
    }

    /// Take one reading outside the poller, logging any failure
    pub async fn measure_now(&self) -> Option<PollResult> {
        poll_once(&self.instrument).await
    }

    /// Start polling into `sink`. A running poller is stopped first.
    pub async fn start_polling(&mut self, sink: Arc<dyn DisplaySink>) -> AppResult<()> {
        self.stop_polling().await;
        self.poller = Some(Poller::start(self.instrument.clone(), sink, self.poll_period)?);
        Ok(())
    }

    /// Stop polling; no cycle runs after this returns
    pub async fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop().await;
        }
    }

    /// Change the poll period, applying it to a running poller
    pub fn set_poll_period(&mut self, period: Duration) -> AppResult<()> {
        if let Some(poller) = &self.poller {
            poller.set_period(period)?;
        } else if period.is_zero() {
            return Err(DmmError::config("Poll period must be greater than zero"));
        }
        self.poll_period = period;
        Ok(())
    }

    /// Stop the poller, then the actor, closing the instrument link
    pub async fn shutdown(mut self) {
        self.stop_polling().await;
        if let Err(e) = self.instrument.shutdown().await {
            warn!("Instrument actor already gone: {}", e);
        }
        if let Some(task) = self.actor_task.take() {
            if let Err(e) = task.await {
                warn!("Instrument actor ended abnormally: {}", e);
            }
        }
        info!("Session closed");
    }
}

fn log_failure(operation: &str, error: &DmmError) {
    warn!(kind = error.kind(), "Failed to {}: {}", operation, error);
}
