//! Actor that owns the instrument link
//!
//! All instrument I/O happens in a single async task that processes
//! [`InstrumentCommand`]s one at a time. The session and the poller only hold
//! an [`InstrumentHandle`], so a mode change and a poll cycle can never
//! interleave on the bus.
//!
//! The link is opened lazily for the configured address and reused across
//! requests. It is closed when the address changes, after any link fault (the
//! next request reopens it) and on shutdown.

use crate::adapters::{timed, Transport};
use crate::address::InstrumentAddress;
use crate::config::InstrumentConfig;
use crate::dispatch;
use crate::error::{AppResult, DmmError};
use crate::function::MeasurementFunction;
use crate::messages::InstrumentCommand;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// Single owner of the instrument link
pub struct InstrumentActor {
    link: Box<dyn Transport>,
    address: InstrumentAddress,
    board: u8,
    io_timeout: Duration,
    open_resource: Option<String>,
    confirmed: Option<MeasurementFunction>,
}

impl InstrumentActor {
    /// Creates a new InstrumentActor around `link`
    pub fn new(link: Box<dyn Transport>, config: &InstrumentConfig) -> Self {
        Self {
            link,
            address: config.address(),
            board: config.board,
            io_timeout: config.io_timeout(),
            open_resource: None,
            confirmed: None,
        }
    }

    /// Spawn the actor on the current runtime and return its handle
    pub fn spawn(self, capacity: usize) -> (InstrumentHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(capacity.max(1));
        let task = tokio::spawn(self.run(command_rx).in_current_span());
        (InstrumentHandle { command_tx }, task)
    }

    /// Runs the actor event loop, processing commands until shutdown
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<InstrumentCommand>) {
        info!(link = %self.link.describe(), address = %self.address, "InstrumentActor started");

        while let Some(command) = command_rx.recv().await {
            match command {
                InstrumentCommand::SetAddress { address, response } => {
                    self.set_address(address).await;
                    let _ = response.send(());
                }

                InstrumentCommand::SelectFunction { function, response } => {
                    let result = self.select_function(function).await;
                    let _ = response.send(result);
                }

                InstrumentCommand::Measure { response } => {
                    let result = self.measure().await;
                    let _ = response.send(result);
                }

                InstrumentCommand::CurrentFunction { response } => {
                    let _ = response.send(self.confirmed);
                }

                InstrumentCommand::Shutdown { response } => {
                    info!("Shutdown command received");
                    self.release().await;
                    let _ = response.send(());
                    return;
                }
            }
        }

        // Every handle dropped without an explicit shutdown
        self.release().await;
        info!("InstrumentActor shutting down");
    }

    async fn set_address(&mut self, address: InstrumentAddress) {
        if address == self.address {
            return;
        }
        info!(old = %self.address, new = %address, "GPIB address changed");
        self.release().await;
        self.address = address;
        self.confirmed = None;
    }

    async fn select_function(
        &mut self,
        function: MeasurementFunction,
    ) -> AppResult<MeasurementFunction> {
        self.acquire().await?;
        let result = dispatch::select_function(self.link.as_mut(), function, self.io_timeout).await;
        self.settle(&result).await;
        if let Ok(confirmed) = result {
            self.confirmed = Some(confirmed);
        }
        result
    }

    async fn measure(&mut self) -> AppResult<f64> {
        self.acquire().await?;
        let result = dispatch::measure_once(self.link.as_mut(), self.io_timeout).await;
        self.settle(&result).await;
        result
    }

    /// Make sure the link is open for the current address
    async fn acquire(&mut self) -> AppResult<()> {
        let resource = self.address.resource_string(self.board)?;
        if self.link.is_open() && self.open_resource.as_deref() == Some(resource.as_str()) {
            return Ok(());
        }

        self.release().await;
        info!(resource = %resource, "Opening instrument link");
        let opened = timed(self.io_timeout, "open", self.link.open(&resource, self.io_timeout)).await;
        if let Err(e) = opened {
            // A timed-out open may still have left a session behind
            self.release().await;
            return Err(e.into());
        }
        self.open_resource = Some(resource);
        Ok(())
    }

    /// Close the link, logging rather than propagating close failures
    async fn release(&mut self) {
        let resource = self.open_resource.take();
        if let Err(e) = self.link.close().await {
            warn!("Failed to close instrument link: {}", e);
        }
        if let Some(resource) = resource {
            debug!(resource = %resource, "Instrument link closed");
        }
    }

    /// Drop the link after a link fault so the next request reopens it
    async fn settle<T>(&mut self, result: &AppResult<T>) {
        if let Err(DmmError::Link(e)) = result {
            warn!("Link fault, closing instrument link: {}", e);
            self.release().await;
        }
    }
}

/// Cloneable client of the [`InstrumentActor`]
///
/// Every call fails with [`DmmError::ActorUnavailable`] once the actor is gone.
#[derive(Debug, Clone)]
pub struct InstrumentHandle {
    command_tx: mpsc::Sender<InstrumentCommand>,
}

impl InstrumentHandle {
    async fn request<T>(
        &self,
        (command, response): (InstrumentCommand, oneshot::Receiver<T>),
    ) -> AppResult<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| DmmError::ActorUnavailable)?;
        response.await.map_err(|_| DmmError::ActorUnavailable)
    }

    /// Point the actor at a new bus address
    pub async fn set_address(&self, address: InstrumentAddress) -> AppResult<()> {
        self.request(InstrumentCommand::set_address(address)).await
    }

    /// Select `function` and return the function the meter confirms
    pub async fn select_function(
        &self,
        function: MeasurementFunction,
    ) -> AppResult<MeasurementFunction> {
        self.request(InstrumentCommand::select_function(function))
            .await?
    }

    /// Take one reading
    pub async fn measure(&self) -> AppResult<f64> {
        self.request(InstrumentCommand::measure()).await?
    }

    /// Last function confirmed by the meter
    pub async fn current_function(&self) -> AppResult<Option<MeasurementFunction>> {
        self.request(InstrumentCommand::current_function()).await
    }

    /// Close the link and stop the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(InstrumentCommand::shutdown()).await
    }

    /// Whether the actor is still accepting commands
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }
}
