//! Periodic measurement poller
//!
//! The poller is a cancellable task that sleeps one period, runs one
//! measurement cycle through the [`InstrumentHandle`], forwards the reading to
//! a [`DisplaySink`] and then re-arms. The period is measured from the end of
//! the previous cycle, so a slow instrument stretches the effective rate.
//!
//! A failed cycle (link fault, unparseable reading, missing address) is logged
//! and produces no reading; the next cycle is scheduled regardless.
//!
//! ## Lifecycle
//!
//! ```no_run
//! use hp34401a::display::StdoutDisplay;
//! use hp34401a::instrument_actor::InstrumentHandle;
//! use hp34401a::poller::Poller;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(instrument: InstrumentHandle) -> hp34401a::error::AppResult<()> {
//! let poller = Poller::start(instrument, Arc::new(StdoutDisplay), Duration::from_millis(500))?;
//! poller.set_period(Duration::from_millis(250))?;
//! poller.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::display::DisplaySink;
use crate::error::{AppResult, DmmError};
use crate::instrument_actor::InstrumentHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

/// One reading and when it was taken
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    /// Parsed `FETC?` value
    pub value: f64,
    /// Time the reading was decoded
    pub taken_at: DateTime<Utc>,
}

impl PollResult {
    /// Stamp `value` with the current time
    pub fn new(value: f64) -> Self {
        Self {
            value,
            taken_at: Utc::now(),
        }
    }
}

impl fmt::Display for PollResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Run a single measurement cycle, logging and swallowing any failure
pub async fn poll_once(instrument: &InstrumentHandle) -> Option<PollResult> {
    match instrument.measure().await {
        Ok(value) => Some(PollResult::new(value)),
        Err(e) => {
            warn!(kind = e.kind(), "Poll cycle produced no reading: {}", e);
            None
        }
    }
}

fn check_period(period: Duration) -> AppResult<()> {
    if period.is_zero() {
        return Err(DmmError::config("Poll period must be greater than zero"));
    }
    Ok(())
}

/// Handle to a running poll task
pub struct Poller {
    shutdown_tx: Option<oneshot::Sender<()>>,
    period_tx: watch::Sender<Duration>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Spawn the poll task; the first cycle runs one period from now
    ///
    /// # Errors
    /// Returns a configuration error for a zero period.
    pub fn start(
        instrument: InstrumentHandle,
        sink: Arc<dyn DisplaySink>,
        period: Duration,
    ) -> AppResult<Self> {
        check_period(period)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (period_tx, period_rx) = watch::channel(period);
        let task = tokio::spawn(
            poll_loop(instrument, sink, period_rx, shutdown_rx).in_current_span(),
        );
        info!(period = ?period, "Poller started");

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            period_tx,
            task: Some(task),
        })
    }

    /// Current period
    pub fn period(&self) -> Duration {
        *self.period_tx.borrow()
    }

    /// Change the period; takes effect when the next cycle is armed
    pub fn set_period(&self, period: Duration) -> AppResult<()> {
        check_period(period)?;
        self.period_tx.send_replace(period);
        debug!(period = ?period, "Poll period changed");
        Ok(())
    }

    /// Whether the poll task is still alive
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop polling
    ///
    /// A cycle already in flight runs to completion; once this returns no
    /// further cycle will start.
    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Poll task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn poll_loop(
    instrument: InstrumentHandle,
    sink: Arc<dyn DisplaySink>,
    period_rx: watch::Receiver<Duration>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut cycles: u64 = 0;
    let mut readings: u64 = 0;

    loop {
        let period = *period_rx.borrow();
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = tokio::time::sleep(period) => {}
        }

        cycles += 1;
        if let Some(reading) = poll_once(&instrument).await {
            readings += 1;
            sink.show_reading(&reading);
        }
    }

    info!(cycles, readings, "Poller stopped");
}
