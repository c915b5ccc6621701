//! Mock 34401A adapter for testing
//!
//! Simulates the subset of the meter's SCPI dialect this crate uses:
//! - `FUNC '<TYPE>'` / `FUNC?` with the meter's quoted short-form answers
//! - `INIT`, `*WAI` and `FETC?` returning a scripted reading
//! - `*IDN?`
//!
//! Clones share state, so a test can keep one clone as a probe while the
//! instrument actor owns another. The probe exposes a call log, per-command
//! counters, failure injection and simulated latency.

use super::Transport;
use crate::error::LinkError;
use crate::function::MeasurementFunction;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

const IDENTITY: &str = "HEWLETT-PACKARD,34401A,0,11-5-2";

#[derive(Debug)]
struct MockState {
    open_resource: Option<String>,
    function: MeasurementFunction,
    reading: f64,
    queued_readings: VecDeque<f64>,
    overrides: HashMap<String, String>,
    failing: HashSet<String>,
    fail_open: bool,
    latency: Duration,
    call_log: Vec<String>,
    call_counts: HashMap<String, usize>,
    opens: usize,
    closes: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            open_resource: None,
            function: MeasurementFunction::VoltageDc,
            reading: 0.0,
            queued_readings: VecDeque::new(),
            overrides: HashMap::new(),
            failing: HashSet::new(),
            fail_open: false,
            latency: Duration::ZERO,
            call_log: Vec::new(),
            call_counts: HashMap::new(),
            opens: 0,
            closes: 0,
        }
    }
}

/// In-memory stand-in for an HP 34401A on the bus.
///
/// # Example
///
/// ```
/// use hp34401a::adapters::MockAdapter;
///
/// let adapter = MockAdapter::new().with_reading(1.5);
/// let probe = adapter.clone();
/// assert_eq!(probe.count("FETC?"), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

impl MockAdapter {
    /// Create a mock meter in DC voltage mode reading `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reading returned by `FETC?` once queued readings are exhausted.
    pub fn with_reading(self, value: f64) -> Self {
        self.state().reading = value;
        self
    }

    /// Readings returned by successive `FETC?` queries, in order.
    pub fn with_readings(self, values: impl IntoIterator<Item = f64>) -> Self {
        self.state().queued_readings.extend(values);
        self
    }

    /// Answer `command` with a fixed raw response.
    pub fn with_response(self, command: &str, response: &str) -> Self {
        self.state()
            .overrides
            .insert(command.to_string(), response.to_string());
        self
    }

    /// Fail every future write or query of `command` with an I/O error.
    pub fn failing(self, command: &str) -> Self {
        self.fail(command);
        self
    }

    /// Refuse to open any resource.
    pub fn failing_open(self) -> Self {
        self.state().fail_open = true;
        self
    }

    /// Delay every operation by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state().latency = latency;
        self
    }

    /// Start failing `command` on a running mock.
    pub fn fail(&self, command: &str) {
        self.state().failing.insert(command.to_string());
    }

    /// Stop failing `command`.
    pub fn recover(&self, command: &str) {
        self.state().failing.remove(command);
    }

    /// Every command seen, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.state().call_log.clone()
    }

    /// Number of times `command` was sent.
    pub fn count(&self, command: &str) -> usize {
        self.state().call_counts.get(command).copied().unwrap_or(0)
    }

    /// Number of successful opens.
    pub fn opens(&self) -> usize {
        self.state().opens
    }

    /// Number of closes of an open resource.
    pub fn closes(&self) -> usize {
        self.state().closes
    }

    /// Resource currently open, if any.
    pub fn open_resource(&self) -> Option<String> {
        self.state().open_resource.clone()
    }

    /// Function the simulated meter is in.
    pub fn function(&self) -> MeasurementFunction {
        self.state().function
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }

    /// Record the call and check the link is usable for it.
    fn begin(&self, command: &str) -> Result<MutexGuard<'_, MockState>, LinkError> {
        let mut state = self.state();
        if state.open_resource.is_none() {
            return Err(LinkError::NotConnected);
        }
        state.call_log.push(command.to_string());
        *state.call_counts.entry(command.to_string()).or_insert(0) += 1;
        if state.failing.contains(command) {
            return Err(LinkError::io(command, "simulated bus error"));
        }
        Ok(state)
    }
}

/// Format a value the way the meter prints readings, e.g. `+1.23456700E+00`.
pub fn scpi_number(value: f64) -> String {
    let formatted = format!("{:+.8E}", value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            format!("{}E{:+03}", mantissa, exponent)
        }
        None => formatted,
    }
}

/// Short form the meter uses in `FUNC?` answers.
fn query_form(function: MeasurementFunction) -> &'static str {
    match function {
        MeasurementFunction::VoltageDc => "VOLT",
        MeasurementFunction::CurrentDc => "CURR",
        other => other.scpi_type(),
    }
}

#[async_trait]
impl Transport for MockAdapter {
    async fn open(&mut self, resource: &str, _timeout: Duration) -> Result<(), LinkError> {
        self.simulate_latency().await;
        let mut state = self.state();
        if state.fail_open {
            return Err(LinkError::open(resource, "no listener at address"));
        }
        state.open_resource = Some(resource.to_string());
        state.opens += 1;
        debug!("Mock meter opened at {}", resource);
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), LinkError> {
        self.simulate_latency().await;
        let mut state = self.begin(command)?;
        if let Some(mnemonic) = command
            .strip_prefix("FUNC ")
            .map(|arg| arg.trim().trim_matches(|c| c == '\'' || c == '"'))
        {
            match mnemonic.parse::<MeasurementFunction>() {
                Ok(function) => state.function = function,
                Err(_) => return Err(LinkError::io(command, "illegal parameter value")),
            }
        }
        Ok(())
    }

    async fn query(&mut self, command: &str) -> Result<String, LinkError> {
        self.simulate_latency().await;
        let mut state = self.begin(command)?;
        if let Some(response) = state.overrides.get(command) {
            return Ok(response.clone());
        }
        match command {
            "FUNC?" => Ok(format!("\"{}\"\n", query_form(state.function))),
            "FETC?" => {
                let value = state.queued_readings.pop_front().unwrap_or(state.reading);
                Ok(format!("{}\n", scpi_number(value)))
            }
            "*IDN?" => Ok(format!("{}\n", IDENTITY)),
            _ => Err(LinkError::io(command, "undefined header")),
        }
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        let mut state = self.state();
        if state.open_resource.take().is_some() {
            state.closes += 1;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state().open_resource.is_some()
    }

    fn describe(&self) -> String {
        match self.open_resource() {
            Some(resource) => format!("MockAdapter({})", resource),
            None => "MockAdapter(closed)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn opened(adapter: MockAdapter) -> MockAdapter {
        let mut adapter = adapter;
        adapter
            .open("GPIB0::2::INSTR", Duration::from_secs(1))
            .await
            .unwrap();
        adapter
    }

    #[test]
    fn test_scpi_number_format() {
        assert_eq!(scpi_number(1.234567), "+1.23456700E+00");
        assert_eq!(scpi_number(-0.00042), "-4.20000000E-04");
        assert_eq!(scpi_number(9.9e37), "+9.90000000E+37");
        assert_eq!(scpi_number(1.234567).parse::<f64>().unwrap(), 1.234567);
    }

    #[tokio::test]
    async fn test_requires_open_link() {
        let mut adapter = MockAdapter::new();
        let err = adapter.query("FUNC?").await.unwrap_err();
        assert!(matches!(err, LinkError::NotConnected));
    }

    #[tokio::test]
    async fn test_function_round_trip() {
        let mut adapter = opened(MockAdapter::new()).await;
        adapter.write("FUNC 'FRES'").await.unwrap();
        assert_eq!(adapter.query("FUNC?").await.unwrap(), "\"FRES\"\n");
        adapter.write("FUNC 'VOLT:DC'").await.unwrap();
        assert_eq!(adapter.query("FUNC?").await.unwrap(), "\"VOLT\"\n");
    }

    #[tokio::test]
    async fn test_queued_readings_then_default() {
        let mut adapter = opened(MockAdapter::new().with_readings([1.0, 2.0]).with_reading(5.0)).await;
        let mut values = Vec::new();
        for _ in 0..3 {
            let raw = adapter.query("FETC?").await.unwrap();
            values.push(raw.trim().parse::<f64>().unwrap());
        }
        assert_eq!(values, vec![1.0, 2.0, 5.0]);
        assert_eq!(adapter.count("FETC?"), 3);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mut adapter = opened(MockAdapter::new().failing("FETC?")).await;
        assert!(adapter.query("FETC?").await.is_err());
        adapter.recover("FETC?");
        assert!(adapter.query("FETC?").await.is_ok());
        assert_eq!(adapter.count("FETC?"), 2);
    }

    #[tokio::test]
    async fn test_close_counts_once() {
        let mut adapter = opened(MockAdapter::new()).await;
        let probe = adapter.clone();
        adapter.close().await.unwrap();
        adapter.close().await.unwrap();
        assert_eq!(probe.opens(), 1);
        assert_eq!(probe.closes(), 1);
        assert!(!probe.is_open());
    }

    #[tokio::test]
    async fn test_failing_open() {
        let mut adapter = MockAdapter::new().failing_open();
        let err = adapter
            .open("GPIB0::2::INSTR", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GPIB0::2::INSTR"));
    }
}
