//! VISA adapter for GPIB instruments
//!
//! Provides the [`Transport`] implementation used against real hardware. It
//! wraps the visa-rs crate and runs every blocking VISA call on Tokio's
//! blocking pool so the instrument actor never stalls the runtime.
//!
//! Supports resource strings like:
//! - "GPIB0::2::INSTR" (GPIB interface, the 34401A's native bus)
//! - "ASRL1::INSTR" (the meter's RS-232 port)

use super::Transport;
use crate::error::LinkError;
use async_trait::async_trait;
use std::time::Duration;

#[cfg(feature = "instrument_visa")]
use std::ffi::CString;
#[cfg(feature = "instrument_visa")]
use std::io::{BufRead, BufReader, Write};
#[cfg(feature = "instrument_visa")]
use std::sync::Arc;
#[cfg(feature = "instrument_visa")]
use tokio::sync::Mutex;
#[cfg(feature = "instrument_visa")]
use tracing::debug;
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;
#[cfg(feature = "instrument_visa")]
use visa_rs::{attribute::AttrTmoValue, HasAttribute};

/// VISA I/O timeout attribute value in milliseconds, clamped to at least 1 ms.
#[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
fn visa_timeout_ms(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX).max(1)
}

/// An open VISA session. The instrument is declared first so it is closed
/// before the resource manager that owns it.
#[cfg(feature = "instrument_visa")]
struct VisaSession {
    instrument: Instrument,
    _rm: DefaultRM,
}

/// VISA adapter for the meter
///
/// Exactly one resource is held at a time; reopening closes the previous one.
pub struct VisaAdapter {
    /// Line terminator for commands (the 34401A expects "\n")
    pub(crate) line_terminator: String,

    /// Resource string of the open session
    pub(crate) resource: Option<String>,

    #[cfg(feature = "instrument_visa")]
    session: Option<Arc<Mutex<VisaSession>>>,
}

impl Default for VisaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl VisaAdapter {
    /// Create an adapter with no open resource
    pub fn new() -> Self {
        Self {
            line_terminator: "\n".to_string(),
            resource: None,
            #[cfg(feature = "instrument_visa")]
            session: None,
        }
    }

    /// Set line terminator for commands
    pub fn with_line_terminator(mut self, terminator: String) -> Self {
        self.line_terminator = terminator;
        self
    }

    #[cfg(feature = "instrument_visa")]
    fn session(&self) -> Result<Arc<Mutex<VisaSession>>, LinkError> {
        self.session.clone().ok_or(LinkError::NotConnected)
    }
}

#[cfg(feature = "instrument_visa")]
#[async_trait]
impl Transport for VisaAdapter {
    async fn open(&mut self, resource: &str, timeout: Duration) -> Result<(), LinkError> {
        self.close().await?;

        let resource_str = resource.to_string();
        let session = tokio::task::spawn_blocking(move || {
            let rm = DefaultRM::new().map_err(|e| LinkError::open(&resource_str, e.to_string()))?;
            let name = CString::new(resource_str.clone())
                .map_err(|e| LinkError::open(&resource_str, e))?;
            let instrument = rm
                .open(&VisaString::from(name), AccessMode::NO_LOCK, timeout)
                .map_err(|e| LinkError::open(&resource_str, e.to_string()))?;
            // VISA I/O timeout for every blocking read and write
            let tmo = AttrTmoValue::new_checked(visa_timeout_ms(timeout)).ok_or_else(|| {
                LinkError::open(&resource_str, format!("invalid VISA timeout {:?}", timeout))
            })?;
            instrument
                .set_attr(tmo)
                .map_err(|e| LinkError::open(&resource_str, e.to_string()))?;
            Ok::<VisaSession, LinkError>(VisaSession {
                instrument,
                _rm: rm,
            })
        })
        .await
        .map_err(|e| LinkError::open(resource, e))??;

        self.session = Some(Arc::new(Mutex::new(session)));
        self.resource = Some(resource.to_string());
        debug!("VISA resource '{}' opened", resource);
        Ok(())
    }

    async fn write(&mut self, command: &str) -> Result<(), LinkError> {
        let session = self.session()?;
        let command_str = format!("{}{}", command, self.line_terminator);
        let command_for_log = command.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = session.blocking_lock();
            guard
                .instrument
                .write_all(command_str.as_bytes())
                .map_err(|e| LinkError::io(&command_for_log, e))?;
            debug!("VISA write sent: {}", command_for_log);
            Ok(())
        })
        .await
        .map_err(|e| LinkError::io(command, e))?
    }

    async fn query(&mut self, command: &str) -> Result<String, LinkError> {
        let session = self.session()?;
        let command_str = format!("{}{}", command, self.line_terminator);
        let command_for_log = command.to_string();

        tokio::task::spawn_blocking(move || {
            let mut guard = session.blocking_lock();
            guard
                .instrument
                .write_all(command_str.as_bytes())
                .map_err(|e| LinkError::io(&command_for_log, e))?;

            let mut response = String::new();
            BufReader::new(&guard.instrument)
                .read_line(&mut response)
                .map_err(|e| LinkError::io(&command_for_log, e))?;

            debug!("VISA query '{}' -> '{}'", command_for_log, response.trim());
            Ok(response)
        })
        .await
        .map_err(|e| LinkError::io(command, e))?
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        if self.session.take().is_some() {
            if let Some(resource) = self.resource.take() {
                debug!("VISA resource '{}' closed", resource);
            }
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn describe(&self) -> String {
        format!(
            "VisaAdapter({})",
            self.resource.as_deref().unwrap_or("closed")
        )
    }
}

#[cfg(not(feature = "instrument_visa"))]
#[async_trait]
impl Transport for VisaAdapter {
    async fn open(&mut self, _resource: &str, _timeout: Duration) -> Result<(), LinkError> {
        Err(LinkError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    async fn write(&mut self, _command: &str) -> Result<(), LinkError> {
        Err(LinkError::NotConnected)
    }

    async fn query(&mut self, _command: &str) -> Result<String, LinkError> {
        Err(LinkError::NotConnected)
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.resource = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        "VisaAdapter(disabled)".to_string()
    }
}
