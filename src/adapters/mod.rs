//! Instrument link adapters
//!
//! This module defines the [`Transport`] trait, the only seam through which the
//! crate talks to a meter, and its implementations:
//!
//! - [`VisaAdapter`]: GPIB/USB/LAN through the system VISA library
//!   (feature `instrument_visa`)
//! - [`MockAdapter`]: an in-memory 34401A for tests and dry runs

use crate::error::LinkError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

pub mod mock_adapter;
pub mod visa_adapter;

pub use mock_adapter::MockAdapter;
pub use visa_adapter::VisaAdapter;

/// Async link to a single SCPI instrument.
///
/// Implementations are owned by exactly one task (the instrument actor), so
/// every method takes `&mut self` and no internal arbitration is needed.
#[async_trait]
pub trait Transport: Send {
    /// Open the VISA resource. `timeout` bounds the open call itself.
    async fn open(&mut self, resource: &str, timeout: Duration) -> Result<(), LinkError>;

    /// Send a command that produces no response.
    async fn write(&mut self, command: &str) -> Result<(), LinkError>;

    /// Send a query and read one response line.
    async fn query(&mut self, command: &str) -> Result<String, LinkError>;

    /// Release the resource. Closing a link that is not open is a no-op.
    async fn close(&mut self) -> Result<(), LinkError>;

    /// Whether a resource is currently open.
    fn is_open(&self) -> bool;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Run one link operation under an explicit deadline.
///
/// Dropping the inner future on expiry is the cancellation path; the
/// operation is reported as [`LinkError::Timeout`].
pub async fn timed<T, F>(timeout: Duration, command: &str, operation: F) -> Result<T, LinkError>
where
    F: Future<Output = Result<T, LinkError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(result) => result,
        Err(_) => Err(LinkError::Timeout {
            command: command.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timed_reports_timeout() {
        let result: Result<(), LinkError> = timed(Duration::from_millis(100), "FETC?", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result {
            Err(LinkError::Timeout { command, timeout }) => {
                assert_eq!(command, "FETC?");
                assert_eq!(timeout, Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timed_passes_result_through() {
        let value = timed(Duration::from_secs(1), "FUNC?", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
