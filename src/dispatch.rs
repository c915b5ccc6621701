//! SCPI exchanges against an open link.
//!
//! These functions hold no state and never retry. Each link call runs under
//! the caller's per-call timeout. Link ownership and recovery live in the
//! instrument actor.

use crate::adapters::{timed, Transport};
use crate::error::{AppResult, DmmError};
use crate::function::{MeasurementFunction, FUNCTION_QUERY};
use std::time::Duration;
use tracing::debug;

/// Trigger a measurement.
pub const TRIGGER: &str = "INIT";
/// Block until pending operations complete.
pub const WAIT: &str = "*WAI";
/// Fetch the last reading.
pub const FETCH: &str = "FETC?";

/// Select `function` and read back the function the meter confirms.
///
/// Exactly one write and one query reach the link.
pub async fn select_function(
    link: &mut dyn Transport,
    function: MeasurementFunction,
    timeout: Duration,
) -> AppResult<MeasurementFunction> {
    let command = function.command();
    timed(timeout, &command, link.write(&command)).await?;

    let response = timed(timeout, FUNCTION_QUERY, link.query(FUNCTION_QUERY)).await?;
    let confirmed: MeasurementFunction = response.parse()?;
    debug!(requested = %function, confirmed = %confirmed, "Measurement function confirmed");
    Ok(confirmed)
}

/// Run one `INIT` / `*WAI` / `FETC?` cycle and decode the reading.
pub async fn measure_once(link: &mut dyn Transport, timeout: Duration) -> AppResult<f64> {
    timed(timeout, TRIGGER, link.write(TRIGGER)).await?;
    timed(timeout, WAIT, link.write(WAIT)).await?;
    let response = timed(timeout, FETCH, link.query(FETCH)).await?;
    parse_reading(&response)
}

/// Decode a `FETC?` response as a number.
pub fn parse_reading(response: &str) -> AppResult<f64> {
    response
        .trim()
        .parse::<f64>()
        .map_err(|_| DmmError::Parse {
            response: response.trim().to_string(),
            expected: "a numeric reading",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockAdapter;
    use tokio_test::{assert_err, assert_ok};

    const TIMEOUT: Duration = Duration::from_secs(1);

    async fn open_mock(mock: &MockAdapter) -> MockAdapter {
        let mut link = mock.clone();
        assert_ok!(link.open("GPIB0::2::INSTR", TIMEOUT).await);
        link
    }

    #[tokio::test]
    async fn test_select_sends_exactly_one_write_and_one_query() {
        for function in MeasurementFunction::ALL {
            let probe = MockAdapter::new();
            let mut link = open_mock(&probe).await;

            let confirmed = assert_ok!(select_function(&mut link, function, TIMEOUT).await);

            assert_eq!(confirmed, function);
            assert_eq!(probe.call_log(), vec![function.command(), "FUNC?".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_confirmation_is_trimmed() {
        let probe = MockAdapter::new().with_response("FUNC?", "VOLT:AC ");
        let mut link = open_mock(&probe).await;

        let confirmed = assert_ok!(
            select_function(&mut link, MeasurementFunction::VoltageAc, TIMEOUT).await
        );
        assert_eq!(confirmed, MeasurementFunction::VoltageAc);
    }

    #[tokio::test]
    async fn test_write_failure_skips_query() {
        let probe = MockAdapter::new().failing("FUNC 'RES'");
        let mut link = open_mock(&probe).await;

        let err = assert_err!(
            select_function(&mut link, MeasurementFunction::Resistance2W, TIMEOUT).await
        );
        assert_eq!(err.kind(), "link");
        assert_eq!(probe.count("FUNC?"), 0);
    }

    #[tokio::test]
    async fn test_measure_cycle_order() {
        let probe = MockAdapter::new().with_reading(-12.5);
        let mut link = open_mock(&probe).await;

        let value = assert_ok!(measure_once(&mut link, TIMEOUT).await);
        assert_eq!(value, -12.5);
        assert_eq!(probe.call_log(), vec!["INIT", "*WAI", "FETC?"]);
    }

    #[tokio::test]
    async fn test_garbage_reading_is_parse_error() {
        let probe = MockAdapter::new().with_response("FETC?", "OVLD\n");
        let mut link = open_mock(&probe).await;

        let err = assert_err!(measure_once(&mut link, TIMEOUT).await);
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_link_times_out() {
        let probe = MockAdapter::new().with_latency(Duration::from_secs(10));
        let mut link = open_mock(&probe).await;

        let err = assert_err!(measure_once(&mut link, TIMEOUT).await);
        assert!(err.to_string().contains("INIT"));
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("+1.23456700E+00\n").unwrap(), 1.234567);
        assert!(parse_reading("").is_err());
    }
}
