//! Poller scheduling under a paused clock.

use hp34401a::adapters::MockAdapter;
use hp34401a::config::InstrumentConfig;
use hp34401a::display::DisplaySink;
use hp34401a::instrument_actor::{InstrumentActor, InstrumentHandle};
use hp34401a::poller::{PollResult, Poller};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const PERIOD: Duration = Duration::from_millis(200);

#[derive(Default)]
struct Recorder(Mutex<Vec<f64>>);

impl Recorder {
    fn values(&self) -> Vec<f64> {
        self.0.lock().unwrap().clone()
    }
}

impl DisplaySink for Recorder {
    fn set_text(&self, _text: &str) {}

    fn show_reading(&self, reading: &PollResult) {
        self.0.lock().unwrap().push(reading.value);
    }
}

fn spawn_actor(mock: &MockAdapter) -> InstrumentHandle {
    let config = InstrumentConfig {
        address: 5,
        ..InstrumentConfig::default()
    };
    let (handle, _task) = InstrumentActor::new(Box::new(mock.clone()), &config).spawn(8);
    handle
}

#[tokio::test(start_paused = true)]
async fn test_one_reading_per_period() {
    let mock = MockAdapter::new().with_readings([1.5, -2.25, 3.0, 4.75]);
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    // N periods plus half a period
    tokio::time::sleep(PERIOD * 4 + PERIOD / 2).await;
    poller.stop().await;

    assert_eq!(sink.values(), vec![1.5, -2.25, 3.0, 4.75]);
    assert_eq!(mock.count("INIT"), 4);
}

#[tokio::test(start_paused = true)]
async fn test_first_cycle_waits_one_period() {
    let mock = MockAdapter::new().with_reading(1.0);
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    tokio::time::sleep(PERIOD / 2).await;
    assert!(sink.values().is_empty());
    assert!(mock.call_log().is_empty());

    poller.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failing_fetch_keeps_scheduling() {
    let mock = MockAdapter::new().failing("FETC?");
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    tokio::time::sleep(PERIOD * 3 + PERIOD / 2).await;
    assert!(poller.is_running());
    poller.stop().await;

    assert!(sink.values().is_empty());
    assert_eq!(mock.count("FETC?"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_reading_is_skipped() {
    let mock = MockAdapter::new().with_response("FETC?", "OVLD\n");
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    tokio::time::sleep(PERIOD * 2 + PERIOD / 2).await;
    poller.stop().await;

    assert!(sink.values().is_empty());
    assert_eq!(mock.count("FETC?"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_cycles_after_stop() {
    let mock = MockAdapter::new().with_reading(7.0);
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    tokio::time::sleep(PERIOD * 2 + PERIOD / 2).await;
    poller.stop().await;
    let fetched = mock.count("FETC?");

    tokio::time::sleep(PERIOD * 10).await;
    assert_eq!(mock.count("FETC?"), fetched);
    assert_eq!(sink.values().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_slow_meter_stretches_period() {
    let mock = MockAdapter::new()
        .with_reading(1.0)
        .with_latency(Duration::from_millis(25));
    let sink = Arc::new(Recorder::default());
    let poller = Poller::start(spawn_actor(&mock), sink.clone(), PERIOD).unwrap();

    // Each cycle costs open (first only) plus three 25ms calls after the sleep
    tokio::time::sleep(Duration::from_millis(900)).await;
    poller.stop().await;

    assert_eq!(sink.values().len(), 3);
}
