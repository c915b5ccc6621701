//! Display sinks for readings.
//!
//! The core never depends on how a reading is presented; it only needs
//! something that accepts text updates.

use crate::poller::PollResult;
use std::io::Write;
use tracing::warn;

/// Receiver of display updates.
pub trait DisplaySink: Send + Sync {
    /// Replace the displayed text.
    fn set_text(&self, text: &str);

    /// Show a fresh reading. The default renders the value as text.
    fn show_reading(&self, reading: &PollResult) {
        self.set_text(&reading.to_string());
    }
}

/// Prints each update on its own stdout line.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDisplay;

impl DisplaySink for StdoutDisplay {
    fn set_text(&self, text: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", text) {
            warn!("Failed to write to stdout: {}", e);
        }
    }
}

/// Prints each reading as one JSON object per line.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDisplay;

impl DisplaySink for JsonDisplay {
    fn set_text(&self, text: &str) {
        StdoutDisplay.set_text(text);
    }

    fn show_reading(&self, reading: &PollResult) {
        match serde_json::to_string(reading) {
            Ok(line) => self.set_text(&line),
            Err(e) => warn!("Failed to serialize reading: {}", e),
        }
    }
}
