pub mod data;

use crate::devices::{LineSource, SerialError};
use data::Record;
use chrono::Utc;
use csv::{Writer, WriterBuilder};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, error, warn};

/// Fixed header row, written before any data row.
pub const CSV_HEADER: [&str; 3] = ["Timestamp", "Sensor", "Data"];

/// Configuration for a capture session
#[derive(Debug)]
pub struct CaptureConfig {
    pub port_path: String,      // serial device path
    pub baud_rate: u32,         // must match the firmware's Serial.begin
    pub read_timeout: Duration, // how long one read may block with no data
    pub output_path: PathBuf,   // CSV sink, truncated at startup
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            port_path: "/dev/cu.usbmodem1101".to_string(),
            baud_rate: 115200,
            read_timeout: Duration::from_secs(1),
            output_path: PathBuf::from("sensor_data.csv"),
        }
    }
}

/// The reasons a capture session ends. Every variant is final; the loop
/// never reopens the port or resumes.
#[derive(Error, Debug)]
pub enum CaptureFault {
    #[error("serial fault: {0}")]
    Connection(String),

    #[error("interrupted by user")]
    Interrupted,

    #[error("unexpected fault: {0}")]
    Other(String),
}

/// How a finished session ended and how much it produced. The two counts
/// diverge only when the CSV append for an already-echoed line fails.
pub struct CaptureOutcome {
    pub fault: CaptureFault,
    pub lines_echoed: u64,
    pub rows_written: u64,
}

/// Run a capture session until a fault or interruption ends it.
///
/// Every non-empty line received while the source is open is echoed to the
/// console and appended to the CSV sink, in arrival order. The source is
/// closed on every exit path.
pub fn run_capture<S: LineSource>(
    source: &mut S,
    config: &CaptureConfig,
    stop: Arc<AtomicBool>,
) -> Result<CaptureOutcome, String> {
    info!("Starting capture with configuration: {:?}", config);

    match source.connect() {
        Ok(()) => info!("Connected to {} at {} baud", config.port_path, config.baud_rate),
        Err(e) => return Err(format!("Failed to open serial port {}: {}", config.port_path, e)),
    }

    let mut writer = match open_sink(&config.output_path) {
        Ok(w) => w,
        Err(e) => {
            source.close();
            return Err(e);
        }
    };

    let mut lines_echoed = 0u64;
    let mut rows_written = 0u64;

    let fault = loop {
        // The flag is only observed between reads; an in-flight read
        // completes or times out first.
        if stop.load(Ordering::SeqCst) {
            break CaptureFault::Interrupted;
        }

        let line = match source.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => continue,
            Err(e) => break classify_fault(e),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = Record::new(Utc::now().timestamp_millis(), line.to_string());
        println!("{}", record.console_line());
        lines_echoed += 1;

        if let Err(e) = writer.write_record(record.csv_fields()) {
            break CaptureFault::Other(e.to_string());
        }
        rows_written += 1;
    };

    // Single teardown path for all three termination reasons.
    match &fault {
        CaptureFault::Interrupted => {
            println!("Program interrupted by user");
            info!("Capture interrupted by user");
        }
        CaptureFault::Connection(desc) => {
            println!("Serial error: {}", desc);
            error!("Capture ended on serial fault: {}", desc);
        }
        CaptureFault::Other(desc) => {
            println!("Unexpected error: {}", desc);
            error!("Capture ended on unexpected fault: {}", desc);
        }
    }

    if let Err(e) = writer.flush() {
        warn!("Failed to flush CSV output: {}", e);
    }
    source.close();

    info!(
        "Capture finished: {} lines echoed, {} rows written to {}",
        lines_echoed,
        rows_written,
        config.output_path.display()
    );

    Ok(CaptureOutcome { fault, lines_echoed, rows_written })
}

/// Create/truncate the CSV sink and write the header row. Rows are
/// variable-width, so the writer must not enforce a fixed field count.
fn open_sink(path: &Path) -> Result<Writer<File>, String> {
    let file = File::create(path)
        .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
    let mut writer = WriterBuilder::new().flexible(true).from_writer(file);
    writer
        .write_record(CSV_HEADER)
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;
    Ok(writer)
}

/// Map a device-layer error onto the closed fault enumeration. Decode
/// failures are not transport failures.
fn classify_fault(err: SerialError) -> CaptureFault {
    match err {
        SerialError::DecodeError(e) => CaptureFault::Other(e.to_string()),
        other => CaptureFault::Connection(other.to_string()),
    }
}
