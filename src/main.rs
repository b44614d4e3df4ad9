mod capture;
mod devices;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::fmt;
use tracing_appender::rolling;
use tracing::{info, error};
use capture::CaptureConfig;
use devices::SerialLink;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // The guard must outlive the capture so buffered log lines reach the file.
    let _guard = setup_logging();
    info!("Starting sensor capture");

    // Ctrl+C only flips the flag; the loop notices it between reads.
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
    }

    let config = CaptureConfig::default();
    let mut link = SerialLink::new(&config.port_path, config.baud_rate, config.read_timeout);

    match capture::run_capture(&mut link, &config, stop) {
        Ok(outcome) => {
            info!(
                "Capture ended ({}). {} lines echoed, {} rows written to {}",
                outcome.fault,
                outcome.lines_echoed,
                outcome.rows_written,
                config.output_path.display()
            );
        }
        Err(e) => {
            error!("Capture failed to start: {}", e);
            eprintln!("Capture failed to start: {}", e);
            return Err(Box::new(std::io::Error::new(std::io::ErrorKind::Other, e)));
        }
    }

    info!("Application shutting down");
    Ok(())
}

fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    // File-based logging with daily rotation; stdout stays reserved for the
    // record echo.
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    fmt()
        .with_writer(non_blocking)
        .with_ansi(false) // Disable ANSI colors in log files
        .with_level(true)
        .init();

    guard
}
