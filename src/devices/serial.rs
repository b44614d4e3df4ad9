use std::io::Read;
use std::time::Duration;
use serialport::SerialPort;
use thiserror::Error;
use tracing::{info, error};

use super::LineSource;

#[derive(Error, Debug)]
pub enum SerialError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to open port: {0}")]
    OpenError(#[from] serialport::Error),

    #[error("received non-UTF-8 data: {0}")]
    DecodeError(#[from] std::string::FromUtf8Error),

    #[error("device not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, SerialError>;

/// Line-oriented serial connection to the sensor board.
pub struct SerialLink {
    port: Option<Box<dyn SerialPort>>,
    port_path: String,
    baud_rate: u32,
    timeout: Duration,
}

impl SerialLink {
    pub fn new(port_path: &str, baud_rate: u32, timeout: Duration) -> Self {
        info!("Initializing serial link for port: {}", port_path);
        SerialLink {
            port: None,
            port_path: port_path.to_string(),
            baud_rate,
            timeout,
        }
    }

    pub fn connect(&mut self) -> Result<()> {
        info!("Attempting to open {} at {} baud", self.port_path, self.baud_rate);
        let port = serialport::new(&self.port_path, self.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(self.timeout)
            .open()?;
        self.port = Some(port);
        info!("Serial port {} opened successfully", self.port_path);
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Read one newline-terminated line, blocking for at most the configured
    /// timeout. A timeout with nothing accumulated yields `Ok(None)`; a
    /// timeout mid-line yields the partial line.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        let Some(port) = self.port.as_mut() else {
            error!("Attempted to read but serial port is not open");
            return Err(SerialError::NotConnected);
        };
        read_line_from(port)
    }

    /// Close the port. Safe to call more than once.
    pub fn close(&mut self) {
        if self.port.take().is_some() {
            info!("Serial port {} closed", self.port_path);
        }
    }
}

impl LineSource for SerialLink {
    fn connect(&mut self) -> Result<()> {
        SerialLink::connect(self)
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        SerialLink::read_line(self)
    }

    fn close(&mut self) {
        SerialLink::close(self)
    }
}

/// Accumulate bytes up to the newline. A zero-byte read is the driver
/// reporting end of stream (hang-up), not a timeout, and is surfaced as an
/// IO error so a dead port does not spin as idle.
fn read_line_from<R: Read + ?Sized>(reader: &mut R) -> Result<Option<String>> {
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                if buffer.is_empty() {
                    return Err(SerialError::IoError(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "serial port closed by driver",
                    )));
                }
                break;
            }
            Ok(_) => {
                if byte[0] == b'\n' {
                    break;
                }
                buffer.push(byte[0]);
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {
                if buffer.is_empty() {
                    return Ok(None);
                }
                break;
            }
            Err(e) => return Err(SerialError::IoError(e)),
        }
    }

    let line = String::from_utf8(buffer)?;
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_new_link_is_disconnected() {
        let link = SerialLink::new("/dev/ttyACM0", 115200, Duration::from_secs(1));
        assert!(!link.is_connected());
        assert_eq!(link.port_path(), "/dev/ttyACM0");
        assert_eq!(link.baud_rate(), 115200);
    }

    #[test]
    fn test_read_without_connect_fails() {
        let mut link = SerialLink::new("/dev/ttyACM0", 115200, Duration::from_secs(1));
        assert!(matches!(link.read_line(), Err(SerialError::NotConnected)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut link = SerialLink::new("/dev/ttyACM0", 115200, Duration::from_secs(1));
        link.close();
        link.close();
        assert!(!link.is_connected());
    }

    /// Yields its bytes, then times out instead of reporting end of stream.
    struct TimedOutAfter {
        data: Cursor<Vec<u8>>,
    }

    impl Read for TimedOutAfter {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_line_stops_at_newline() {
        let mut reader = Cursor::new(b"GPS,1,2\nHS300x,21.0\n".to_vec());
        assert_eq!(read_line_from(&mut reader).unwrap(), Some("GPS,1,2".to_string()));
        assert_eq!(read_line_from(&mut reader).unwrap(), Some("HS300x,21.0".to_string()));
    }

    #[test]
    fn test_timeout_with_no_bytes_is_no_line() {
        let mut reader = TimedOutAfter { data: Cursor::new(Vec::new()) };
        assert_eq!(read_line_from(&mut reader).unwrap(), None);
    }

    #[test]
    fn test_timeout_mid_line_yields_partial_line() {
        let mut reader = TimedOutAfter { data: Cursor::new(b"READY".to_vec()) };
        assert_eq!(read_line_from(&mut reader).unwrap(), Some("READY".to_string()));
    }

    #[test]
    fn test_end_of_stream_is_an_io_error() {
        let mut reader = Cursor::new(Vec::new());
        match read_line_from(&mut reader) {
            Err(SerialError::IoError(e)) => {
                assert_eq!(e.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected IoError, got {:?}", other),
        }
    }

    #[test]
    fn test_end_of_stream_mid_line_yields_line_then_error() {
        let mut reader = Cursor::new(b"READY".to_vec());
        assert_eq!(read_line_from(&mut reader).unwrap(), Some("READY".to_string()));
        assert!(matches!(read_line_from(&mut reader), Err(SerialError::IoError(_))));
    }

    #[test]
    fn test_non_utf8_line_is_a_decode_error() {
        let mut reader = Cursor::new(b"\xff\xfe\n".to_vec());
        assert!(matches!(read_line_from(&mut reader), Err(SerialError::DecodeError(_))));
    }
}
