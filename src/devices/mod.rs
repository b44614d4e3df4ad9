pub mod serial;

pub use serial::{SerialError, SerialLink};

use serial::Result;

/// A line-oriented input the capture loop drains. Implemented by the serial
/// link; test doubles script their own lines.
pub trait LineSource {
    fn connect(&mut self) -> Result<()>;
    fn read_line(&mut self) -> Result<Option<String>>;
    fn close(&mut self);
}
