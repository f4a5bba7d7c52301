use std::error::Error;
use std::fmt;
use std::io;

/// I/O-class fault raised by the barometer device.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorError {
    pub message: String,
}

impl SensorError {
    pub fn new<S: Into<String>>(message: S) -> SensorError {
        SensorError { message: message.into() }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sensor fault: {}", self.message)
    }
}

impl Error for SensorError {}

/// Fault raised by the telemetry store, or carried by a cancelled feed.
///
/// Cloneable so it can ride inside events fanned out to several feeds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreError {
    pub message: String,
}

impl StoreError {
    pub fn new<S: Into<String>>(message: S) -> StoreError {
        StoreError { message: message.into() }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "store fault: {}", self.message)
    }
}

impl Error for StoreError {}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read configuration: {}", e),
            ConfigError::Parse(e) => write!(f, "could not parse configuration: {}", e),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
        }
    }
}
