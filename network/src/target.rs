//! Peer address in `ip:port` form

use crate::error::NetworkError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    ip: String,
    port: u16,
}

impl Target {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
        }
    }

    /// Parse `ip:port`, e.g. `89.82.76.241:8106`
    pub fn parse(value: &str) -> Result<Self, NetworkError> {
        let invalid = || NetworkError::InvalidTarget(value.to_string());
        let (ip, port) = value.split_once(':').ok_or_else(invalid)?;
        if ip.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(ip, port))
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
