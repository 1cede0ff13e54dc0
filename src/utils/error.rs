use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModbusError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection failed: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Response timeout: {0}")]
    Timeout(String),

    #[error("Modbus exception: {0}")]
    Exception(String),

    #[error("Invalid response from device: {0}")]
    InvalidResponse(String),

    #[error("{0}: not implemented yet!")]
    Unsupported(String),
}

impl ModbusError {
    /// Errors that abort the whole run instead of producing a failed outcome.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ModbusError::ConfigError(_) | ModbusError::ConnectionError(_))
    }
}

impl From<std::io::Error> for ModbusError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => ModbusError::Timeout(err.to_string()),
            _ => ModbusError::CommunicationError(format!("IO error: {}", err)),
        }
    }
}

impl From<toml::de::Error> for ModbusError {
    fn from(err: toml::de::Error) -> Self {
        ModbusError::ConfigError(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for ModbusError {
    fn from(err: toml::ser::Error) -> Self {
        ModbusError::ConfigError(format!("TOML write error: {}", err))
    }
}

impl From<serde_json::Error> for ModbusError {
    fn from(err: serde_json::Error) -> Self {
        ModbusError::InvalidResponse(format!("JSON error: {}", err))
    }
}
