//! Modbus diagnostic client
//!
//! Reads and writes coils and registers on Modbus RTU or TCP slaves and
//! scans ranges of slave addresses, baud rates and parities to find
//! devices that answer.

pub mod cli;
pub mod config;
pub mod modbus;
pub mod output;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::{Config, OutputFormat, TransportConfig};
pub use modbus::{
    AddressSpec, Connector, DataBuffer, FunctionCode, ModbusClient, ModbusConnector, ModbusTransport,
    Outcome, RequestBuffer, TransactionResult,
};
pub use output::{render, ConsoleFormatter, JsonFormatter, OutcomeFormatter};
pub use services::{ScanRequest, ScanService, ScanSummary};
pub use utils::error::ModbusError;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
