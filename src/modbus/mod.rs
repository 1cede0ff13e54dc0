pub mod buffer;
pub mod client;
pub mod function;
#[cfg(test)]
pub(crate) mod mock;
pub mod protocol;

pub use buffer::{DataBuffer, RequestBuffer};
pub use client::{list_serial_ports, Connector, ModbusClient, ModbusConnector, ModbusTransport};
pub use function::{DataShape, Direction, FunctionCode};
pub use protocol::{AddressSpec, LinkPlan, Outcome, ScanAxis, ScanPoint, SerialLink, TransactionResult};
