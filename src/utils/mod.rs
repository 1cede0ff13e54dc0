pub mod error;
pub mod parse;

pub use error::ModbusError;
pub use parse::parse_int;
