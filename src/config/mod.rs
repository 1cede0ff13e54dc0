pub mod settings;

pub use settings::{Config, OutputFormat, ParityConfig, SerialConfig, TcpConfig, TransportConfig};
