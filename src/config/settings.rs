use clap::ArgMatches;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::modbus::protocol::{LinkPlan, ScanAxis};
use crate::utils::error::ModbusError;
use crate::utils::parse::parse_bounded;

pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_TCP_PORT: u16 = 502;
pub const DEFAULT_TCP_IP: &str = "127.0.0.1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub verbosity: u8,
    #[serde(default)]
    pub base_one: bool,
    #[serde(default)]
    pub output: OutputFormat,
    // tables must follow plain values in TOML
    pub transport: TransportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransportConfig {
    Rtu(SerialConfig),
    Tcp(TcpConfig),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rates: Vec<u32>,
    #[serde(default = "default_parities")]
    pub parities: Vec<ParityConfig>,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TcpConfig {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ParityConfig {
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_parities() -> Vec<ParityConfig> {
    vec![ParityConfig::Even]
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_ip() -> String {
    DEFAULT_TCP_IP.to_string()
}

fn default_port() -> u16 {
    DEFAULT_TCP_PORT
}

impl ParityConfig {
    pub fn letter(self) -> char {
        match self {
            ParityConfig::None => 'N',
            ParityConfig::Even => 'E',
            ParityConfig::Odd => 'O',
        }
    }
}

impl FromStr for ParityConfig {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NONE" => Ok(ParityConfig::None),
            "E" | "EVEN" => Ok(ParityConfig::Even),
            "O" | "ODD" => Ok(ParityConfig::Odd),
            other => Err(ModbusError::ConfigError(format!("Invalid parity: {}", other))),
        }
    }
}

impl fmt::Display for ParityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for OutputFormat {
    type Err = ModbusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            other => Err(ModbusError::ConfigError(format!("Unknown output format: {}", other))),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            baud_rates: Vec::new(),
            parities: default_parities(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
        }
    }
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self { ip: default_ip(), port: default_port() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportConfig::Tcp(TcpConfig::default()),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            verbosity: 0,
            base_one: false,
            output: OutputFormat::Console,
        }
    }
}

impl Config {
    /// Builds the run configuration from an `rtu` or `tcp` subcommand.
    ///
    /// A `--config` file supplies defaults; explicit flags win.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, ModbusError> {
        let (name, sub) = matches
            .subcommand()
            .ok_or_else(|| ModbusError::ConfigError("Missing <rtu|tcp> command.".to_string()))?;

        let mut config = match sub.get_one::<String>("config") {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        match name {
            "rtu" => {
                let mut serial = match config.transport {
                    TransportConfig::Rtu(serial) => serial,
                    TransportConfig::Tcp(_) => SerialConfig::default(),
                };
                if let Some(device) = sub.get_one::<String>("dev") {
                    serial.device = device.clone();
                }
                if let Some(bauds) = sub.get_many::<String>("baud") {
                    serial.baud_rates = bauds
                        .map(|b| parse_bounded::<u32>(b, "baud rate"))
                        .collect::<Result<_, _>>()?;
                }
                if let Some(parities) = sub.get_many::<String>("parity") {
                    serial.parities = parities
                        .map(|p| p.parse::<ParityConfig>())
                        .collect::<Result<_, _>>()?;
                }
                if let Some(bits) = sub.get_one::<String>("data-bits") {
                    serial.data_bits = parse_bounded(bits, "data bits")?;
                }
                if let Some(bits) = sub.get_one::<String>("stop-bits") {
                    serial.stop_bits = parse_bounded(bits, "stop bits")?;
                }
                config.transport = TransportConfig::Rtu(serial);
            }
            "tcp" => {
                let mut tcp = match config.transport {
                    TransportConfig::Tcp(tcp) => tcp,
                    TransportConfig::Rtu(_) => TcpConfig::default(),
                };
                if let Some(ip) = sub.get_one::<String>("ip") {
                    tcp.ip = ip.clone();
                }
                if let Some(port) = sub.get_one::<String>("port") {
                    tcp.port = parse_bounded(port, "port")?;
                }
                config.transport = TransportConfig::Tcp(tcp);
            }
            other => {
                return Err(ModbusError::ConfigError(format!("Unknown command: {}", other)));
            }
        }

        if let Some(timeout) = sub.get_one::<String>("timeout") {
            config.timeout_ms = parse_bounded(timeout, "timeout")?;
        }
        let verbosity = sub.get_count("verbose");
        if verbosity > 0 {
            config.verbosity = verbosity;
        }
        if sub.get_flag("base-1") {
            config.base_one = true;
        }
        if let Some(format) = sub.get_one::<String>("format") {
            config.output = format.parse()?;
        }

        config.validate()?;
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModbusError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModbusError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)?;
        info!("📄 Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ModbusError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ModbusError::ConfigError(format!("Cannot create {}: {}", parent.display(), e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            ModbusError::ConfigError(format!("Cannot write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ModbusError> {
        if self.timeout_ms == 0 {
            return Err(ModbusError::ConfigError("Request timeout must be positive".to_string()));
        }
        if self.verbosity > 2 {
            return Err(ModbusError::ConfigError(format!(
                "Verbosity level {} is above the maximum of 2",
                self.verbosity
            )));
        }

        match &self.transport {
            TransportConfig::Rtu(serial) => {
                if serial.device.is_empty() {
                    return Err(ModbusError::ConfigError("Serial device not set".to_string()));
                }
                if serial.baud_rates.is_empty() {
                    return Err(ModbusError::ConfigError("At least one baud rate required".to_string()));
                }
                if serial.parities.is_empty() {
                    return Err(ModbusError::ConfigError("At least one parity required".to_string()));
                }
                if !matches!(serial.data_bits, 7 | 8) {
                    return Err(ModbusError::ConfigError(format!(
                        "Data bits must be 7 or 8, got {}",
                        serial.data_bits
                    )));
                }
                if !matches!(serial.stop_bits, 1 | 2) {
                    return Err(ModbusError::ConfigError(format!(
                        "Stop bits must be 1 or 2, got {}",
                        serial.stop_bits
                    )));
                }
            }
            TransportConfig::Tcp(tcp) => {
                if tcp.ip.is_empty() {
                    return Err(ModbusError::ConfigError("Device IP address not set".to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn verbose(&self) -> bool {
        self.verbosity > 0
    }

    /// Level 2 turns on transport frame tracing.
    pub fn wire_trace(&self) -> bool {
        self.verbosity > 1
    }

    /// Default `env_logger` filter for this verbosity; `RUST_LOG` wins.
    pub fn log_filter(&self) -> &'static str {
        if self.wire_trace() {
            "modbusc=debug,tokio_modbus=trace"
        } else if self.verbose() {
            "modbusc=info"
        } else {
            "warn"
        }
    }

    pub fn link_plan(&self) -> Result<LinkPlan, ModbusError> {
        match &self.transport {
            TransportConfig::Rtu(serial) => Ok(LinkPlan::Serial {
                baud_rates: ScanAxis::new(serial.baud_rates.clone(), "baud rate")?,
                parities: ScanAxis::new(serial.parities.clone(), "parity")?,
            }),
            TransportConfig::Tcp(_) => Ok(LinkPlan::Tcp),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::build_cli;

    fn matches(args: &[&str]) -> ArgMatches {
        build_cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn test_rtu_from_matches() {
        let config = Config::from_matches(&matches(&[
            "modbusc", "rtu", "-d", "/dev/ttyUSB0", "-b", "9600", "-b", "19200", "-p", "n", "-p",
            "E", "-a", "1", "-r", "0", "-f", "3", "-vv", "-o", "250",
        ]))
        .unwrap();

        match &config.transport {
            TransportConfig::Rtu(serial) => {
                assert_eq!(serial.device, "/dev/ttyUSB0");
                assert_eq!(serial.baud_rates, vec![9600, 19200]);
                assert_eq!(serial.parities, vec![ParityConfig::None, ParityConfig::Even]);
                assert_eq!(serial.data_bits, 8);
                assert_eq!(serial.stop_bits, 1);
            }
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.verbosity, 2);
        assert!(config.wire_trace());
        assert!(config.link_plan().unwrap().is_scan());
    }

    #[test]
    fn test_rtu_parity_defaults_to_even() {
        let config = Config::from_matches(&matches(&[
            "modbusc", "rtu", "-d", "/dev/ttyS0", "-b", "9600", "-a", "1", "-r", "0", "-f", "1",
        ]))
        .unwrap();
        match &config.transport {
            TransportConfig::Rtu(serial) => assert_eq!(serial.parities, vec![ParityConfig::Even]),
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!config.verbose());
    }

    #[test]
    fn test_tcp_defaults() {
        let config = Config::from_matches(&matches(&[
            "modbusc", "tcp", "-a", "1.10", "-r", "0", "-f", "3", "--format", "json",
        ]))
        .unwrap();
        assert_eq!(config.transport, TransportConfig::Tcp(TcpConfig::default()));
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.link_plan().unwrap(), LinkPlan::Tcp);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config {
            transport: TransportConfig::Rtu(SerialConfig {
                device: "/dev/ttyUSB0".into(),
                baud_rates: vec![9600],
                ..SerialConfig::default()
            }),
            ..Config::default()
        };
        assert!(config.validate().is_ok());

        config.verbosity = 3;
        assert!(config.validate().is_err());
        config.verbosity = 0;

        config.timeout_ms = 0;
        assert!(config.validate().is_err());
        config.timeout_ms = 100;

        if let TransportConfig::Rtu(serial) = &mut config.transport {
            serial.data_bits = 6;
        }
        assert!(matches!(config.validate(), Err(ModbusError::ConfigError(_))));
    }

    #[test]
    fn test_file_round_trip_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.toml");

        let saved = Config {
            transport: TransportConfig::Rtu(SerialConfig {
                device: "/dev/ttyAMA0".into(),
                baud_rates: vec![4800, 9600],
                parities: vec![ParityConfig::Odd],
                data_bits: 7,
                stop_bits: 2,
            }),
            timeout_ms: 500,
            verbosity: 1,
            base_one: true,
            output: OutputFormat::Console,
        };
        saved.save_to_file(&path).unwrap();
        assert_eq!(Config::from_file(&path).unwrap(), saved);

        let path_str = path.to_str().unwrap();
        let merged = Config::from_matches(&matches(&[
            "modbusc", "rtu", "--config", path_str, "-b", "115200", "-a", "1", "-r", "1", "-f",
            "3",
        ]))
        .unwrap();
        match merged.transport {
            TransportConfig::Rtu(serial) => {
                assert_eq!(serial.device, "/dev/ttyAMA0");
                assert_eq!(serial.baud_rates, vec![115200]);
                assert_eq!(serial.parities, vec![ParityConfig::Odd]);
                assert_eq!(serial.data_bits, 7);
            }
            other => panic!("unexpected transport {:?}", other),
        }
        assert_eq!(merged.timeout_ms, 500);
        assert!(merged.base_one);
    }

    #[test]
    fn test_log_filter_follows_verbosity() {
        let mut config = Config::default();
        assert_eq!(config.log_filter(), "warn");
        config.verbosity = 1;
        assert_eq!(config.log_filter(), "modbusc=info");
        config.verbosity = 2;
        assert!(config.wire_trace());
        assert!(config.log_filter().contains("tokio_modbus=trace"));
    }

    #[test]
    fn test_parity_parse() {
        assert_eq!("e".parse::<ParityConfig>().unwrap(), ParityConfig::Even);
        assert_eq!("O".parse::<ParityConfig>().unwrap(), ParityConfig::Odd);
        assert!("X".parse::<ParityConfig>().is_err());
    }
}
