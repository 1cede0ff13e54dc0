use log::{debug, error, info};
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio_modbus::client::sync::{self, Context};
use tokio_modbus::prelude::{Slave, SlaveContext, SyncReader, SyncWriter};

use super::protocol::SerialLink;
use crate::config::{ParityConfig, SerialConfig, TcpConfig, TransportConfig};
use crate::utils::error::ModbusError;

/// Blocking per-operation calls against one open link.
///
/// Every call returns the number of units the device acknowledged.
pub trait ModbusTransport {
    fn set_slave(&mut self, address: u8);

    fn read_bits(&mut self, offset: u16, count: u16, dest: &mut [u8]) -> Result<usize, ModbusError>;

    fn read_registers(&mut self, offset: u16, count: u16, dest: &mut [u16]) -> Result<usize, ModbusError>;

    fn read_input_registers(
        &mut self,
        offset: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError>;

    fn write_bit(&mut self, offset: u16, value: bool) -> Result<usize, ModbusError>;

    fn write_register(&mut self, offset: u16, value: u16) -> Result<usize, ModbusError>;

    fn write_bits(&mut self, offset: u16, values: &[u8]) -> Result<usize, ModbusError>;

    fn write_registers(&mut self, offset: u16, values: &[u16]) -> Result<usize, ModbusError>;
}

/// Opens one transport per serial line setting, or the single TCP peer.
pub trait Connector {
    type Transport: ModbusTransport;

    fn connect(&mut self, link: Option<SerialLink>) -> Result<Self::Transport, ModbusError>;
}

pub struct ModbusClient {
    ctx: Context,
}

/// Connector backed by the synchronous `tokio-modbus` client.
pub struct ModbusConnector {
    transport: TransportConfig,
    timeout: Duration,
}

impl ModbusConnector {
    pub fn new(transport: TransportConfig, timeout_ms: u64) -> Self {
        Self { transport, timeout: Duration::from_millis(timeout_ms) }
    }

    fn connect_rtu(&self, serial: &SerialConfig, link: SerialLink) -> Result<Context, ModbusError> {
        info!(
            "🔌 Connecting to Modbus RTU port: {} ({} baud, {}{}{})",
            serial.device,
            link.baud_rate,
            serial.data_bits,
            link.parity.letter(),
            serial.stop_bits
        );

        let parity = match link.parity {
            ParityConfig::None => tokio_serial::Parity::None,
            ParityConfig::Even => tokio_serial::Parity::Even,
            ParityConfig::Odd => tokio_serial::Parity::Odd,
        };
        let data_bits = match serial.data_bits {
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };
        let stop_bits = match serial.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        let builder = tokio_serial::new(&serial.device, link.baud_rate)
            .parity(parity)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .timeout(self.timeout);

        sync::rtu::connect_slave_with_timeout(&builder, Slave::broadcast(), Some(self.timeout))
            .map_err(|e| {
                error!("❌ Failed to open serial port {}: {}", serial.device, e);
                ModbusError::ConnectionError(format!("{}: {}", serial.device, e))
            })
    }

    fn connect_tcp(&self, tcp: &TcpConfig) -> Result<Context, ModbusError> {
        let ip: IpAddr = tcp
            .ip
            .parse()
            .map_err(|e| ModbusError::ConfigError(format!("Invalid IP address {}: {}", tcp.ip, e)))?;
        let socket_addr = SocketAddr::new(ip, tcp.port);
        info!("🔌 Connecting to Modbus TCP peer: {}", socket_addr);

        sync::tcp::connect_slave_with_timeout(socket_addr, Slave::broadcast(), Some(self.timeout))
            .map_err(|e| {
                error!("❌ Failed to connect to {}: {}", socket_addr, e);
                ModbusError::ConnectionError(format!("{}: {}", socket_addr, e))
            })
    }
}

impl Connector for ModbusConnector {
    type Transport = ModbusClient;

    fn connect(&mut self, link: Option<SerialLink>) -> Result<ModbusClient, ModbusError> {
        let mut ctx = match (&self.transport, link) {
            (TransportConfig::Rtu(serial), Some(link)) => self.connect_rtu(serial, link)?,
            (TransportConfig::Tcp(tcp), None) => self.connect_tcp(tcp)?,
            (TransportConfig::Rtu(_), None) => {
                return Err(ModbusError::ConfigError("RTU link needs baud rate and parity".to_string()))
            }
            (TransportConfig::Tcp(_), Some(_)) => {
                return Err(ModbusError::ConfigError("TCP link takes no serial settings".to_string()))
            }
        };
        ctx.set_timeout(Some(self.timeout));
        info!("✅ Modbus connection established");
        Ok(ModbusClient { ctx })
    }
}

/// Collapses the nested `tokio-modbus` result into ours.
fn flatten<T>(result: tokio_modbus::Result<T>) -> Result<T, ModbusError> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => Err(ModbusError::Exception(exception.to_string())),
        Err(tokio_modbus::Error::Transport(err)) => Err(err.into()),
        Err(err) => Err(ModbusError::InvalidResponse(err.to_string())),
    }
}

impl ModbusTransport for ModbusClient {
    fn set_slave(&mut self, address: u8) {
        debug!("Target slave address {}", address);
        self.ctx.set_slave(Slave(address));
    }

    fn read_bits(&mut self, offset: u16, count: u16, dest: &mut [u8]) -> Result<usize, ModbusError> {
        let coils = flatten(self.ctx.read_coils(offset, count))?;
        for (slot, coil) in dest.iter_mut().zip(coils.iter()) {
            *slot = u8::from(*coil);
        }
        Ok(coils.len().min(count as usize))
    }

    fn read_registers(&mut self, offset: u16, count: u16, dest: &mut [u16]) -> Result<usize, ModbusError> {
        let words = flatten(self.ctx.read_holding_registers(offset, count))?;
        for (slot, word) in dest.iter_mut().zip(words.iter()) {
            *slot = *word;
        }
        Ok(words.len())
    }

    fn read_input_registers(
        &mut self,
        offset: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError> {
        let words = flatten(self.ctx.read_input_registers(offset, count))?;
        for (slot, word) in dest.iter_mut().zip(words.iter()) {
            *slot = *word;
        }
        Ok(words.len())
    }

    fn write_bit(&mut self, offset: u16, value: bool) -> Result<usize, ModbusError> {
        flatten(self.ctx.write_single_coil(offset, value))?;
        Ok(1)
    }

    fn write_register(&mut self, offset: u16, value: u16) -> Result<usize, ModbusError> {
        flatten(self.ctx.write_single_register(offset, value))?;
        Ok(1)
    }

    fn write_bits(&mut self, offset: u16, values: &[u8]) -> Result<usize, ModbusError> {
        let coils: Vec<bool> = values.iter().map(|v| *v != 0).collect();
        flatten(self.ctx.write_multiple_coils(offset, &coils))?;
        Ok(coils.len())
    }

    fn write_registers(&mut self, offset: u16, values: &[u16]) -> Result<usize, ModbusError> {
        flatten(self.ctx.write_multiple_registers(offset, values))?;
        Ok(values.len())
    }
}

/// Prints the serial ports the OS knows about.
pub fn list_serial_ports<W: Write>(out: &mut W) -> Result<usize, ModbusError> {
    let ports = serialport::available_ports()
        .map_err(|e| ModbusError::CommunicationError(format!("Cannot enumerate serial ports: {}", e)))?;

    writeln!(out, "📡 Available Serial Ports:")?;
    if ports.is_empty() {
        writeln!(out, "   ⚠️  No serial ports found")?;
        return Ok(0);
    }

    for (index, port) in ports.iter().enumerate() {
        writeln!(out, "   {}. {}", index + 1, port.port_name)?;
        if let serialport::SerialPortType::UsbPort(usb_info) = &port.port_type {
            if let Some(manufacturer) = &usb_info.manufacturer {
                writeln!(out, "      📱 Manufacturer: {}", manufacturer)?;
            }
            if let Some(serial_number) = &usb_info.serial_number {
                writeln!(out, "      🔢 Serial Number: {}", serial_number)?;
            }
        }
    }
    Ok(ports.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio_modbus::ExceptionCode;

    #[test]
    fn test_flatten_results() {
        assert_eq!(flatten::<u16>(Ok(Ok(7))), Ok(7));

        let exception = flatten::<u16>(Ok(Err(ExceptionCode::IllegalDataAddress)));
        assert!(matches!(exception, Err(ModbusError::Exception(_))));

        let timeout = flatten::<u16>(Err(tokio_modbus::Error::Transport(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "no reply",
        ))));
        assert!(matches!(timeout, Err(ModbusError::Timeout(_))));
    }

    #[test]
    fn test_mismatched_link_rejected_before_io() {
        let mut connector = ModbusConnector::new(TransportConfig::Tcp(TcpConfig::default()), 100);
        let link = SerialLink { baud_rate: 9600, parity: ParityConfig::Even };
        assert!(matches!(connector.connect(Some(link)), Err(ModbusError::ConfigError(_))));

        let mut connector = ModbusConnector::new(
            TransportConfig::Tcp(TcpConfig { ip: "not-an-ip".into(), port: 502 }),
            100,
        );
        assert!(matches!(connector.connect(None), Err(ModbusError::ConfigError(_))));
    }

    #[test]
    fn test_unreachable_peer_gives_up_within_timeout() {
        // non-routable, the SYN is never answered
        let mut connector = ModbusConnector::new(
            TransportConfig::Tcp(TcpConfig { ip: "10.255.255.1".into(), port: 502 }),
            100,
        );
        let started = Instant::now();
        let result = connector.connect(None);
        assert!(matches!(result, Err(ModbusError::ConnectionError(_))));
        assert!(started.elapsed() < Duration::from_secs(5), "took {:?}", started.elapsed());
    }
}
