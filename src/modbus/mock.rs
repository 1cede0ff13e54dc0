//! Recording transport used by the unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use super::client::{Connector, ModbusTransport};
use super::protocol::SerialLink;
use crate::utils::error::ModbusError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(Option<SerialLink>),
    SetSlave(u8),
    ReadBits { offset: u16, count: u16 },
    ReadRegisters { offset: u16, count: u16 },
    ReadInputRegisters { offset: u16, count: u16 },
    WriteBit { offset: u16, value: bool },
    WriteRegister { offset: u16, value: u16 },
    WriteBits { offset: u16, values: Vec<u8> },
    WriteRegisters { offset: u16, values: Vec<u16> },
}

/// Decides what a transaction returns: `(link, slave, requested units)`.
pub type Reply = Rc<dyn Fn(Option<SerialLink>, u8, usize) -> Result<usize, ModbusError>>;

pub struct MockConnector {
    pub calls: Rc<RefCell<Vec<Call>>>,
    pub data: Vec<u16>,
    reply: Reply,
    fail_connect_after: Option<usize>,
    connects: usize,
}

impl MockConnector {
    pub fn new(
        reply: impl Fn(Option<SerialLink>, u8, usize) -> Result<usize, ModbusError> + 'static,
    ) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            data: Vec::new(),
            reply: Rc::new(reply),
            fail_connect_after: None,
            connects: 0,
        }
    }

    /// Every slave answers every request in full.
    pub fn always_ok() -> Self {
        Self::new(|_, _, requested| Ok(requested))
    }

    /// Only the listed slaves answer; the rest time out.
    pub fn responding(addresses: &[u8]) -> Self {
        let addresses = addresses.to_vec();
        Self::new(move |_, slave, requested| {
            if addresses.contains(&slave) {
                Ok(requested)
            } else {
                Err(ModbusError::Timeout("Connection timed out".to_string()))
            }
        })
    }

    pub fn with_data(mut self, data: Vec<u16>) -> Self {
        self.data = data;
        self
    }

    /// The connection after `count` successful ones fails.
    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_connect_after = Some(count);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Calls made through an open transport, i.e. everything but connects.
    pub fn transport_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Connect(_)))
            .collect()
    }

    pub fn connect_calls(&self) -> Vec<Option<SerialLink>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Connect(link) => Some(link),
                _ => None,
            })
            .collect()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(&mut self, link: Option<SerialLink>) -> Result<MockTransport, ModbusError> {
        self.calls.borrow_mut().push(Call::Connect(link));
        if self.fail_connect_after == Some(self.connects) {
            return Err(ModbusError::ConnectionError("No such file or directory".to_string()));
        }
        self.connects += 1;
        Ok(MockTransport {
            calls: Rc::clone(&self.calls),
            data: self.data.clone(),
            reply: Rc::clone(&self.reply),
            link,
            slave: 0,
        })
    }
}

pub struct MockTransport {
    calls: Rc<RefCell<Vec<Call>>>,
    data: Vec<u16>,
    reply: Reply,
    link: Option<SerialLink>,
    slave: u8,
}

impl MockTransport {
    fn answer(&self, requested: usize) -> Result<usize, ModbusError> {
        (self.reply)(self.link, self.slave, requested)
    }

    fn fill<T: Copy>(&self, dest: &mut [T], transferred: usize, convert: impl Fn(u16) -> T) {
        for (i, slot) in dest.iter_mut().take(transferred).enumerate() {
            if let Some(value) = self.data.get(i) {
                *slot = convert(*value);
            }
        }
    }
}

impl ModbusTransport for MockTransport {
    fn set_slave(&mut self, address: u8) {
        self.slave = address;
        self.calls.borrow_mut().push(Call::SetSlave(address));
    }

    fn read_bits(&mut self, offset: u16, count: u16, dest: &mut [u8]) -> Result<usize, ModbusError> {
        self.calls.borrow_mut().push(Call::ReadBits { offset, count });
        let transferred = self.answer(count as usize)?;
        self.fill(dest, transferred, |v| v as u8);
        Ok(transferred)
    }

    fn read_registers(&mut self, offset: u16, count: u16, dest: &mut [u16]) -> Result<usize, ModbusError> {
        self.calls.borrow_mut().push(Call::ReadRegisters { offset, count });
        let transferred = self.answer(count as usize)?;
        self.fill(dest, transferred, |v| v);
        Ok(transferred)
    }

    fn read_input_registers(
        &mut self,
        offset: u16,
        count: u16,
        dest: &mut [u16],
    ) -> Result<usize, ModbusError> {
        self.calls.borrow_mut().push(Call::ReadInputRegisters { offset, count });
        let transferred = self.answer(count as usize)?;
        self.fill(dest, transferred, |v| v);
        Ok(transferred)
    }

    fn write_bit(&mut self, offset: u16, value: bool) -> Result<usize, ModbusError> {
        self.calls.borrow_mut().push(Call::WriteBit { offset, value });
        self.answer(1)
    }

    fn write_register(&mut self, offset: u16, value: u16) -> Result<usize, ModbusError> {
        self.calls.borrow_mut().push(Call::WriteRegister { offset, value });
        self.answer(1)
    }

    fn write_bits(&mut self, offset: u16, values: &[u8]) -> Result<usize, ModbusError> {
        self.calls
            .borrow_mut()
            .push(Call::WriteBits { offset, values: values.to_vec() });
        self.answer(values.len())
    }

    fn write_registers(&mut self, offset: u16, values: &[u16]) -> Result<usize, ModbusError> {
        self.calls
            .borrow_mut()
            .push(Call::WriteRegisters { offset, values: values.to_vec() });
        self.answer(values.len())
    }
}
