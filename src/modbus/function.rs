use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::ModbusError;

/// The Modbus functions this tool can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

/// Storage form of the data a function moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataShape {
    Scalar,
    ByteArray,
    WordArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Read,
    Write,
}

impl FunctionCode {
    pub const ALL: [FunctionCode; 8] = [
        FunctionCode::ReadCoils,
        FunctionCode::ReadDiscreteInputs,
        FunctionCode::ReadHoldingRegisters,
        FunctionCode::ReadInputRegisters,
        FunctionCode::WriteSingleCoil,
        FunctionCode::WriteSingleRegister,
        FunctionCode::WriteMultipleCoils,
        FunctionCode::WriteMultipleRegisters,
    ];

    /// Shape and direction are always derived together from the code.
    pub fn resolve(self) -> (DataShape, Direction) {
        use DataShape::*;
        use Direction::*;
        match self {
            FunctionCode::ReadCoils => (ByteArray, Read),
            FunctionCode::ReadDiscreteInputs => (Scalar, Read),
            FunctionCode::ReadHoldingRegisters => (WordArray, Read),
            FunctionCode::ReadInputRegisters => (WordArray, Read),
            FunctionCode::WriteSingleCoil => (Scalar, Write),
            FunctionCode::WriteSingleRegister => (Scalar, Write),
            FunctionCode::WriteMultipleCoils => (ByteArray, Write),
            FunctionCode::WriteMultipleRegisters => (WordArray, Write),
        }
    }

    pub fn shape(self) -> DataShape {
        self.resolve().0
    }

    pub fn direction(self) -> Direction {
        self.resolve().1
    }

    pub fn code(self) -> u8 {
        match self {
            FunctionCode::ReadCoils => 0x01,
            FunctionCode::ReadDiscreteInputs => 0x02,
            FunctionCode::ReadHoldingRegisters => 0x03,
            FunctionCode::ReadInputRegisters => 0x04,
            FunctionCode::WriteSingleCoil => 0x05,
            FunctionCode::WriteSingleRegister => 0x06,
            FunctionCode::WriteMultipleCoils => 0x0F,
            FunctionCode::WriteMultipleRegisters => 0x10,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FunctionCode::ReadCoils => "ReadCoils",
            FunctionCode::ReadDiscreteInputs => "ReadDiscreteInputs",
            FunctionCode::ReadHoldingRegisters => "ReadHoldingRegisters",
            FunctionCode::ReadInputRegisters => "ReadInputRegisters",
            FunctionCode::WriteSingleCoil => "WriteSingleCoil",
            FunctionCode::WriteSingleRegister => "WriteSingleRegister",
            FunctionCode::WriteMultipleCoils => "WriteMultipleCoils",
            FunctionCode::WriteMultipleRegisters => "WriteMultipleRegisters",
        }
    }

    /// Largest quantity a single PDU of this function may carry.
    pub fn max_quantity(self) -> u16 {
        match self {
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs => 2000,
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => 125,
            FunctionCode::WriteSingleCoil | FunctionCode::WriteSingleRegister => 1,
            FunctionCode::WriteMultipleCoils => 1968,
            FunctionCode::WriteMultipleRegisters => 123,
        }
    }

    /// Transaction path exists in the scan engine.
    pub fn is_implemented(self) -> bool {
        !matches!(self, FunctionCode::ReadDiscreteInputs)
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = ModbusError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        FunctionCode::ALL
            .into_iter()
            .find(|f| f.code() == code)
            .ok_or_else(|| {
                ModbusError::ConfigError(format!("No correct function chosen: 0x{:02x}", code))
            })
    }
}

impl TryFrom<i64> for FunctionCode {
    type Error = ModbusError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        u8::try_from(code)
            .map_err(|_| ModbusError::ConfigError(format!("No correct function chosen: {}", code)))
            .and_then(FunctionCode::try_from)
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} : {}", self.code(), self.name())
    }
}
