use serde::Serialize;
use std::fmt::Write as _;

use super::function::{DataShape, Direction, FunctionCode};
use crate::utils::error::ModbusError;

/// Data moved by one transaction, tagged by its storage form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "values", rename_all = "snake_case")]
pub enum DataBuffer {
    Scalar(u16),
    Bytes(Vec<u8>),
    Words(Vec<u16>),
}

impl DataBuffer {
    pub fn shape(&self) -> DataShape {
        match self {
            DataBuffer::Scalar(_) => DataShape::Scalar,
            DataBuffer::Bytes(_) => DataShape::ByteArray,
            DataBuffer::Words(_) => DataShape::WordArray,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DataBuffer::Scalar(_) => 1,
            DataBuffer::Bytes(bytes) => bytes.len(),
            DataBuffer::Words(words) => words.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the first `units` values.
    pub fn truncated(&self, units: usize) -> DataBuffer {
        match self {
            DataBuffer::Scalar(value) => DataBuffer::Scalar(*value),
            DataBuffer::Bytes(bytes) => DataBuffer::Bytes(bytes.iter().take(units).copied().collect()),
            DataBuffer::Words(words) => DataBuffer::Words(words.iter().take(units).copied().collect()),
        }
    }

    /// `0x%04x` for a scalar, otherwise one `0x%02x ` / `0x%04x ` per element.
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        match self {
            DataBuffer::Scalar(value) => {
                let _ = write!(out, "0x{:04x}", value);
            }
            DataBuffer::Bytes(bytes) => {
                for byte in bytes {
                    let _ = write!(out, "0x{:02x} ", byte);
                }
            }
            DataBuffer::Words(words) => {
                for word in words {
                    let _ = write!(out, "0x{:04x} ", word);
                }
            }
        }
        out
    }
}

/// The single buffer backing every transaction of a run.
///
/// Write payloads are fixed once built; read buffers are overwritten by
/// each transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBuffer {
    direction: Direction,
    units: u16,
    data: DataBuffer,
}

impl RequestBuffer {
    pub fn build(
        shape: DataShape,
        direction: Direction,
        requested_count: u16,
        write_values: &[i64],
    ) -> Result<Self, ModbusError> {
        match direction {
            Direction::Read => {
                if requested_count == 0 {
                    return Err(ModbusError::ConfigError(
                        "Data read count must be at least 1".to_string(),
                    ));
                }
                let count = requested_count as usize;
                let data = match shape {
                    DataShape::Scalar => DataBuffer::Scalar(0),
                    DataShape::ByteArray => DataBuffer::Bytes(vec![0; count]),
                    DataShape::WordArray => DataBuffer::Words(vec![0; count]),
                };
                Ok(Self { direction, units: requested_count, data })
            }
            Direction::Write => {
                let first = match write_values.first() {
                    Some(value) => *value,
                    None => {
                        return Err(ModbusError::ConfigError(
                            "Write function chosen but no data to write".to_string(),
                        ))
                    }
                };
                let units = u16::try_from(write_values.len()).map_err(|_| {
                    ModbusError::ConfigError(format!("Too many values to write: {}", write_values.len()))
                })?;
                let (units, data) = match shape {
                    // values are truncated to the element width on purpose
                    DataShape::Scalar => (1, DataBuffer::Scalar(first as u16)),
                    DataShape::ByteArray => (
                        units,
                        DataBuffer::Bytes(write_values.iter().map(|v| *v as u8).collect()),
                    ),
                    DataShape::WordArray => (
                        units,
                        DataBuffer::Words(write_values.iter().map(|v| *v as u16).collect()),
                    ),
                };
                Ok(Self { direction, units, data })
            }
        }
    }

    /// Builds the buffer for `function` and checks PDU and address-space limits.
    pub fn for_function(
        function: FunctionCode,
        register: u16,
        requested_count: u16,
        write_values: &[i64],
    ) -> Result<Self, ModbusError> {
        let (shape, direction) = function.resolve();
        let buffer = Self::build(shape, direction, requested_count, write_values)?;

        if buffer.units > function.max_quantity() {
            return Err(ModbusError::ConfigError(format!(
                "{} supports at most {} elements, got {}",
                function.name(),
                function.max_quantity(),
                buffer.units
            )));
        }
        if register as u32 + buffer.units as u32 > 0x1_0000 {
            return Err(ModbusError::ConfigError(format!(
                "Register range {}+{} exceeds the Modbus address space",
                register, buffer.units
            )));
        }
        Ok(buffer)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Effective unit count every transaction requests.
    pub fn units(&self) -> u16 {
        self.units
    }

    pub fn data(&self) -> &DataBuffer {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut DataBuffer {
        &mut self.data
    }

    /// Verbose echo of the payload about to be written.
    pub fn payload_hex(&self) -> Option<String> {
        match self.direction {
            Direction::Write => Some(self.data.to_hex()),
            Direction::Read => None,
        }
    }
}
