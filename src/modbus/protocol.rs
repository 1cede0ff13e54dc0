use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::ops::RangeInclusive;

use super::buffer::DataBuffer;
use super::function::FunctionCode;
use crate::config::ParityConfig;
use crate::utils::error::ModbusError;
use crate::utils::parse::parse_bounded;

/// Ordered, non-empty candidate values for one scan dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanAxis<T> {
    values: Vec<T>,
}

impl<T: Clone> ScanAxis<T> {
    pub fn new(values: Vec<T>, name: &str) -> Result<Self, ModbusError> {
        if values.is_empty() {
            return Err(ModbusError::ConfigError(format!("{} needs at least one value", name)));
        }
        Ok(Self { values })
    }

    pub fn single(value: T) -> Self {
        Self { values: vec![value] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// More than one candidate means this dimension is swept.
    pub fn is_scan(&self) -> bool {
        self.values.len() > 1
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }
}

/// Slave address selection: one device, or an inclusive `start.end` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpec {
    Single(u8),
    Range { start: u8, end: u8 },
}

impl AddressSpec {
    pub fn parse(spec: &str) -> Result<Self, ModbusError> {
        match spec.split_once('.') {
            Some((start, end)) => Self::range(
                parse_bounded(start, "slave address")?,
                parse_bounded(end, "slave address")?,
            ),
            None => Ok(AddressSpec::Single(parse_bounded(spec, "slave address")?)),
        }
    }

    pub fn range(start: u8, end: u8) -> Result<Self, ModbusError> {
        if start >= end {
            return Err(ModbusError::ConfigError(format!(
                "Scan ending address must be bigger than starting address ({}.{})",
                start, end
            )));
        }
        Ok(AddressSpec::Range { start, end })
    }

    pub fn addresses(&self) -> RangeInclusive<u8> {
        match *self {
            AddressSpec::Single(address) => address..=address,
            AddressSpec::Range { start, end } => start..=end,
        }
    }

    /// Number of slave addresses covered, at least one.
    pub fn count(&self) -> usize {
        self.addresses().count()
    }

    pub fn is_scan(&self) -> bool {
        matches!(self, AddressSpec::Range { .. })
    }

    /// Re-checks the range invariant for values not built through `range`.
    pub fn validate(&self) -> Result<(), ModbusError> {
        match *self {
            AddressSpec::Single(_) => Ok(()),
            AddressSpec::Range { start, end } => Self::range(start, end).map(|_| ()),
        }
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Single(address) => write!(f, "{}", address),
            AddressSpec::Range { start, end } => write!(f, "{}.{}", start, end),
        }
    }
}

/// Line settings for one serial connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SerialLink {
    pub baud_rate: u32,
    pub parity: ParityConfig,
}

impl fmt::Display for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Baudrate:{} Parity:{}", self.baud_rate, self.parity.letter())
    }
}

/// Which connections a run opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPlan {
    Serial {
        baud_rates: ScanAxis<u32>,
        parities: ScanAxis<ParityConfig>,
    },
    Tcp,
}

impl LinkPlan {
    /// Baud rates outer, parities inner; a TCP plan yields exactly one `None`.
    pub fn links(&self) -> Box<dyn Iterator<Item = Option<SerialLink>> + '_> {
        match self {
            LinkPlan::Serial { baud_rates, parities } => Box::new(baud_rates.iter().flat_map(
                move |&baud_rate| {
                    parities.iter().map(move |&parity| Some(SerialLink { baud_rate, parity }))
                },
            )),
            LinkPlan::Tcp => Box::new(std::iter::once(None)),
        }
    }

    pub fn is_scan(&self) -> bool {
        match self {
            LinkPlan::Serial { baud_rates, parities } => baud_rates.is_scan() || parities.is_scan(),
            LinkPlan::Tcp => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        match self {
            LinkPlan::Serial { baud_rates, parities } => baud_rates.len() * parities.len(),
            LinkPlan::Tcp => 1,
        }
    }
}

/// One (link, address) combination of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanPoint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<SerialLink>,
    pub address: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionResult {
    Success { units: u16, payload: DataBuffer },
    Failure { description: String },
    Unsupported,
}

impl TransactionResult {
    /// Success is exactly "the transport moved as many units as requested".
    pub fn classify(
        reported: Result<usize, ModbusError>,
        requested: u16,
        buffer: &DataBuffer,
    ) -> Self {
        match reported {
            Ok(transferred) if transferred == requested as usize => TransactionResult::Success {
                units: requested,
                payload: buffer.truncated(transferred),
            },
            Ok(transferred) => TransactionResult::Failure {
                description: format!(
                    "transferred {} of {} requested elements",
                    transferred, requested
                ),
            },
            Err(err) => TransactionResult::Failure { description: err.to_string() },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TransactionResult::Success { .. })
    }
}

/// Result of one transaction at one scan point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub point: ScanPoint,
    pub function: FunctionCode,
    pub result: TransactionResult,
    pub timestamp: DateTime<Utc>,
}

impl Outcome {
    pub fn new(point: ScanPoint, function: FunctionCode, result: TransactionResult) -> Self {
        Self { point, function, result, timestamp: Utc::now() }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_spec_parse() {
        assert_eq!(AddressSpec::parse("3").unwrap(), AddressSpec::Single(3));
        assert_eq!(
            AddressSpec::parse("1.5").unwrap(),
            AddressSpec::Range { start: 1, end: 5 }
        );
        assert_eq!(
            AddressSpec::parse("0x01.0x0a").unwrap(),
            AddressSpec::Range { start: 1, end: 10 }
        );
        assert!(AddressSpec::parse("300").is_err());
        assert!(AddressSpec::parse("1.x").is_err());
    }

    #[test]
    fn test_address_range_must_increase() {
        for spec in ["5.5", "6.2"] {
            assert!(matches!(AddressSpec::parse(spec), Err(ModbusError::ConfigError(_))));
        }
        let bogus = AddressSpec::Range { start: 9, end: 4 };
        assert!(bogus.validate().is_err());
    }

    #[test]
    fn test_address_iteration_inclusive() {
        let spec = AddressSpec::parse("1.5").unwrap();
        assert_eq!(spec.addresses().collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        assert_eq!(spec.count(), 5);
        assert!(spec.is_scan());

        let single = AddressSpec::Single(17);
        assert_eq!(single.addresses().collect::<Vec<_>>(), vec![17]);
        assert!(!single.is_scan());

        let full = AddressSpec::range(0, 255).unwrap();
        assert_eq!(full.count(), 256);
    }

    #[test]
    fn test_scan_axis() {
        assert!(ScanAxis::<u32>::new(vec![], "baud").is_err());
        let axis = ScanAxis::new(vec![9600, 19200], "baud").unwrap();
        assert!(axis.is_scan());
        assert!(!ScanAxis::single(9600).is_scan());
    }

    #[test]
    fn test_link_plan_order() {
        let plan = LinkPlan::Serial {
            baud_rates: ScanAxis::new(vec![9600, 19200], "baud").unwrap(),
            parities: ScanAxis::new(vec![ParityConfig::None, ParityConfig::Even], "parity").unwrap(),
        };
        let links: Vec<String> = plan.links().map(|l| l.unwrap().to_string()).collect();
        assert_eq!(
            links,
            vec![
                "Baudrate:9600 Parity:N",
                "Baudrate:9600 Parity:E",
                "Baudrate:19200 Parity:N",
                "Baudrate:19200 Parity:E",
            ]
        );
        assert_eq!(plan.connection_count(), 4);
        assert!(plan.is_scan());

        assert_eq!(LinkPlan::Tcp.links().collect::<Vec<_>>(), vec![None]);
        assert!(!LinkPlan::Tcp.is_scan());
    }

    #[test]
    fn test_classification_exact_match_only() {
        let buffer = DataBuffer::Words(vec![1, 2, 3]);
        for requested in [1u16, 3, 10] {
            for transferred in 0..=(requested as usize * 2 + 2) {
                let result = TransactionResult::classify(Ok(transferred), requested, &buffer);
                assert_eq!(result.is_success(), transferred == requested as usize);
            }
            let failed = TransactionResult::classify(
                Err(ModbusError::Timeout("no reply".into())),
                requested,
                &buffer,
            );
            assert_eq!(
                failed,
                TransactionResult::Failure { description: "Response timeout: no reply".into() }
            );
        }
    }

    #[test]
    fn test_success_payload_matches_transfer() {
        let buffer = DataBuffer::Words(vec![1, 2, 3]);
        let result = TransactionResult::classify(Ok(3), 3, &buffer);
        assert_eq!(
            result,
            TransactionResult::Success { units: 3, payload: DataBuffer::Words(vec![1, 2, 3]) }
        );
    }
}
