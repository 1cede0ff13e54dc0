use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::ops::RangeInclusive;

use crate::config::{Config, OutputFormat};
use crate::modbus::{
    AddressSpec, Connector, DataBuffer, Direction, FunctionCode, LinkPlan, ModbusTransport, Outcome,
    RequestBuffer, ScanPoint, SerialLink, TransactionResult,
};
use crate::output::{ConsoleFormatter, JsonFormatter, OutcomeFormatter, ReportContext};
use crate::utils::error::ModbusError;

/// What the operator asked for, independent of how the link is reached.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub function: FunctionCode,
    pub register: u16,
    pub count: u16,
    pub write_values: Vec<i64>,
    pub addresses: AddressSpec,
}

impl ScanRequest {
    /// Start register after applying base-1 addressing.
    pub fn effective_register(&self, base_one: bool) -> Result<u16, ModbusError> {
        if !base_one {
            return Ok(self.register);
        }
        self.register.checked_sub(1).ok_or_else(|| {
            ModbusError::ConfigError("Register 0 does not exist with base-1 addressing".to_string())
        })
    }
}

/// Fully resolved parameter space of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub function: FunctionCode,
    pub register: u16,
    pub links: LinkPlan,
    pub addresses: AddressSpec,
}

impl ScanPlan {
    pub fn point_count(&self) -> usize {
        self.links.connection_count() * self.addresses.count()
    }
}

/// Issues one transaction and classifies it.
pub fn execute_point<T: ModbusTransport>(
    function: FunctionCode,
    register: u16,
    buffer: &mut RequestBuffer,
    transport: &mut T,
    point: ScanPoint,
) -> Outcome {
    if !function.is_implemented() {
        return Outcome::new(point, function, TransactionResult::Unsupported);
    }

    let units = buffer.units();
    if buffer.direction() == Direction::Read {
        // no stale values from the previous point
        match buffer.data_mut() {
            DataBuffer::Scalar(value) => *value = 0,
            DataBuffer::Bytes(bytes) => bytes.iter_mut().for_each(|b| *b = 0),
            DataBuffer::Words(words) => words.iter_mut().for_each(|w| *w = 0),
        }
    }

    transport.set_slave(point.address);
    let reported = match (function, buffer.data_mut()) {
        (FunctionCode::ReadCoils, DataBuffer::Bytes(dest)) => transport.read_bits(register, units, dest),
        (FunctionCode::ReadHoldingRegisters, DataBuffer::Words(dest)) => {
            transport.read_registers(register, units, dest)
        }
        (FunctionCode::ReadInputRegisters, DataBuffer::Words(dest)) => {
            transport.read_input_registers(register, units, dest)
        }
        (FunctionCode::WriteSingleCoil, DataBuffer::Scalar(value)) => {
            transport.write_bit(register, *value != 0)
        }
        (FunctionCode::WriteSingleRegister, DataBuffer::Scalar(value)) => {
            transport.write_register(register, *value)
        }
        (FunctionCode::WriteMultipleCoils, DataBuffer::Bytes(values)) => {
            transport.write_bits(register, values)
        }
        (FunctionCode::WriteMultipleRegisters, DataBuffer::Words(values)) => {
            transport.write_registers(register, values)
        }
        (function, data) => Err(ModbusError::ConfigError(format!(
            "{} cannot use a {:?} buffer",
            function.name(),
            data.shape()
        ))),
    };

    let result = TransactionResult::classify(reported, units, buffer.data());
    debug!("{:?} -> {:?}", point, result);
    Outcome::new(point, function, result)
}

/// Lazy walk over links × addresses, one outcome per point.
///
/// A connection failure is yielded once as `Err` and ends the walk.
pub struct Scan<'a, C: Connector> {
    plan: &'a ScanPlan,
    buffer: &'a mut RequestBuffer,
    connector: &'a mut C,
    links: Box<dyn Iterator<Item = Option<SerialLink>> + 'a>,
    current: Option<(Option<SerialLink>, Option<C::Transport>)>,
    addresses: RangeInclusive<u8>,
    finished: bool,
}

/// Validates the plan and returns the outcome stream; nothing is sent yet.
pub fn run<'a, C: Connector>(
    plan: &'a ScanPlan,
    buffer: &'a mut RequestBuffer,
    connector: &'a mut C,
) -> Result<Scan<'a, C>, ModbusError> {
    plan.addresses.validate()?;
    let (shape, direction) = plan.function.resolve();
    if buffer.direction() != direction || buffer.data().shape() != shape {
        return Err(ModbusError::ConfigError(format!(
            "Buffer does not match {}",
            plan.function.name()
        )));
    }

    Ok(Scan {
        plan,
        buffer,
        connector,
        links: plan.links.links(),
        current: None,
        addresses: plan.addresses.addresses(),
        finished: false,
    })
}

impl<'a, C: Connector> Iterator for Scan<'a, C> {
    type Item = Result<Outcome, ModbusError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            if let Some((link, transport)) = self.current.as_mut() {
                if let Some(address) = self.addresses.next() {
                    let point = ScanPoint { link: *link, address };
                    let outcome = match transport {
                        Some(transport) => execute_point(
                            self.plan.function,
                            self.plan.register,
                            self.buffer,
                            transport,
                            point,
                        ),
                        None => Outcome::new(point, self.plan.function, TransactionResult::Unsupported),
                    };
                    return Some(Ok(outcome));
                }
                // dropping the transport closes the link
                self.current = None;
            }

            let link = match self.links.next() {
                Some(link) => link,
                None => {
                    self.finished = true;
                    return None;
                }
            };

            if !self.plan.function.is_implemented() {
                self.current = Some((link, None));
            } else {
                match self.connector.connect(link) {
                    Ok(transport) => self.current = Some((link, Some(transport))),
                    Err(err) => {
                        self.finished = true;
                        return Some(Err(err));
                    }
                }
            }
            self.addresses = self.plan.addresses.addresses();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub total: usize,
    pub responded: Vec<ScanPoint>,
    pub failed: usize,
    pub unsupported: usize,
}

impl ScanSummary {
    fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome.result {
            TransactionResult::Success { .. } => self.responded.push(outcome.point),
            TransactionResult::Failure { .. } => self.failed += 1,
            TransactionResult::Unsupported => self.unsupported += 1,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.responded.len() == self.total
    }
}

/// Drives a run end to end and writes the report to `out`.
pub struct ScanService<W: Write> {
    config: Config,
    formatter: Box<dyn OutcomeFormatter>,
    out: W,
}

impl<W: Write> ScanService<W> {
    pub fn new(config: Config, out: W) -> Self {
        let formatter: Box<dyn OutcomeFormatter> = match config.output {
            OutputFormat::Console => Box::new(ConsoleFormatter),
            OutputFormat::Json => Box::new(JsonFormatter),
        };
        Self { config, formatter, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Resolves the request against the configuration without touching a link.
    pub fn plan(&self, request: &ScanRequest) -> Result<(ScanPlan, RequestBuffer), ModbusError> {
        request.addresses.validate()?;
        let register = request.effective_register(self.config.base_one)?;
        let buffer = RequestBuffer::for_function(
            request.function,
            register,
            request.count,
            &request.write_values,
        )?;
        let plan = ScanPlan {
            function: request.function,
            register,
            links: self.config.link_plan()?,
            addresses: request.addresses,
        };
        Ok((plan, buffer))
    }

    pub fn execute<C: Connector>(
        &mut self,
        request: &ScanRequest,
        connector: &mut C,
    ) -> Result<ScanSummary, ModbusError> {
        let (plan, mut buffer) = self.plan(request)?;
        let ctx = ReportContext {
            link_scan: plan.links.is_scan(),
            address_scan: plan.addresses.is_scan(),
            verbose: self.config.verbose(),
        };

        info!(
            "🔍 {} register {} x{} on {} point(s)",
            plan.function,
            plan.register,
            buffer.units(),
            plan.point_count()
        );

        if ctx.verbose {
            if let Some(hex) = buffer.payload_hex() {
                self.out.write_all(self.formatter.format_payload(&hex).as_bytes())?;
            }
        }

        let mut summary = ScanSummary::default();
        for item in run(&plan, &mut buffer, connector)? {
            let outcome = item?;
            summary.record(&outcome);
            if outcome.result == TransactionResult::Unsupported {
                warn!("{} has no transaction path", plan.function.name());
            }
            if ctx.should_report(&outcome) {
                self.out
                    .write_all(self.formatter.format_outcome(&outcome, &ctx).as_bytes())?;
                self.out.flush()?;
            }
        }

        if ctx.is_scan() {
            self.out
                .write_all(self.formatter.format_summary(&summary, &ctx).as_bytes())?;
        }
        info!(
            "📊 {} of {} point(s) responded",
            summary.responded.len(),
            summary.total
        );
        Ok(summary)
    }
}
