use chrono::Utc;
use serde_json::json;
use std::fmt::Write as _;

use crate::modbus::{Direction, Outcome, ScanPoint, TransactionResult};
use crate::services::ScanSummary;
use crate::utils::error::ModbusError;

/// What kind of run an outcome belongs to; decides headers and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportContext {
    /// More than one baud rate or parity.
    pub link_scan: bool,
    /// More than one slave address.
    pub address_scan: bool,
    pub verbose: bool,
}

impl ReportContext {
    pub fn is_scan(&self) -> bool {
        self.link_scan || self.address_scan
    }

    /// Failed addresses of a genuine address scan stay quiet unless verbose.
    pub fn should_report(&self, outcome: &Outcome) -> bool {
        match outcome.result {
            TransactionResult::Failure { .. } => !self.address_scan || self.verbose,
            TransactionResult::Success { .. } | TransactionResult::Unsupported => true,
        }
    }

    fn point_label(&self, point: &ScanPoint) -> String {
        match (self.link_scan, point.link) {
            (true, Some(link)) => format!("{} Address:{}", link, point.address),
            _ => format!("Address:{}", point.address),
        }
    }
}

/// Payload or diagnostic of one outcome, exactly as received.
pub fn render(outcome: &Outcome) -> String {
    match &outcome.result {
        TransactionResult::Success { payload, .. } => payload.to_hex(),
        TransactionResult::Failure { description } => description.clone(),
        TransactionResult::Unsupported => {
            ModbusError::Unsupported(outcome.function.name().to_string()).to_string()
        }
    }
}

pub trait OutcomeFormatter {
    /// Verbose echo of the write payload before the first transaction.
    fn format_payload(&self, hex: &str) -> String;
    fn format_outcome(&self, outcome: &Outcome, ctx: &ReportContext) -> String;
    fn format_summary(&self, summary: &ScanSummary, ctx: &ReportContext) -> String;
}

pub struct ConsoleFormatter;

impl OutcomeFormatter for ConsoleFormatter {
    fn format_payload(&self, hex: &str) -> String {
        format!("Data to write: {}\n", hex)
    }

    fn format_outcome(&self, outcome: &Outcome, ctx: &ReportContext) -> String {
        let mut out = String::new();
        let label = ctx.point_label(&outcome.point);

        match &outcome.result {
            TransactionResult::Success { units, .. } => {
                if ctx.is_scan() {
                    let _ = writeln!(out, "{}", label);
                }
                match outcome.function.direction() {
                    Direction::Write => {
                        let _ = writeln!(out, "SUCCESS: written {} elements!", units);
                    }
                    Direction::Read => {
                        let _ = writeln!(out, "SUCCESS: read {} of elements:", units);
                        let _ = writeln!(out, "\tData: {}", render(outcome));
                    }
                }
            }
            TransactionResult::Failure { .. } if ctx.address_scan => {
                let _ = writeln!(out, "{} no response: {}", label, render(outcome));
            }
            TransactionResult::Failure { .. } => {
                if ctx.link_scan {
                    let _ = writeln!(out, "{}", label);
                }
                let _ = writeln!(out, "ERROR occurred: {}", render(outcome));
            }
            TransactionResult::Unsupported => {
                if ctx.is_scan() {
                    let _ = writeln!(out, "{}", label);
                }
                let _ = writeln!(out, "{}", render(outcome));
            }
        }
        out
    }

    fn format_summary(&self, summary: &ScanSummary, ctx: &ReportContext) -> String {
        let mut out = format!(
            "Scan finished: {} of {} points responded\n",
            summary.responded.len(),
            summary.total
        );
        for point in &summary.responded {
            let _ = writeln!(out, "  {}", ctx.point_label(point));
        }
        out
    }
}

/// One JSON object per line.
pub struct JsonFormatter;

impl OutcomeFormatter for JsonFormatter {
    fn format_payload(&self, hex: &str) -> String {
        let record = json!({ "data_to_write": hex.trim_end() });
        format!("{}\n", record)
    }

    fn format_outcome(&self, outcome: &Outcome, _ctx: &ReportContext) -> String {
        let record = json!({
            "outcome": outcome,
            "rendered": render(outcome),
        });
        format!("{}\n", record)
    }

    fn format_summary(&self, summary: &ScanSummary, _ctx: &ReportContext) -> String {
        let record = json!({
            "summary": {
                "timestamp": Utc::now().to_rfc3339(),
                "total": summary.total,
                "failed": summary.failed,
                "unsupported": summary.unsupported,
                "responded": summary.responded,
            }
        });
        format!("{}\n", record)
    }
}
