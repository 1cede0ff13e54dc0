pub mod formatters;

pub use formatters::{render, ConsoleFormatter, JsonFormatter, OutcomeFormatter, ReportContext};
