pub mod scan_service;

pub use scan_service::{execute_point, run, Scan, ScanPlan, ScanRequest, ScanService, ScanSummary};
