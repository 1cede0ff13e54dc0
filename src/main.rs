use anyhow::Result;
use clap::ArgMatches;
use log::{debug, info};
use std::io;
use std::process::ExitCode;

use modbusc::cli::{build_cli, request_from_matches};
use modbusc::config::Config;
use modbusc::modbus::{list_serial_ports, ModbusConnector};
use modbusc::services::ScanService;

/// Single point transaction failed.
const EXIT_TRANSACTION_FAILED: u8 = 2;

fn init_logging(config: &Config) {
    let default_filter = config.log_filter();
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default_filter),
    )
    .try_init();
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    if matches.subcommand_name() == Some("ports") {
        init_logging(&Config::default());
        let found = list_serial_ports(&mut io::stdout().lock())?;
        debug!("{} serial port(s) listed", found);
        return Ok(ExitCode::SUCCESS);
    }

    let config = Config::from_matches(matches)?;
    init_logging(&config);
    let request = request_from_matches(matches)?;
    info!("🚀 modbusc {} starting", modbusc::VERSION);

    let single_point = !request.addresses.is_scan() && !config.link_plan()?.is_scan();
    let mut connector = ModbusConnector::new(config.transport.clone(), config.timeout_ms);
    let mut service = ScanService::new(config, io::stdout().lock());
    let summary = service.execute(&request, &mut connector)?;

    if single_point && summary.failed > 0 {
        return Ok(ExitCode::from(EXIT_TRANSACTION_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("modbusc: {}", err);
            ExitCode::FAILURE
        }
    }
}
