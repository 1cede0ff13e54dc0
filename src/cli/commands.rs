use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::modbus::{AddressSpec, FunctionCode};
use crate::services::ScanRequest;
use crate::utils::error::ModbusError;
use crate::utils::parse::{parse_bounded, parse_int};

const MAX_BAUD_VALUES: usize = 16;
const MAX_PARITY_VALUES: usize = 3;
const MAX_WRITE_VALUES: usize = 123;

/// Arguments every transaction command accepts.
fn request_args() -> Vec<Arg> {
    vec![
        Arg::new("addr")
            .short('a')
            .long("addr")
            .value_name("n|n.m")
            .required(true)
            .help("Slave address, or an inclusive range n.m to scan"),
        Arg::new("reg")
            .short('r')
            .long("reg")
            .value_name("REGISTER")
            .required(true)
            .help("Start register"),
        Arg::new("func")
            .short('f')
            .long("func")
            .value_name("CODE")
            .required(true)
            .help("Function code: 1,2,3,4,5,6,15,16"),
        Arg::new("write")
            .short('w')
            .long("write")
            .value_name("VALUE")
            .action(ArgAction::Append)
            .allow_negative_numbers(true)
            .help("Value to write, repeat for multiple values"),
        Arg::new("count")
            .short('c')
            .long("count")
            .value_name("N")
            .help("Number of elements to read [default: 1]"),
        Arg::new("timeout")
            .short('o')
            .long("timeout")
            .value_name("MS")
            .help("Response timeout in milliseconds [default: 1000]"),
        Arg::new("base-1")
            .short('1')
            .long("base-1")
            .action(ArgAction::SetTrue)
            .help("Registers are numbered from 1"),
        Arg::new("verbose")
            .short('v')
            .long("verbose")
            .action(ArgAction::Count)
            .help("Print failed scan points; twice also traces frames"),
        Arg::new("format")
            .long("format")
            .value_name("FORMAT")
            .value_parser(["console", "json"])
            .help("Report format [default: console]"),
        Arg::new("config")
            .long("config")
            .value_name("FILE")
            .help("TOML file supplying defaults for this command"),
    ]
}

pub fn build_cli() -> Command {
    Command::new("modbusc")
        .version(crate::VERSION)
        .about("Modbus diagnostic client: read, write and scan RTU or TCP slaves")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("rtu")
                .about("Talk to slaves on a serial line")
                .arg(
                    Arg::new("dev")
                        .short('d')
                        .long("dev")
                        .value_name("DEVICE")
                        .help("Serial device, e.g. /dev/ttyUSB0"),
                )
                .arg(
                    Arg::new("baud")
                        .short('b')
                        .long("baud")
                        .value_name("BAUD")
                        .action(ArgAction::Append)
                        .help("Baud rate, repeat to scan several"),
                )
                .arg(
                    Arg::new("parity")
                        .short('p')
                        .long("parity")
                        .value_name("N|E|O")
                        .action(ArgAction::Append)
                        .help("Parity, repeat to scan several [default: E]"),
                )
                .arg(Arg::new("data-bits").long("data-bits").value_name("7|8"))
                .arg(Arg::new("stop-bits").long("stop-bits").value_name("1|2"))
                .args(request_args()),
        )
        .subcommand(
            Command::new("tcp")
                .about("Talk to a Modbus TCP peer")
                .arg(
                    Arg::new("ip")
                        .short('i')
                        .long("ip")
                        .value_name("IP")
                        .help("Peer address [default: 127.0.0.1]"),
                )
                .arg(
                    Arg::new("port")
                        .short('p')
                        .long("port")
                        .value_name("PORT")
                        .help("Peer port [default: 502]"),
                )
                .args(request_args()),
        )
        .subcommand(Command::new("ports").about("List available serial ports"))
}

fn check_repeats(sub: &ArgMatches, id: &str, max: usize) -> Result<(), ModbusError> {
    let given = sub.get_many::<String>(id).map_or(0, |values| values.len());
    if given > max {
        return Err(ModbusError::ConfigError(format!(
            "At most {} --{} values allowed, got {}",
            max, id, given
        )));
    }
    Ok(())
}

/// Extracts the transaction request from an `rtu` or `tcp` subcommand.
pub fn request_from_matches(matches: &ArgMatches) -> Result<ScanRequest, ModbusError> {
    let (name, sub) = matches
        .subcommand()
        .ok_or_else(|| ModbusError::ConfigError("Missing <rtu|tcp> command.".to_string()))?;
    if name == "rtu" {
        check_repeats(sub, "baud", MAX_BAUD_VALUES)?;
        check_repeats(sub, "parity", MAX_PARITY_VALUES)?;
    }
    check_repeats(sub, "write", MAX_WRITE_VALUES)?;

    let required = |id: &str| {
        sub.get_one::<String>(id)
            .ok_or_else(|| ModbusError::ConfigError(format!("Missing --{} argument", id)))
    };

    let function = FunctionCode::try_from(parse_int(required("func")?)?)?;
    let register = parse_bounded::<u16>(required("reg")?, "register")?;
    let addresses = AddressSpec::parse(required("addr")?)?;
    let count = match sub.get_one::<String>("count") {
        Some(count) => parse_bounded::<u16>(count, "count")?,
        None => 1,
    };
    let write_values = match sub.get_many::<String>("write") {
        Some(values) => values.map(|v| parse_int(v)).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(ScanRequest { function, register, count, write_values, addresses })
}
