pub mod commands;

pub use commands::{build_cli, request_from_matches};
