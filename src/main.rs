//! Servatrice server binary.

use std::process::ExitCode;

use clap::Parser;

use servatrice::{Args, Bootstrap, StandbyServer};

fn main() -> ExitCode {
    let args = Args::parse();
    let status = Bootstrap::new(args).run(|settings| StandbyServer::new(&settings.server));
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}
