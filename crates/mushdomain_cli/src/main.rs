//! `mushdomain` entry point: one process invocation runs one command.
//!
//! # Responsibility
//! - Parse process arguments and environment into a database path, logging
//!   settings and one `Params` value.
//! - Hand the command to the core router and write its single response line.
//!
//! # Invariants
//! - stdout carries exactly one encoded line; diagnostics go to the log.
//! - Failures are answered in-band, argument errors included, so the exit
//!   status stays 0 whenever a response line was written.

use clap::error::ErrorKind;
use clap::Parser;
use log::{error, info};
use mushdomain_core::command::{
    parse_register_spec, write_response, CommandRegistry, CommandRouter, Params,
    INTERNAL_ERROR_RESPONSE,
};
use mushdomain_core::db::open_db;
use mushdomain_core::logging::{default_log_level, init_logging, init_stderr_logging};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

/// Domain and boon store for a MUSH game host.
#[derive(Debug, Parser)]
#[command(name = "mushdomain")]
#[command(version, about, long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "MUSHDOMAIN_DB_PATH", default_value = "domain.db")]
    db: PathBuf,

    /// Absolute directory for rolling log files (stderr when unset)
    #[arg(long, env = "MUSHDOMAIN_LOG_DIR")]
    log_dir: Option<String>,

    /// Log level: trace, debug, info, warn, error or off
    #[arg(long, env = "MUSHDOMAIN_LOG_LEVEL")]
    log_level: Option<String>,

    /// Named parameter, repeatable; wins over the positional argument
    #[arg(short = 'r', long = "register", value_name = "NAME=VALUE", value_parser = parse_register_spec)]
    registers: Vec<(String, String)>,

    /// Command name
    command: String,

    /// Positional command arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Cli {
    fn params(&self) -> Params {
        let mut params = Params::positional(self.args.iter().cloned());
        for (name, value) in &self.registers {
            params.set_register(name, value.clone());
        }
        params
    }
}

fn main() -> ExitCode {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match Cli::try_parse() {
        Ok(cli) => {
            setup_logging(&cli);
            run(&cli, &mut out)
        }
        Err(err) => {
            if !is_informational(&err) {
                // Flags were not parsed, so fall back to the default stderr logger.
                if let Err(log_err) = init_stderr_logging(default_log_level()) {
                    eprintln!("mushdomain: logging disabled: {log_err}");
                }
            }
            answer_parse_error(&err, &mut out)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(
                "event=write_response module=cli status=error error={}",
                err
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, out: &mut impl Write) -> io::Result<()> {
    let mut conn = match open_db(&cli.db) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=cli status=error command={} error={}",
                cli.command, err
            );
            return write_response(out, INTERNAL_ERROR_RESPONSE);
        }
    };

    let registry = match CommandRegistry::with_default_handlers() {
        Ok(registry) => registry,
        Err(err) => {
            error!(
                "event=registry_init module=cli status=error error={}",
                err
            );
            return write_response(out, INTERNAL_ERROR_RESPONSE);
        }
    };

    let router = CommandRouter::new(registry);
    let dispatch = router.route(&mut conn, &cli.command, &cli.params(), out)?;
    info!(
        "event=invocation_finished module=cli status=ok invocation_id={} state={:?}",
        router.invocation_id(),
        dispatch.state
    );
    Ok(())
}

/// `--help` and `--version` requests, which clap reports as errors.
fn is_informational(err: &clap::Error) -> bool {
    matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

/// Prints help or version text as is; any other parse failure is answered
/// in-band like every other failed invocation.
fn answer_parse_error(err: &clap::Error, out: &mut impl Write) -> io::Result<()> {
    if is_informational(err) {
        write!(out, "{}", err.render())?;
        return out.flush();
    }
    error!(
        "event=parse_args module=cli status=error error_code=invalid_arguments kind={:?}",
        err.kind()
    );
    write_response(out, INTERNAL_ERROR_RESPONSE)
}

fn setup_logging(cli: &Cli) {
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    let result = match cli.log_dir.as_deref() {
        Some(dir) => init_logging(level, dir),
        None => init_stderr_logging(level),
    };
    // Logging failures never block the response line.
    if let Err(err) = result {
        eprintln!("mushdomain: logging disabled: {err}");
    }
}
