use std::env;
use std::ffi::OsString;
use std::io::{self, BufWriter};
use std::process::ExitCode;

use anyhow::{Context, Result};

use finder::args::{self, ConfigError, Parsed};
use finder::delete;
use finder::walk::{run_find, WalkError};

fn main() -> ExitCode {
    let argv: Vec<OsString> = env::args_os().collect();
    let program = args::program_name(argv.first());

    match run(&program, argv) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", program, e);
            ExitCode::FAILURE
        }
    }
}

fn run(program: &str, argv: Vec<OsString>) -> Result<ExitCode> {
    let config = match args::parse_args(argv) {
        Ok(Parsed::Run(config)) => config,
        Ok(Parsed::Help) => {
            args::write_help(program, &mut io::stderr().lock()).context("writing help")?;
            return Ok(ExitCode::SUCCESS);
        }
        Ok(Parsed::Version) => {
            print!("{}", args::command(program).render_version());
            return Ok(ExitCode::SUCCESS);
        }
        Err(ConfigError::Usage(e)) => {
            e.print().context("writing usage error")?;
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => {
            eprintln!("{}: {}", program, e);
            if e.shows_help() {
                args::write_help(program, &mut io::stderr().lock()).context("writing help")?;
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let deleter = delete::default_deleter();
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    match run_find(&config, deleter.as_ref(), &mut out) {
        Ok(_) => Ok(ExitCode::SUCCESS),
        // Reader went away (e.g. piped into `head`); nothing left to report.
        Err(WalkError::Output(e)) if e.kind() == io::ErrorKind::BrokenPipe => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
