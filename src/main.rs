// main.rs — gauss-blur binary.
//
// Parses the command line, runs the pipeline once and maps the outcome to
// a process exit status. This is the only place errors are reported.

use std::error::Error;
use std::ffi::OsString;
use std::process::ExitCode;

use gauss_blur::pipeline::{execute, Outcome, RunConfig};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let argv0 = args
        .first()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gauss-blur".to_string());
    println!("{argv0} Starting...\n");

    let config = match RunConfig::from_args(&args) {
        Ok(config) => config,
        Err(err) => err.exit(),
    };
    log::debug!("{config:?}");

    let result = execute(&config, |info| {
        println!("{}", info.version_report());
        println!("Device: {info}\n");
    });

    match result {
        Ok(Outcome::Completed(paths)) => {
            println!("Saved image: {}", paths.pgm.display());
            println!("Saved image: {}", paths.png.display());
            ExitCode::SUCCESS
        }
        Ok(Outcome::NoDevice) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            let mut source = err.source();
            while let Some(cause) = source {
                log::debug!("caused by: {cause}");
                source = cause.source();
            }
            ExitCode::from(err.exit_code())
        }
    }
}
