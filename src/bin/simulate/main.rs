use chrono::Utc;
use log::LevelFilter;

use crate::clap_app::Cli;

/// Simulate the tracks for one parameter vector, e.g. the best fit of mcmc.
mod app;
mod clap_app;

fn main() {
    match Cli::build() {
        Ok(simulate) => {
            let level = match simulate.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            };
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .init();
            println!("{} Starting the simulation", Utc::now());
            std::process::exit(match simulate.run() {
                Ok(()) => {
                    println!("{} End simulation", Utc::now());
                    0
                }
                Err(err) => {
                    eprintln!(
                        "{} Error during the simulation: {:?}",
                        Utc::now(),
                        err
                    );
                    1
                }
            });
        }
        Err(err) => {
            eprintln!("{} Error while building the cli: {:?}", Utc::now(), err);
            std::process::exit(1);
        }
    }
}

#[test]
fn verify_cli() {
    use clap::CommandFactory;

    Cli::command().debug_assert()
}
