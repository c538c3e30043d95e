use chrono::Utc;
use log::LevelFilter;

use crate::clap_app::Cli;

/// Sample the posterior of the network parameters given the tracks.
mod app;
mod clap_app;

fn main() {
    match Cli::build() {
        Ok(mcmc) => {
            let level = match mcmc.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                _ => LevelFilter::Debug,
            };
            env_logger::Builder::new()
                .filter_level(level)
                .parse_default_env()
                .init();
            println!("{} Starting the inference", Utc::now());
            std::process::exit(match mcmc.run() {
                Ok(()) => {
                    println!("{} End inference", Utc::now());
                    0
                }
                Err(err) => {
                    eprintln!("{} Error during the inference: {:?}", Utc::now(), err);
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
