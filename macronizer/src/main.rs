use std::{
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use macronizer::Macronizer;
use tracing::{error, info};

/// A fixed self-test string exercised by `--test`, standing in for stdin.
const SELF_TEST_INPUT: &str = "Arma virumque cano, Troiae qui primus ab oris.";

#[derive(Parser)]
#[command(author, version, about = "Restores Latin vowel-length macrons in running text")]
struct Cli {
    /// Path to the INI configuration file.
    #[arg(long, default_value = "macronizer.ini")]
    config: PathBuf,

    /// Macronize a fixed self-test string instead of reading stdin.
    #[arg(long)]
    test: bool,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .event_format(fmt::format())
        .init();
}

fn read_input(cli: &Cli) -> io::Result<String> {
    if cli.test {
        return Ok(SELF_TEST_INPUT.to_owned());
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let config = match mcr_config::Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut macronizer = match Macronizer::new(&config) {
        Ok(m) => m,
        Err(err) => {
            error!(%err, "failed to initialize macronizer");
            return ExitCode::FAILURE;
        }
    };

    let input = match read_input(&cli) {
        Ok(input) => input,
        Err(err) => {
            error!(%err, "failed to read input");
            return ExitCode::FAILURE;
        }
    };

    match macronizer.macronize(&input) {
        Ok(output) => {
            info!(chars = output.chars().count(), "macronized input");
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(%err, "macronization failed");
            ExitCode::FAILURE
        }
    }
}
