use clap::Parser;
use fetchpool_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Initialize logging as early as possible.
    logging::init(cli.verbose);

    match cli.run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("fetchpool error: {:#}", err);
            std::process::exit(1);
        }
    }
}
