//! # Loopscape
//!
//! A command-line renderer for long, seamlessly looping ambient soundscapes.

use log::error;

mod cli;
mod logging;
mod runner;

fn main() {
    let args = cli::args::build_cli().get_matches();
    logging::init(logging::level_from_args(&args));

    let code = match runner::run(&args) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err.to_string().to_lowercase());
            -1
        }
    };

    std::process::exit(code)
}
