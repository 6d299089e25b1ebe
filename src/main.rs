//! tablegate entry point
//!
//! Errors are printed to stderr; the exit status comes from the error code.

use tablegate::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(e.code().exit_status());
    }
}
