/// Lockstep CLI
///
/// Checks kernels, runs them in simulated SIMD lockstep and generates the
/// jagged datasets the reducer kernels read.
use lockstep_core::cli;

fn main() {
    // Environment from .env feeds the LOCKSTEP_* config layer
    dotenvy::dotenv().ok();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
