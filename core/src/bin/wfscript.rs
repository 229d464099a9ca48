/// wfscript CLI
///
/// Runs the workspace queries against a workflow schema file and a script
/// file, printing JSON. Useful for debugging editor integrations.

use wfscript_core::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
